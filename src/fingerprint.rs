use crate::atom::Atom;
use crate::term::Term;

/// The sample positions of the fingerprint: the root, its first two argument
/// positions, and their first two argument positions.
const SAMPLE_PATHS: [&[usize]; 7] = [
    &[],
    &[0],
    &[1],
    &[0, 0],
    &[0, 1],
    &[1, 0],
    &[1, 1],
];

/// What a term looks like at one sample position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FpVal {
    /// A specific non-variable head.
    Head(Atom),
    /// A variable sits exactly here.
    Var,
    /// The position is below a variable, so an instance may or may not have it.
    Below,
    /// The position does not exist.
    Nothing,
}

/// A fingerprint samples a term at a fixed set of positions. Two terms can
/// only unify (or match) if their fingerprints are compatible, which makes the
/// fingerprint a cheap pre-filter for the paramodulation and rewrite indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    vals: [FpVal; 7],
}

impl Fingerprint {
    pub fn of(term: &Term) -> Fingerprint {
        let mut vals = [FpVal::Nothing; 7];
        for (i, path) in SAMPLE_PATHS.iter().enumerate() {
            vals[i] = Fingerprint::sample(term, path);
        }
        Fingerprint { vals }
    }

    fn sample(term: &Term, path: &[usize]) -> FpVal {
        match path.split_first() {
            None => match term.head {
                Atom::Variable(_) => FpVal::Var,
                head => FpVal::Head(head),
            },
            Some((&i, rest)) => {
                if term.head.is_variable() {
                    return FpVal::Below;
                }
                match term.args.get(i) {
                    Some(arg) => Fingerprint::sample(arg, rest),
                    None => FpVal::Nothing,
                }
            }
        }
    }

    /// Whether terms with these fingerprints could possibly unify.
    pub fn could_unify(&self, other: &Fingerprint) -> bool {
        self.vals
            .iter()
            .zip(other.vals.iter())
            .all(|(a, b)| FpVal::unify_compatible(*a, *b))
    }

    /// Whether a pattern with this fingerprint could match (one-way) an
    /// instance with the other fingerprint.
    pub fn could_match(&self, instance: &Fingerprint) -> bool {
        self.vals
            .iter()
            .zip(instance.vals.iter())
            .all(|(p, i)| FpVal::match_compatible(*p, *i))
    }
}

impl FpVal {
    fn unify_compatible(a: FpVal, b: FpVal) -> bool {
        match (a, b) {
            (FpVal::Head(x), FpVal::Head(y)) => x == y,
            (FpVal::Head(_), FpVal::Nothing) | (FpVal::Nothing, FpVal::Head(_)) => false,
            (FpVal::Var, FpVal::Nothing) | (FpVal::Nothing, FpVal::Var) => false,
            _ => true,
        }
    }

    fn match_compatible(pattern: FpVal, instance: FpVal) -> bool {
        match pattern {
            FpVal::Head(x) => matches!(instance, FpVal::Head(y) if x == y),
            FpVal::Var => instance != FpVal::Nothing,
            FpVal::Below => true,
            FpVal::Nothing => instance == FpVal::Nothing,
        }
    }
}

/// An index from terms to arbitrary values, pre-filtered by fingerprint.
/// Used for the paramodulation from/into indices and the backward-rewrite
/// index. Retrieval returns candidates; the caller still runs real
/// unification or matching.
#[derive(Debug, Clone)]
pub struct FingerprintIndex<T> {
    entries: Vec<(Fingerprint, Term, T)>,
}

impl<T> Default for FingerprintIndex<T> {
    fn default() -> Self {
        FingerprintIndex { entries: vec![] }
    }
}

impl<T> FingerprintIndex<T> {
    pub fn new() -> FingerprintIndex<T> {
        FingerprintIndex::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, term: Term, value: T) {
        let fingerprint = Fingerprint::of(&term);
        self.entries.push((fingerprint, term, value));
    }

    pub fn retain<F: FnMut(&Term, &T) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|(_, term, value)| keep(term, value));
    }

    /// All entries whose term could unify with the query term.
    pub fn find_unifying(&self, term: &Term) -> Vec<(&Term, &T)> {
        let fingerprint = Fingerprint::of(term);
        self.entries
            .iter()
            .filter(|(fp, _, _)| fp.could_unify(&fingerprint))
            .map(|(_, t, v)| (t, v))
            .collect()
    }

    /// All entries whose term could be an instance of the query pattern.
    pub fn find_instances(&self, pattern: &Term) -> Vec<(&Term, &T)> {
        let fingerprint = Fingerprint::of(pattern);
        self.entries
            .iter()
            .filter(|(fp, _, _)| fingerprint.could_match(fp))
            .map(|(_, t, v)| (t, v))
            .collect()
    }

    /// All entries whose term is a pattern that could match the query term.
    pub fn find_generalizations(&self, term: &Term) -> Vec<(&Term, &T)> {
        let fingerprint = Fingerprint::of(term);
        self.entries
            .iter()
            .filter(|(fp, _, _)| fp.could_match(&fingerprint))
            .map(|(_, t, v)| (t, v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_blocks_head_clash() {
        let a = Fingerprint::of(&Term::parse("c0(x0)"));
        let b = Fingerprint::of(&Term::parse("c1(x0)"));
        assert!(!a.could_unify(&b));
    }

    #[test]
    fn test_fingerprint_allows_variable_positions() {
        let a = Fingerprint::of(&Term::parse("c0(x0, c1)"));
        let b = Fingerprint::of(&Term::parse("c0(c2(c3), c1)"));
        assert!(a.could_unify(&b));
        assert!(a.could_match(&b));
        assert!(!b.could_match(&a));
    }

    #[test]
    fn test_index_retrieval() {
        let mut index = FingerprintIndex::new();
        index.insert(Term::parse("c0(x0)"), 1);
        index.insert(Term::parse("c1(c2)"), 2);
        index.insert(Term::parse("x0"), 3);

        let unifying = index.find_unifying(&Term::parse("c0(c2)"));
        let values: Vec<i32> = unifying.iter().map(|(_, v)| **v).collect();
        assert!(values.contains(&1));
        assert!(values.contains(&3));
        assert!(!values.contains(&2));

        let generalizations = index.find_generalizations(&Term::parse("c0(c5)"));
        let values: Vec<i32> = generalizations.iter().map(|(_, v)| **v).collect();
        assert!(values.contains(&1));
        assert!(values.contains(&3));
    }
}
