use std::cmp::Ordering;

use fxhash::FxHashMap;

use crate::atom::{Atom, AtomId, SymbolId};
use crate::term::Term;

/// A Knuth-Bendix ordering. The proof control owns one instance, possibly with
/// problem-specific weights and precedence; the default instance (unit weights,
/// precedence by symbol id) is what `Term::kbo_cmp` uses.
///
/// The ordering is partial: `term_cmp` returns None for incomparable terms,
/// which is what makes an equation unorientable.
#[derive(Debug, Clone, Default)]
pub struct Kbo {
    weights: FxHashMap<SymbolId, u64>,
    precedence: FxHashMap<SymbolId, u64>,
}

impl Kbo {
    pub fn new() -> Kbo {
        Kbo::default()
    }

    pub fn set_weight(&mut self, symbol: SymbolId, weight: u64) {
        assert!(weight >= 1, "KBO symbol weights must dominate the variable weight");
        self.weights.insert(symbol, weight);
    }

    pub fn set_precedence(&mut self, symbol: SymbolId, precedence: u64) {
        self.precedence.insert(symbol, precedence);
    }

    fn symbol_weight(&self, atom: Atom) -> u64 {
        match atom {
            Atom::True => 1,
            Atom::Variable(_) => 1,
            Atom::Symbol(id) => *self.weights.get(&id).unwrap_or(&1),
        }
    }

    fn weight(&self, term: &Term) -> u64 {
        let mut total = self.symbol_weight(term.head);
        for arg in &term.args {
            total += self.weight(arg);
        }
        total
    }

    // Precedence on non-variable heads. "true" is minimal so that predicate
    // literals orient toward their atom side.
    fn atom_precedence(&self, atom: Atom) -> (u64, u64) {
        match atom {
            Atom::True => (0, 0),
            Atom::Symbol(id) => (1, *self.precedence.get(&id).unwrap_or(&(id as u64 + 1))),
            Atom::Variable(_) => panic!("variables have no precedence"),
        }
    }

    fn var_counts(term: &Term, counts: &mut FxHashMap<AtomId, i64>) {
        if let Atom::Variable(i) = term.head {
            *counts.entry(i).or_insert(0) += 1;
        }
        for arg in &term.args {
            Kbo::var_counts(arg, counts);
        }
    }

    // Whether every variable occurs at least as often in `s` as in `t`.
    fn dominates(s: &Term, t: &Term) -> bool {
        let mut s_counts = FxHashMap::default();
        let mut t_counts = FxHashMap::default();
        Kbo::var_counts(s, &mut s_counts);
        Kbo::var_counts(t, &mut t_counts);
        t_counts
            .iter()
            .all(|(v, &n)| s_counts.get(v).copied().unwrap_or(0) >= n)
    }

    pub fn term_cmp(&self, s: &Term, t: &Term) -> Option<Ordering> {
        if s == t {
            return Some(Ordering::Equal);
        }

        // Variable cases: a variable is below exactly the terms containing it.
        if let Some(x) = s.atomic_variable() {
            return if t.has_variable(x) {
                Some(Ordering::Less)
            } else {
                None
            };
        }
        if let Some(x) = t.atomic_variable() {
            return if s.has_variable(x) {
                Some(Ordering::Greater)
            } else {
                None
            };
        }

        let s_dominates = Kbo::dominates(s, t);
        let t_dominates = Kbo::dominates(t, s);
        if !s_dominates && !t_dominates {
            return None;
        }

        let ws = self.weight(s);
        let wt = self.weight(t);
        if ws > wt {
            return if s_dominates {
                Some(Ordering::Greater)
            } else {
                None
            };
        }
        if wt > ws {
            return if t_dominates { Some(Ordering::Less) } else { None };
        }

        // Equal weights: compare head precedence, then lexicographic arguments.
        let ps = self.atom_precedence(s.head);
        let pt = self.atom_precedence(t.head);
        let head_cmp = ps.cmp(&pt);
        let result = if head_cmp != Ordering::Equal {
            head_cmp
        } else {
            let mut lex = Ordering::Equal;
            for (a, b) in s.args.iter().zip(t.args.iter()) {
                match self.term_cmp(a, b) {
                    Some(Ordering::Equal) => continue,
                    Some(order) => {
                        lex = order;
                        break;
                    }
                    None => return None,
                }
            }
            lex
        };
        match result {
            Ordering::Greater if s_dominates => Some(Ordering::Greater),
            Ordering::Less if t_dominates => Some(Ordering::Less),
            Ordering::Equal => None,
            _ => None,
        }
    }

    pub fn greater(&self, s: &Term, t: &Term) -> bool {
        self.term_cmp(s, t) == Some(Ordering::Greater)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subterm_property() {
        let kbo = Kbo::new();
        let s = Term::parse("c0(c1(x0), x1)");
        let sub = Term::parse("c1(x0)");
        assert!(kbo.greater(&s, &sub));
        assert_eq!(kbo.term_cmp(&sub, &s), Some(Ordering::Less));
    }

    #[test]
    fn test_variable_condition_blocks_orientation() {
        let kbo = Kbo::new();
        // c0(x0) vs c1(x1): neither side dominates the other's variables.
        assert_eq!(
            kbo.term_cmp(&Term::parse("c0(x0)"), &Term::parse("c1(x1)")),
            None
        );
        // Duplicated variable on the right blocks left-to-right orientation.
        assert_eq!(
            kbo.term_cmp(&Term::parse("c0(x0)"), &Term::parse("c1(x0, x0)")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_precedence_breaks_weight_ties() {
        let kbo = Kbo::new();
        let a = Term::parse("c3(x0)");
        let b = Term::parse("c2(x0)");
        assert!(kbo.greater(&a, &b));
    }

    #[test]
    fn test_custom_weights() {
        let mut kbo = Kbo::new();
        kbo.set_weight(2, 10);
        assert!(kbo.greater(&Term::parse("c2"), &Term::parse("c5(c6)")));
    }

    #[test]
    fn test_commutativity_is_unorientable() {
        let kbo = Kbo::new();
        let left = Term::parse("c0(x0, x1)");
        let right = Term::parse("c0(x1, x0)");
        assert_eq!(kbo.term_cmp(&left, &right), None);
    }
}
