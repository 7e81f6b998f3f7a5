use crate::atom::Atom;
use crate::clause::Clause;
use crate::term::Term;

/// Parameters for the clause feature vectors used by the subsumption indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FvIndexParms {
    /// When false, clause sets keep no feature-vector index and subsumption
    /// candidate retrieval degenerates to a full scan.
    pub enabled: bool,

    /// Symbol occurrence counts are folded into this many buckets per sign.
    pub max_symbols: usize,

    /// When true, the global rewrite/paramodulation indices are built.
    pub use_global_indices: bool,
}

impl Default for FvIndexParms {
    fn default() -> FvIndexParms {
        FvIndexParms {
            enabled: true,
            max_symbols: 32,
            use_global_indices: true,
        }
    }
}

/// A numeric fingerprint of a clause. Every feature is monotone under
/// subsumption: if C subsumes D then every feature of C is <= the
/// corresponding feature of D. That makes componentwise comparison a sound
/// pre-filter in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureVec {
    vals: Vec<u32>,
}

impl FeatureVec {
    pub fn of(clause: &Clause, parms: &FvIndexParms) -> FeatureVec {
        let m = parms.max_symbols;
        let mut vals = vec![0u32; 2 + 2 * m];
        for literal in &clause.literals {
            let sign_base = if literal.positive { 0 } else { 1 };
            vals[sign_base] += 1;
            FeatureVec::count_symbols(&literal.left, sign_base, m, &mut vals);
            FeatureVec::count_symbols(&literal.right, sign_base, m, &mut vals);
        }
        FeatureVec { vals }
    }

    fn count_symbols(term: &Term, sign_base: usize, m: usize, vals: &mut [u32]) {
        if let Atom::Symbol(id) = term.head {
            let bucket = 2 + sign_base * m + (id as usize % m);
            vals[bucket] += 1;
        }
        for arg in &term.args {
            FeatureVec::count_symbols(arg, sign_base, m, vals);
        }
    }

    /// Componentwise <=, the necessary condition for self subsuming other.
    pub fn dominated_by(&self, other: &FeatureVec) -> bool {
        self.vals
            .iter()
            .zip(other.vals.iter())
            .all(|(a, b)| a <= b)
    }
}

/// The feature-vector index a clause set owns: clause ids paired with their
/// feature vectors, supporting candidate retrieval for forward subsumption
/// (find potential subsumers) and backward subsumption (find potentially
/// subsumed clauses).
#[derive(Debug, Clone, Default)]
pub struct FvIndex {
    entries: Vec<(FeatureVec, usize)>,
}

impl FvIndex {
    pub fn new() -> FvIndex {
        FvIndex::default()
    }

    pub fn insert(&mut self, fv: FeatureVec, id: usize) {
        self.entries.push((fv, id));
    }

    pub fn delete(&mut self, id: usize) {
        self.entries.retain(|(_, entry_id)| *entry_id != id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Candidate clauses that `subsumer_fv` might subsume.
    pub fn find_subsumed_candidates(&self, subsumer_fv: &FeatureVec) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|(fv, _)| subsumer_fv.dominated_by(fv))
            .map(|(_, id)| *id)
            .collect()
    }

    /// Candidate clauses that might subsume a clause with `fv`.
    pub fn find_subsumer_candidates(&self, fv: &FeatureVec) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|(entry_fv, _)| entry_fv.dominated_by(fv))
            .map(|(_, id)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vec_monotone_under_subsumption() {
        let parms = FvIndexParms::default();
        let general = Clause::parse("c0(x0)");
        let specific = Clause::parse("c0(c1) | c2(x0)");
        let general_fv = FeatureVec::of(&general, &parms);
        let specific_fv = FeatureVec::of(&specific, &parms);
        assert!(general_fv.dominated_by(&specific_fv));
        assert!(!specific_fv.dominated_by(&general_fv));
    }

    #[test]
    fn test_index_candidate_retrieval() {
        let parms = FvIndexParms::default();
        let mut index = FvIndex::new();
        let unit = Clause::parse("c0(x0)");
        let long = Clause::parse("c0(c1) | c2(x0)");
        index.insert(FeatureVec::of(&unit, &parms), 0);
        index.insert(FeatureVec::of(&long, &parms), 1);

        // The unit may subsume the long clause, but not vice versa.
        let candidates = index.find_subsumed_candidates(&FeatureVec::of(&unit, &parms));
        assert!(candidates.contains(&1));
        let candidates = index.find_subsumer_candidates(&FeatureVec::of(&long, &parms));
        assert!(candidates.contains(&0));
        let candidates = index.find_subsumed_candidates(&FeatureVec::of(&long, &parms));
        assert!(!candidates.contains(&0));
    }
}
