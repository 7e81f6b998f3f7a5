use fxhash::FxHashSet;

use crate::clause::Clause;
use crate::feature_vector::{FeatureVec, FvIndex, FvIndexParms};
use crate::fingerprint::FingerprintIndex;
use crate::proof_step::{ClauseFlags, ProofStep, Rule, SetKind, StepId};

/// The arena owning every clause the proof procedure ever created. Steps are
/// never removed; retirement means the Dead flag plus membership in the
/// archive, which keeps the derivation DAG intact for proof extraction.
#[derive(Debug, Default)]
pub struct ClauseArena {
    steps: Vec<ProofStep>,
}

impl ClauseArena {
    pub fn new() -> ClauseArena {
        ClauseArena::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, id: StepId) -> &ProofStep {
        &self.steps[id]
    }

    pub fn get_mut(&mut self, id: StepId) -> &mut ProofStep {
        &mut self.steps[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProofStep> {
        self.steps.iter()
    }

    /// Creates a new step and links it as a child of each of its premises.
    pub fn new_step(&mut self, clause: Clause, rule: Rule) -> StepId {
        let id = self.steps.len();
        let step = ProofStep::new(id, clause, rule);
        for premise in step.rule.premises() {
            if premise < id {
                self.steps[premise].children.push(id);
            }
        }
        self.steps.push(step);
        id
    }

    pub fn new_assumption(&mut self, clause: Clause) -> StepId {
        let id = self.steps.len();
        self.steps.push(ProofStep::assumption(id, clause));
        id
    }

    /// Collects every active ancestor of the step, for proof reconstruction.
    pub fn find_upstream(&self, id: StepId, output: &mut FxHashSet<StepId>) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            for dep in self.get(current).dependencies() {
                if output.insert(dep) {
                    pending.push(dep);
                }
            }
        }
    }
}

/// An insertion-ordered set of clause ids with an optional feature-vector
/// index. Inserting and extracting keep the step's set marker and the index
/// entries coherent; that coherence is what the loop invariants check.
#[derive(Debug)]
pub struct ClauseSet {
    pub kind: SetKind,

    /// The system date of the youngest demodulator installed in this set.
    /// Only meaningful for the positive rule and equation partitions.
    pub date: u64,

    members: Vec<StepId>,
    present: FxHashSet<StepId>,
    fv: Option<(FvIndexParms, FvIndex)>,
}

impl ClauseSet {
    pub fn new(kind: SetKind) -> ClauseSet {
        ClauseSet {
            kind,
            date: 0,
            members: vec![],
            present: FxHashSet::default(),
            fv: None,
        }
    }

    /// Installs the feature-vector index, indexing any existing members.
    pub fn enable_fv_index(&mut self, arena: &ClauseArena, parms: FvIndexParms) {
        if parms.enabled {
            let mut index = FvIndex::new();
            for &id in &self.members {
                index.insert(FeatureVec::of(&arena.get(id).clause, &parms), id);
            }
            self.fv = Some((parms, index));
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.present.contains(&id)
    }

    pub fn ids(&self) -> Vec<StepId> {
        self.members.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepId> {
        self.members.iter()
    }

    pub fn insert(&mut self, arena: &mut ClauseArena, id: StepId) {
        debug_assert!(!self.present.contains(&id));
        let step = arena.get_mut(id);
        debug_assert!(step.set.is_none(), "clause {} is already in a set", id);
        step.set = Some(self.kind);
        if let Some((parms, index)) = &mut self.fv {
            index.insert(FeatureVec::of(&step.clause, parms), id);
        }
        self.members.push(id);
        self.present.insert(id);
    }

    pub fn extract(&mut self, arena: &mut ClauseArena, id: StepId) {
        debug_assert!(self.present.contains(&id));
        self.members.retain(|&m| m != id);
        self.present.remove(&id);
        if let Some((_, index)) = &mut self.fv {
            index.delete(id);
        }
        let step = arena.get_mut(id);
        debug_assert_eq!(step.set, Some(self.kind));
        step.set = None;
    }

    pub fn extract_first(&mut self, arena: &mut ClauseArena) -> Option<StepId> {
        let id = *self.members.first()?;
        self.extract(arena, id);
        Some(id)
    }

    /// Deterministic sort by structural weight, for reproducible runs.
    pub fn sort_by_weight(&mut self, arena: &ClauseArena) {
        self.members
            .sort_by_key(|&id| (arena.get(id).weight, id));
    }

    /// Candidates this packed clause might subsume, via the feature-vector
    /// index when present, all members otherwise.
    pub fn find_subsumed_candidates(&self, packed: &PackedClause) -> Vec<StepId> {
        match (&self.fv, &packed.fv) {
            (Some((_, index)), Some(fv)) => index.find_subsumed_candidates(fv),
            _ => self.members.clone(),
        }
    }

    /// Candidates that might subsume this packed clause.
    pub fn find_subsumer_candidates(&self, packed: &PackedClause) -> Vec<StepId> {
        match (&self.fv, &packed.fv) {
            (Some((_, index)), Some(fv)) => index.find_subsumer_candidates(fv),
            _ => self.members.clone(),
        }
    }
}

/// A clause paired with its feature vector, the unit the subsumption indices
/// operate on. Packing is done once per forward-simplified clause.
#[derive(Debug)]
pub struct PackedClause {
    pub id: StepId,
    pub fv: Option<FeatureVec>,
}

impl PackedClause {
    pub fn pack(arena: &ClauseArena, parms: &FvIndexParms, id: StepId) -> PackedClause {
        let fv = if parms.enabled {
            Some(FeatureVec::of(&arena.get(id).clause, parms))
        } else {
            None
        };
        PackedClause { id, fv }
    }
}

/// A position a clause can paramodulate from: a side of a positive literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmFromPos {
    pub step: StepId,
    pub lit: usize,
    pub left: bool,
}

/// A subterm position paramodulation can act into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmIntoPos {
    pub step: StepId,
    pub lit: usize,
    pub left: bool,
    pub path: Vec<usize>,
}

/// The global substructure indices, kept in lockstep with processed-set
/// membership through this single insert/delete dispatch.
#[derive(Debug, Default)]
pub struct GlobalIndices {
    /// Subterm positions of processed clauses, for backward rewriting.
    pub bw_rw: Option<FingerprintIndex<PmIntoPos>>,

    /// Paramodulating sides of positive literals.
    pub pm_from: Option<FingerprintIndex<PmFromPos>>,

    /// Subterm positions of non-negative-unit processed clauses.
    pub pm_into: Option<FingerprintIndex<PmIntoPos>>,

    /// Subterm positions of processed negative units.
    pub pm_negp: Option<FingerprintIndex<PmIntoPos>>,
}

impl GlobalIndices {
    pub fn new(enabled: bool) -> GlobalIndices {
        if enabled {
            GlobalIndices {
                bw_rw: Some(FingerprintIndex::new()),
                pm_from: Some(FingerprintIndex::new()),
                pm_into: Some(FingerprintIndex::new()),
                pm_negp: Some(FingerprintIndex::new()),
            }
        } else {
            GlobalIndices::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.pm_into.is_some()
    }

    pub fn insert_clause(&mut self, step: &mut ProofStep) {
        if !self.enabled() {
            return;
        }
        let id = step.id;
        let clause = &step.clause;
        let neg_unit = clause.is_unit() && !clause.literals[0].positive;

        for (lit_idx, literal) in clause.literals.iter().enumerate() {
            // Sides usable as paramodulators: the left of an oriented positive
            // literal, both sides of an unorientable one.
            if literal.positive {
                if let Some(index) = &mut self.pm_from {
                    if !literal.left.is_true() && literal.left.atomic_variable().is_none() {
                        index.insert(
                            literal.left.clone(),
                            PmFromPos {
                                step: id,
                                lit: lit_idx,
                                left: true,
                            },
                        );
                    }
                    if !literal.oriented
                        && !literal.right.is_true()
                        && literal.right.atomic_variable().is_none()
                    {
                        index.insert(
                            literal.right.clone(),
                            PmFromPos {
                                step: id,
                                lit: lit_idx,
                                left: false,
                            },
                        );
                    }
                }
            }

            // Subterm positions, for paramodulation into and backward rewriting.
            for (left, term) in [(true, &literal.left), (false, &literal.right)] {
                if !left && literal.oriented {
                    continue;
                }
                for (path, subterm) in term.rewritable_subterms() {
                    let pos = PmIntoPos {
                        step: id,
                        lit: lit_idx,
                        left,
                        path: path.clone(),
                    };
                    if let Some(index) = &mut self.bw_rw {
                        index.insert(subterm.clone(), pos.clone());
                    }
                    let into = if neg_unit {
                        &mut self.pm_negp
                    } else {
                        &mut self.pm_into
                    };
                    if let Some(index) = into {
                        index.insert(subterm.clone(), pos);
                    }
                }
            }
        }
        step.flags.set(ClauseFlags::GLOBAL_INDEXED);
    }

    pub fn delete_clause(&mut self, step: &mut ProofStep) {
        if !step.flags.query(ClauseFlags::GLOBAL_INDEXED) {
            return;
        }
        let id = step.id;
        if let Some(index) = &mut self.bw_rw {
            index.retain(|_, pos| pos.step != id);
        }
        if let Some(index) = &mut self.pm_from {
            index.retain(|_, pos| pos.step != id);
        }
        if let Some(index) = &mut self.pm_into {
            index.retain(|_, pos| pos.step != id);
        }
        if let Some(index) = &mut self.pm_negp {
            index.retain(|_, pos| pos.step != id);
        }
        step.flags.del(ClauseFlags::GLOBAL_INDEXED);
    }
}
