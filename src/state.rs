use log::{debug, info};
use serde::Serialize;

use crate::clause::Clause;
use crate::clause_sets::{ClauseArena, ClauseSet, GlobalIndices, PackedClause};
use crate::control::{AcHandling, ProofControl};
use crate::formula::Formula;
use crate::proof_step::{ClauseFlags, SetKind, StepId};
use crate::signature::Signature;
use crate::split::DefinitionStore;
use crate::subsumption::clause_subsumes;
use crate::term_bank::TermBank;

/// Statistics maintained by the proof procedure, mirrored to the caller when
/// saturation ends.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Counters {
    pub processed_count: u64,
    pub proc_trivial_count: u64,
    pub proc_non_trivial_count: u64,
    pub generated_count: u64,
    pub generated_lit_count: u64,
    pub backward_rewritten_count: u64,
    pub backward_rewritten_lit_count: u64,
    pub backward_subsumed_count: u64,
    pub non_trivial_generated_count: u64,
    pub other_redundant_count: u64,
    pub non_redundant_deleted: u64,
    pub paramod_count: u64,
    pub resolv_count: u64,
    pub factor_count: u64,
    pub satcheck_count: u64,
    pub satcheck_success: u64,
    pub satcheck_satisfiable: u64,
    pub satcheck_full_size: u64,
    pub satcheck_actual_size: u64,
    pub satcheck_core_size: u64,
}

/// Everything the saturation loop owns: the term banks, the clause arena, the
/// clause sets, the indices, and the counters. The loop has exclusive access;
/// nothing here is shared across threads.
#[derive(Debug)]
pub struct ProofState {
    pub signature: Signature,

    /// The shared term bank, and the bank for ephemeral simplification terms.
    pub terms: TermBank,
    pub tmp_terms: TermBank,

    pub arena: ClauseArena,

    /// The input clauses, as given.
    pub axioms: Vec<Clause>,

    /// Formula axioms awaiting re-injection; the schema expander appends the
    /// instances it builds here before CNF translation.
    pub f_axioms: Vec<Formula>,

    // The four processed partitions.
    pub processed_pos_rules: ClauseSet,
    pub processed_pos_eqns: ClauseSet,
    pub processed_neg_units: ClauseSet,
    pub processed_non_units: ClauseSet,

    pub unprocessed: ClauseSet,
    pub tmp_store: ClauseSet,
    pub eval_store: ClauseSet,
    pub archive: ClauseSet,
    pub watchlist: Option<ClauseSet>,

    pub definition_store: DefinitionStore,

    pub gindices: GlobalIndices,
    pub wlindices: GlobalIndices,

    pub counters: Counters,

    /// Cleared when delete-bad truncates the unprocessed set; a saturation
    /// without the empty clause is then no longer conclusive.
    pub state_is_complete: bool,

    pub fvi_initialized: bool,

    /// Monotone; advances exactly when a new demodulator is installed.
    pub system_date: u64,

    /// Every derived empty clause, for proof extraction.
    pub extract_roots: Vec<StepId>,

    pub filter_orphans_base: u64,
    pub forward_contract_base: u64,
}

impl ProofState {
    pub fn new(signature: Signature, axioms: Vec<Clause>) -> ProofState {
        ProofState {
            signature,
            terms: TermBank::new(),
            tmp_terms: TermBank::new(),
            arena: ClauseArena::new(),
            axioms,
            f_axioms: vec![],
            processed_pos_rules: ClauseSet::new(SetKind::PosRules),
            processed_pos_eqns: ClauseSet::new(SetKind::PosEqns),
            processed_neg_units: ClauseSet::new(SetKind::NegUnits),
            processed_non_units: ClauseSet::new(SetKind::NonUnits),
            unprocessed: ClauseSet::new(SetKind::Unprocessed),
            tmp_store: ClauseSet::new(SetKind::TmpStore),
            eval_store: ClauseSet::new(SetKind::EvalStore),
            archive: ClauseSet::new(SetKind::Archive),
            watchlist: None,
            definition_store: DefinitionStore::new(),
            gindices: GlobalIndices::default(),
            wlindices: GlobalIndices::default(),
            counters: Counters::default(),
            state_is_complete: true,
            fvi_initialized: false,
            system_date: 0,
            extract_roots: vec![],
            filter_orphans_base: 0,
            forward_contract_base: 0,
        }
    }

    /// Installs a user-supplied watchlist before initialization.
    pub fn set_watchlist(&mut self, clauses: Vec<Clause>) {
        let mut watchlist = ClauseSet::new(SetKind::Watchlist);
        for clause in clauses {
            let id = self.arena.new_assumption(clause.clone());
            self.arena
                .get_mut(id)
                .flags
                .set(ClauseFlags::WATCH_ONLY);
            self.terms.intern_clause(&clause);
            watchlist.insert(&mut self.arena, id);
        }
        self.watchlist = Some(watchlist);
    }

    pub fn processed_kinds() -> [SetKind; 4] {
        [
            SetKind::PosRules,
            SetKind::PosEqns,
            SetKind::NegUnits,
            SetKind::NonUnits,
        ]
    }

    pub fn set(&self, kind: SetKind) -> &ClauseSet {
        match kind {
            SetKind::PosRules => &self.processed_pos_rules,
            SetKind::PosEqns => &self.processed_pos_eqns,
            SetKind::NegUnits => &self.processed_neg_units,
            SetKind::NonUnits => &self.processed_non_units,
            SetKind::Unprocessed => &self.unprocessed,
            SetKind::TmpStore => &self.tmp_store,
            SetKind::EvalStore => &self.eval_store,
            SetKind::Archive => &self.archive,
            SetKind::Watchlist => self.watchlist.as_ref().expect("no watchlist installed"),
        }
    }

    pub fn set_mut(&mut self, kind: SetKind) -> &mut ClauseSet {
        self.set_and_arena_mut(kind).0
    }

    /// Splits the borrow so a set and the arena can be mutated together.
    pub fn set_and_arena_mut(&mut self, kind: SetKind) -> (&mut ClauseSet, &mut ClauseArena) {
        match kind {
            SetKind::PosRules => (&mut self.processed_pos_rules, &mut self.arena),
            SetKind::PosEqns => (&mut self.processed_pos_eqns, &mut self.arena),
            SetKind::NegUnits => (&mut self.processed_neg_units, &mut self.arena),
            SetKind::NonUnits => (&mut self.processed_non_units, &mut self.arena),
            SetKind::Unprocessed => (&mut self.unprocessed, &mut self.arena),
            SetKind::TmpStore => (&mut self.tmp_store, &mut self.arena),
            SetKind::EvalStore => (&mut self.eval_store, &mut self.arena),
            SetKind::Archive => (&mut self.archive, &mut self.arena),
            SetKind::Watchlist => (
                self.watchlist.as_mut().expect("no watchlist installed"),
                &mut self.arena,
            ),
        }
    }

    pub fn insert_into(&mut self, kind: SetKind, id: StepId) {
        let (set, arena) = self.set_and_arena_mut(kind);
        set.insert(arena, id);
    }

    pub fn extract_from(&mut self, kind: SetKind, id: StepId) {
        let (set, arena) = self.set_and_arena_mut(kind);
        set.extract(arena, id);
    }

    pub fn proc_cardinality(&self) -> usize {
        self.processed_pos_rules.len()
            + self.processed_pos_eqns.len()
            + self.processed_neg_units.len()
            + self.processed_non_units.len()
    }

    pub fn unproc_cardinality(&self) -> usize {
        self.unprocessed.len()
    }

    pub fn cardinality(&self) -> usize {
        self.proc_cardinality()
            + self.unproc_cardinality()
            + self.tmp_store.len()
            + self.eval_store.len()
    }

    /// A coarse storage estimate driving the delete-bad maintenance.
    pub fn storage_estimate(&self) -> u64 {
        let mut total = 0u64;
        for &id in self.unprocessed.iter() {
            total += self.arena.get(id).weight as u64;
        }
        for kind in ProofState::processed_kinds() {
            for &id in self.set(kind).iter() {
                total += self.arena.get(id).weight as u64;
            }
        }
        total
    }

    /// The rewrite-system date: the youngest demodulator installed.
    pub fn demod_max_date(&self) -> u64 {
        self.processed_pos_rules
            .date
            .max(self.processed_pos_eqns.date)
    }

    /// Retires a clause: unlinks it from the global indices, extracts it from
    /// its set, marks it Dead and moves it to the archive. The arena keeps it
    /// alive for the derivation graph.
    pub fn retire(&mut self, id: StepId, kind: SetKind) {
        let in_watchlist = kind == SetKind::Watchlist;
        {
            let step = self.arena.get_mut(id);
            if in_watchlist {
                self.wlindices.delete_clause(step);
            } else {
                self.gindices.delete_clause(step);
            }
        }
        self.extract_from(kind, id);
        let step = self.arena.get_mut(id);
        step.flags.set(ClauseFlags::DEAD);
        self.archive.insert(&mut self.arena, id);
    }

    /// Removes every clause in the set subsumed by the subsumer, killing the
    /// still-unprocessed children of each casualty. Returns how many clauses
    /// were removed. Never evicts the subsumer itself.
    pub fn remove_subsumed(&mut self, subsumer: &PackedClause, kind: SetKind) -> u64 {
        let candidates = self.set(kind).find_subsumed_candidates(subsumer);
        let subsumer_clause = self.arena.get(subsumer.id).clause.clone();
        let mut removed = 0;
        for id in candidates {
            if id == subsumer.id {
                continue;
            }
            if !self.set(kind).contains(id) {
                continue;
            }
            let target = self.arena.get(id);
            if target.is_dead() {
                continue;
            }
            if !clause_subsumes(&subsumer_clause, &target.clause) {
                continue;
            }
            if target.flags.query(ClauseFlags::WATCH_ONLY) {
                debug!("# extracting subsumed watchlist clause: {}", target.clause);
            } else {
                debug!("# subsumed: {}", target.clause);
            }
            self.retire(id, kind);
            self.kill_unprocessed_children(id);
            removed += 1;
        }
        removed
    }

    /// Children of a retired clause that never got processed are orphans;
    /// delete them right away.
    pub fn kill_unprocessed_children(&mut self, id: StepId) {
        let children = self.arena.get(id).children.clone();
        for child in children {
            if self.arena.get(child).is_dead() {
                continue;
            }
            match self.arena.get(child).set {
                Some(kind @ SetKind::Unprocessed) | Some(kind @ SetKind::EvalStore) => {
                    self.extract_from(kind, child);
                    let step = self.arena.get_mut(child);
                    step.flags.set(ClauseFlags::DEAD);
                    self.archive.insert(&mut self.arena, child);
                }
                _ => {}
            }
        }
    }

    /// Moves a new clause into the arena and tmp_store, interning its terms.
    pub fn add_to_tmp_store(&mut self, id: StepId) {
        let clause = self.arena.get(id).clause.clone();
        self.tmp_terms.intern_clause(&clause);
        self.tmp_store.insert(&mut self.arena, id);
    }

    /// Initializes the feature-vector indices and moves the axioms into the
    /// unprocessed set, evaluated and flagged Initial. Mirrors the contract
    /// that the processed sets must be empty at init.
    pub fn init(&mut self, control: &mut ProofControl) {
        assert!(self.processed_pos_rules.is_empty());
        assert!(self.processed_pos_eqns.is_empty());
        assert!(self.processed_neg_units.is_empty());
        assert!(self.processed_non_units.is_empty());

        info!("# Initializing proof state");

        if !self.fvi_initialized {
            self.fvi_initialized = true;
            let parms = control.fvi_parms;
            self.processed_pos_rules.enable_fv_index(&self.arena, parms);
            self.processed_pos_eqns.enable_fv_index(&self.arena, parms);
            self.processed_neg_units.enable_fv_index(&self.arena, parms);
            self.processed_non_units.enable_fv_index(&self.arena, parms);
            if let Some(watchlist) = &mut self.watchlist {
                watchlist.enable_fv_index(&self.arena, parms);
            }
        }

        let axioms = self.axioms.clone();
        for clause in axioms {
            let mut clause = clause;
            clause.orient(&control.kbo);
            self.terms.intern_clause(&clause);
            let id = self.arena.new_assumption(clause);
            if control.heuristic_parms.use_tptp_sos {
                // Negative clauses form the initial set of support.
                if self.arena.get(id).clause.is_negative() {
                    self.arena.get_mut(id).sos = true;
                }
            }
            crate::watchlist::check_watchlist(self, control, id);
            let eval = control.evaluate(self.arena.get(id));
            self.arena.get_mut(id).eval = Some(eval);
            self.unprocessed.insert(&mut self.arena, id);
        }

        if control.heuristic_parms.ac_handling != AcHandling::NoHandling {
            debug!("# Scanning for AC axioms");
            let mut found = false;
            for &id in self.unprocessed.iter() {
                if self.signature.scan_ac(&self.arena.get(id).clause) {
                    found = true;
                }
            }
            if found && !control.ac_handling_active {
                control.ac_handling_active = true;
                info!("# AC handling enabled");
            }
        }

        self.gindices = GlobalIndices::new(control.fvi_parms.use_global_indices);
        self.wlindices = GlobalIndices::new(
            control.fvi_parms.use_global_indices && self.watchlist.is_some(),
        );
    }

    /// Debug-only invariant check: partitions are disjoint, flags are
    /// coherent, archive members are Dead and appear nowhere else.
    #[cfg(test)]
    pub fn check_invariants(&self) {
        use fxhash::FxHashSet;
        let mut seen: FxHashSet<StepId> = FxHashSet::default();
        for kind in ProofState::processed_kinds() {
            for &id in self.set(kind).iter() {
                assert!(seen.insert(id), "clause {} is in two processed sets", id);
                let step = self.arena.get(id);
                assert!(step.flags.query(ClauseFlags::PROCESSED));
                assert!(!step.is_dead());
                assert_eq!(step.set, Some(kind));
            }
        }
        for &id in self.archive.iter() {
            assert!(!seen.contains(&id));
            let step = self.arena.get(id);
            assert!(step.is_dead() || step.flags.query(ClauseFlags::WATCH_ONLY));
            assert!(!step.flags.query(ClauseFlags::GLOBAL_INDEXED));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_vector::FvIndexParms;
    use crate::control::HeuristicParms;

    fn basic_state(clauses: &[&str]) -> (ProofState, ProofControl) {
        let axioms = clauses.iter().map(|s| Clause::parse(s)).collect();
        let mut state = ProofState::new(Signature::new(), axioms);
        let mut control = ProofControl::new(HeuristicParms::default(), FvIndexParms::default());
        state.init(&mut control);
        (state, control)
    }

    #[test]
    fn test_init_moves_axioms_to_unprocessed() {
        let (state, _) = basic_state(&["c0(x0)", "not c0(c1)"]);
        assert_eq!(state.unprocessed.len(), 2);
        assert_eq!(state.proc_cardinality(), 0);
        for &id in state.unprocessed.iter() {
            let step = state.arena.get(id);
            assert!(step.flags.query(ClauseFlags::INITIAL));
            assert!(step.eval.is_some());
        }
    }

    #[test]
    fn test_remove_subsumed_never_evicts_subsumer() {
        let (mut state, _) = basic_state(&[]);
        let general = state.arena.new_assumption(Clause::parse("c0(x0)"));
        state.processed_pos_rules.insert(&mut state.arena, general);
        let packed = PackedClause::pack(
            &state.arena,
            &FvIndexParms::default(),
            general,
        );
        let removed = state.remove_subsumed(&packed, SetKind::PosRules);
        assert_eq!(removed, 0);
        assert!(state.processed_pos_rules.contains(general));
    }

    #[test]
    fn test_remove_subsumed_kills_children() {
        let (mut state, _) = basic_state(&[]);
        let general = state.arena.new_assumption(Clause::parse("c0(x0)"));
        let specific = state.arena.new_assumption(Clause::parse("c0(c1) | c2(c1)"));
        state.processed_non_units.insert(&mut state.arena, specific);

        // A child of the specific clause, waiting in unprocessed.
        let child = state.arena.new_step(
            Clause::parse("c2(c1)"),
            crate::proof_step::Rule::EqualityResolution(specific),
        );
        state.unprocessed.insert(&mut state.arena, child);

        let packed = PackedClause::pack(&state.arena, &FvIndexParms::default(), general);
        let removed = state.remove_subsumed(&packed, SetKind::NonUnits);
        assert_eq!(removed, 1);
        assert!(state.arena.get(specific).is_dead());
        assert!(state.arena.get(child).is_dead());
        assert!(state.unprocessed.is_empty());
        assert_eq!(state.archive.len(), 2);
    }

    #[test]
    fn test_ac_scan_at_init() {
        let (_, control) = basic_state(&[
            "c0(x0, x1) = c0(x1, x0)",
            "c0(c0(x0, x1), x2) = c0(x0, c0(x1, x2))",
        ]);
        assert!(control.ac_handling_active);
    }
}
