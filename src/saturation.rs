use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use crate::backward_simplify::{
    eliminate_backward_rewritten_clauses, eliminate_backward_subsumed_clauses,
    eliminate_context_sr_clauses, eliminate_unit_simplified_clauses,
};
use crate::control::{ProofControl, RewriteLevel, SelectionStrategy};
use crate::forward_simplify::{
    destroy_floating, er_normalize_var, forward_contract_clause, forward_contract_set,
    forward_modify_clause,
};
use crate::paramodulation::{
    compute_all_eqn_resolvents, compute_all_equality_factors, compute_all_paramodulants,
};
use crate::proof_step::{ClauseFlags, SetKind, StepId};
use crate::sat_check::sat_check;
use crate::schema::compute_replacement;
use crate::split::controlled_clause_split;
use crate::state::ProofState;
use crate::watchlist::{check_watchlist, simplify_watchlist};

/// Resource limits for a saturation run. Everything defaults to "unlimited";
/// the time flag is polled at each loop head.
#[derive(Clone)]
pub struct SaturateLimits {
    pub step_limit: u64,
    pub proc_limit: u64,
    pub unproc_limit: u64,
    pub total_limit: u64,
    pub generated_limit: u64,
    pub tb_insert_limit: u64,
    pub deadline: Option<Instant>,
    pub time_up: Option<Arc<AtomicBool>>,
}

impl Default for SaturateLimits {
    fn default() -> SaturateLimits {
        SaturateLimits {
            step_limit: u64::MAX,
            proc_limit: u64::MAX,
            unproc_limit: u64::MAX,
            total_limit: u64::MAX,
            generated_limit: u64::MAX,
            tb_insert_limit: u64::MAX,
            deadline: None,
            time_up: None,
        }
    }
}

impl SaturateLimits {
    fn time_is_up(&self) -> bool {
        if let Some(flag) = &self.time_up {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        false
    }
}

// Add evaluations to everything awaiting them, then move it to unprocessed.
fn eval_clause_set(state: &mut ProofState, control: &ProofControl) {
    let ids = state.eval_store.ids();
    for id in ids {
        let eval = control.evaluate(state.arena.get(id));
        state.arena.get_mut(id).eval = Some(eval);
    }
    while let Some(id) = state.eval_store.extract_first(&mut state.arena) {
        state.unprocessed.insert(&mut state.arena, id);
    }
}

/// Drains tmp_store: rewrite each clause, drop the trivial ones, let the
/// aggressive replacing inferences have a shot, then evaluate the survivors
/// into unprocessed. Returns an empty clause the moment one appears.
pub fn insert_new_clauses(state: &mut ProofState, control: &ProofControl) -> Option<StepId> {
    state.counters.generated_count += state.tmp_store.len() as u64;
    for &id in state.tmp_store.iter() {
        state.counters.generated_lit_count += state.arena.get(id).clause.len() as u64;
    }

    while let Some(id) = state.tmp_store.extract_first(&mut state.arena) {
        let parms = &control.heuristic_parms;
        let context_sr = parms.forward_context_sr_aggressive
            || (parms.backward_context_sr
                && state.arena.get(id).flags.query(ClauseFlags::PROCESSED));

        if state.arena.get(id).flags.query(ClauseFlags::IR_VICTIM) {
            debug_assert!(state.arena.get(id).flags.query(ClauseFlags::LIMITED_RW));
            // Re-entry path: interreduction victims get the full treatment.
            let step = state.arena.get_mut(id);
            step.flags.del(ClauseFlags::LIMITED_RW);
            step.flags.del(ClauseFlags::IR_VICTIM);
            forward_modify_clause(
                state,
                control,
                id,
                context_sr,
                parms.condensing_aggressive,
                RewriteLevel::Full,
            );
        }
        forward_modify_clause(
            state,
            control,
            id,
            context_sr,
            parms.condensing_aggressive,
            parms.forward_demod,
        );

        let step = state.arena.get(id);
        let trivial = if control.ac_handling_active {
            step.clause.is_tautology_ac(&state.signature)
        } else {
            step.clause.is_tautology()
        };
        if trivial {
            destroy_floating(state, id);
            continue;
        }
        check_watchlist(state, control, id);
        if state.arena.get(id).clause.is_empty() {
            return Some(id);
        }
        if parms.er_aggressive && parms.er_varlit_destructive {
            let count = er_normalize_var(state, control, id);
            if count > 0 {
                state.counters.other_redundant_count += count;
                state.counters.resolv_count += count;
                state.counters.generated_count += count;
                continue;
            }
        }
        if parms.split_aggressive {
            let count = controlled_clause_split(state, control, id);
            if count > 0 {
                state.counters.generated_count += count;
                continue;
            }
        }
        state.counters.non_trivial_generated_count += 1;

        {
            let step = state.arena.get_mut(id);
            step.flags.del(ClauseFlags::ORIENTED);
            step.create_date = state.counters.proc_non_trivial_count;
        }
        if !parms.select_on_proc_only {
            let mut clause = state.arena.get(id).clause.clone();
            control.do_literal_selection(&mut clause);
            state.arena.get_mut(id).clause = clause;
        } else {
            let step = state.arena.get_mut(id);
            step.clause.clear_selection();
        }
        state.eval_store.insert(&mut state.arena, id);
    }

    eval_clause_set(state, control);
    None
}

// Destructive equality resolution and controlled splitting; the inferences
// that replace a clause outright. Returns None when the clause survived,
// otherwise the result of flushing tmp_store.
enum Replaced {
    Kept,
    Consumed(Option<StepId>),
}

fn replacing_inferences(
    state: &mut ProofState,
    control: &mut ProofControl,
    id: StepId,
) -> Replaced {
    let parms = &control.heuristic_parms;
    if parms.er_varlit_destructive {
        let count = er_normalize_var(state, control, id);
        if count > 0 {
            state.counters.other_redundant_count += count;
            state.counters.resolv_count += count;
            return Replaced::Consumed(insert_new_clauses(state, control));
        }
    }
    if controlled_clause_split(state, control, id) > 0 {
        return Replaced::Consumed(insert_new_clauses(state, control));
    }
    Replaced::Kept
}

fn check_ac_status(state: &mut ProofState, control: &mut ProofControl, id: StepId) {
    if control.heuristic_parms.ac_handling == crate::control::AcHandling::NoHandling {
        return;
    }
    let clause = state.arena.get(id).clause.clone();
    if state.signature.scan_ac(&clause) && !control.ac_handling_active {
        control.ac_handling_active = true;
        info!("# AC handling enabled dynamically");
    }
}

/// Select an unprocessed clause and process it: the core of the proof
/// procedure. Returns the empty clause if one is derived, None otherwise.
pub fn process_clause(state: &mut ProofState, control: &mut ProofControl) -> Option<StepId> {
    let id = control.hcb_select(&state.arena, &state.unprocessed)?;

    state.unprocessed.extract(&mut state.arena, id);
    {
        let step = state.arena.get_mut(id);
        step.eval = None;
        step.flags.set(ClauseFlags::PROCESSED);
        debug_assert!(!step.flags.query(ClauseFlags::IR_VICTIM));
    }
    state.counters.processed_count += 1;

    let parms = &control.heuristic_parms;
    let packed = forward_contract_clause(
        state,
        control,
        id,
        parms.forward_context_sr,
        parms.condensing,
        parms.forward_demod,
    )?;

    if state.arena.get(id).clause.is_empty() {
        state.extract_roots.push(id);
        return Some(id);
    }

    check_ac_status(state, control, id);
    info!("# {}", state.arena.get(id).clause);
    state.counters.proc_non_trivial_count += 1;

    match replacing_inferences(state, control, id) {
        Replaced::Kept => {}
        Replaced::Consumed(empty) => {
            if let Some(empty) = empty {
                state.extract_roots.push(empty);
                return Some(empty);
            }
            return None;
        }
    }

    check_watchlist(state, control, id);

    /* Now on to backward simplification. */
    eliminate_backward_rewritten_clauses(state, control, id);
    eliminate_backward_subsumed_clauses(state, &packed);
    eliminate_unit_simplified_clauses(state, control, id);
    eliminate_context_sr_clauses(state, control, id);
    for victim in state.tmp_store.ids() {
        let step = state.arena.get_mut(victim);
        step.flags.set(ClauseFlags::IR_VICTIM);
        step.flags.set(ClauseFlags::LIMITED_RW);
    }

    let clausedate = if state.arena.get(id).clause.is_demodulator_shape() {
        state.system_date
    } else {
        state.demod_max_date()
    };

    {
        let step = state.arena.get_mut(id);
        step.clause.normalize_vars();
        step.date = clausedate;
        step.flags.set(ClauseFlags::LIMITED_RW);
        step.flags.set(ClauseFlags::ORIENTED);
    }

    // Install into the proper processed partition.
    let clause = state.arena.get(id).clause.clone();
    let kind = if clause.is_demodulator_shape() {
        if clause.literals[0].oriented {
            state.processed_pos_rules.date = clausedate;
            SetKind::PosRules
        } else {
            state.processed_pos_eqns.date = clausedate;
            SetKind::PosEqns
        }
    } else if clause.is_unit() {
        SetKind::NegUnits
    } else {
        SetKind::NonUnits
    };
    state.insert_into(kind, id);
    {
        let step = state.arena.get_mut(id);
        state.gindices.insert_clause(step);
    }

    if state.watchlist.is_some() && control.heuristic_parms.watchlist_simplify {
        simplify_watchlist(state, control, id);
    }

    if control.heuristic_parms.selection_strategy != SelectionStrategy::NoGeneration {
        generate_new_clauses(state, control, id);
    }

    if state.tmp_terms.needs_gc() {
        state.tmp_terms.sweep_all();
    }
    if state.terms.needs_gc() {
        let live: Vec<crate::clause::Clause> =
            state.arena.iter().map(|step| step.clause.clone()).collect();
        state.terms.gc_sweep(live.iter());
    }

    if control.heuristic_parms.detsort_tmpset {
        let (tmp_store, arena) = state.set_and_arena_mut(SetKind::TmpStore);
        tmp_store.sort_by_weight(arena);
    }

    if let Some(empty) = insert_new_clauses(state, control) {
        state.extract_roots.push(empty);
        return Some(empty);
    }
    None
}

/// Apply the generating inferences to the just-processed clause, putting new
/// clauses into tmp_store. Schema expansion runs first, then equality
/// factoring and resolution, then paramodulation.
fn generate_new_clauses(state: &mut ProofState, control: &ProofControl, id: StepId) {
    state.counters.paramod_count += compute_replacement(state, control, id);

    if control.heuristic_parms.enable_eq_factoring {
        state.counters.factor_count += compute_all_equality_factors(state, control, id);
    }
    state.counters.resolv_count += compute_all_eqn_resolvents(state, control, id);
    state.counters.paramod_count += compute_all_paramodulants(state, control, id);
}

// Delete unprocessed clauses whose parents have been retired.
fn delete_orphans(state: &mut ProofState) -> u64 {
    let ids = state.unprocessed.ids();
    let mut deleted = 0;
    for id in ids {
        let orphaned = state
            .arena
            .get(id)
            .rule
            .premises()
            .iter()
            .any(|&p| state.arena.get(p).is_dead());
        if orphaned {
            state.unprocessed.extract(&mut state.arena, id);
            destroy_floating(state, id);
            deleted += 1;
        }
    }
    deleted
}

/// Bounded maintenance of the unprocessed set: orphan filtering, the forward
/// contraction sweep with reweighting, and the delete-bad emergency valve
/// that makes the state incomplete.
pub fn cleanup_unprocessed_clauses(
    state: &mut ProofState,
    control: &ProofControl,
) -> Option<StepId> {
    let parms = &control.heuristic_parms;
    let back_simplified =
        state.counters.backward_subsumed_count + state.counters.backward_rewritten_count;

    if back_simplified.saturating_sub(state.filter_orphans_base) > parms.filter_orphans_limit {
        let deleted = delete_orphans(state);
        info!(
            "# Deleted {} orphaned clauses (remaining: {})",
            deleted,
            state.unprocessed.len()
        );
        state.counters.other_redundant_count += deleted;
        state.filter_orphans_base = back_simplified;
    }

    if state
        .counters
        .processed_count
        .saturating_sub(state.forward_contract_base)
        > parms.forward_contract_limit
    {
        let before = state.unprocessed.len();
        let unsatisfiable =
            forward_contract_set(state, control, SetKind::Unprocessed, RewriteLevel::Full);
        if let Some(empty) = unsatisfiable {
            state.extract_roots.push(empty);
            return Some(empty);
        }
        info!(
            "# Special forward-contraction deletes {} clauses (remaining: {})",
            before - state.unprocessed.len(),
            state.unprocessed.len()
        );
        state.forward_contract_base = state.counters.processed_count;
        info!("# Reweighting unprocessed clauses...");
        let ids = state.unprocessed.ids();
        for id in ids {
            state.arena.get_mut(id).recompute_weight();
            let eval = control.evaluate(state.arena.get(id));
            state.arena.get_mut(id).eval = Some(eval);
        }
    }

    if state.storage_estimate() > parms.delete_bad_limit {
        let orphans = delete_orphans(state);
        state.counters.non_redundant_deleted += orphans;
        let target_size = state.unprocessed.len() / 2;
        let mut ids = state.unprocessed.ids();
        // Worst clauses go first.
        ids.sort_by_key(|&id| {
            let step = state.arena.get(id);
            let eval = step.eval.expect("unprocessed clause missing evaluation");
            (std::cmp::Reverse((eval.priority, eval.weight)), id)
        });
        let mut deleted = 0;
        for id in ids {
            if state.unprocessed.len() <= target_size {
                break;
            }
            state.unprocessed.extract(&mut state.arena, id);
            destroy_floating(state, id);
            deleted += 1;
        }
        info!(
            "# Deleted {} orphaned clauses and {} bad clauses (prover may be incomplete now)",
            orphans, deleted
        );
        if deleted > 0 {
            state.state_is_complete = false;
        }
    }
    None
}

/// Process clauses until the empty clause is derived, the unprocessed set is
/// exhausted, or a resource limit fires. Returns the empty clause if found.
pub fn saturate(
    state: &mut ProofState,
    control: &mut ProofControl,
    limits: &SaturateLimits,
) -> Option<StepId> {
    let parms_grounding = control.heuristic_parms.sat_check_grounding;
    let mut sat_check_size_limit = control.heuristic_parms.sat_check_size_limit;
    let mut sat_check_step_limit = control.heuristic_parms.sat_check_step_limit;
    let mut sat_check_ttinsert_limit = control.heuristic_parms.sat_check_ttinsert_limit;
    let mut count: u64 = 0;

    while !limits.time_is_up()
        && !state.unprocessed.is_empty()
        && limits.step_limit > count
        && limits.proc_limit > state.proc_cardinality() as u64
        && limits.unproc_limit > state.unproc_cardinality() as u64
        && limits.total_limit > state.cardinality() as u64
        && limits.generated_limit
            > state
                .counters
                .generated_count
                .saturating_sub(state.counters.backward_rewritten_count)
        && limits.tb_insert_limit > state.terms.insertions() + state.tmp_terms.insertions()
        && (state.watchlist.is_none() || !state.watchlist.as_ref().unwrap().is_empty())
    {
        count += 1;
        if let Some(unsatisfiable) = process_clause(state, control) {
            return Some(unsatisfiable);
        }
        if let Some(unsatisfiable) = cleanup_unprocessed_clauses(state, control) {
            return Some(unsatisfiable);
        }
        if parms_grounding != crate::control::GroundingMode::NoGrounding {
            let mut unsatisfiable = None;
            if state.cardinality() as u64 >= sat_check_size_limit {
                unsatisfiable = sat_check(state, control);
                while sat_check_size_limit <= state.cardinality() as u64 {
                    sat_check_size_limit += control.heuristic_parms.sat_check_size_limit;
                }
            } else if state.counters.proc_non_trivial_count >= sat_check_step_limit {
                unsatisfiable = sat_check(state, control);
                sat_check_step_limit += control.heuristic_parms.sat_check_step_limit;
            } else if state.terms.insertions() >= sat_check_ttinsert_limit {
                unsatisfiable = sat_check(state, control);
                sat_check_ttinsert_limit *= 2;
            }
            if let Some(unsatisfiable) = unsatisfiable {
                state.extract_roots.push(unsatisfiable);
                return Some(unsatisfiable);
            }
        }
    }
    debug!(
        "# Saturation stopped after {} iterations ({} processed)",
        count, state.counters.processed_count
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Clause;
    use crate::control::HeuristicParms;
    use crate::feature_vector::FvIndexParms;
    use crate::signature::Signature;

    fn prove_limited(
        axioms: &[&str],
        parms: HeuristicParms,
        step_limit: u64,
    ) -> (ProofState, Option<StepId>) {
        let clauses = axioms.iter().map(|s| Clause::parse(s)).collect();
        let mut state = ProofState::new(Signature::new(), clauses);
        let mut control = ProofControl::new(parms, FvIndexParms::default());
        state.init(&mut control);
        let limits = SaturateLimits {
            step_limit,
            ..SaturateLimits::default()
        };
        let result = saturate(&mut state, &mut control, &limits);
        (state, result)
    }

    fn prove(axioms: &[&str], parms: HeuristicParms) -> (ProofState, Option<StepId>) {
        prove_limited(axioms, parms, u64::MAX)
    }

    #[test]
    fn test_direct_contradiction() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (state, result) = prove(&["c0(c1)", "not c0(c1)"], HeuristicParms::default());
        let empty = result.expect("expected a refutation");
        assert!(state.arena.get(empty).clause.is_empty());
        assert_eq!(state.extract_roots.len(), 1);
    }

    #[test]
    fn test_paramodulation_refutation() {
        // a = b together with f(a) != f(b) refutes via rewriting the
        // inequality to f(b) != f(b).
        let (state, result) = prove(&["c0 = c1", "c2(c0) != c2(c1)"], HeuristicParms::default());
        assert!(result.is_some());
        assert_eq!(state.extract_roots.len(), 1);
    }

    #[test]
    fn test_saturation_without_proof() {
        // Ground axioms, so schema expansion stays quiet and the set
        // genuinely saturates.
        let (state, result) = prove(&["c0(c1)", "c2(c3)"], HeuristicParms::default());
        assert!(result.is_none());
        assert!(state.unprocessed.is_empty());
        assert!(state.state_is_complete);
    }

    #[test]
    fn test_step_limit_stops_search() {
        let clauses = ["c0(c1)", "not c0(x0) | c0(c2(x0))"]
            .iter()
            .map(|s| Clause::parse(s))
            .collect();
        let mut state = ProofState::new(Signature::new(), clauses);
        let mut control = ProofControl::new(HeuristicParms::default(), FvIndexParms::default());
        state.init(&mut control);
        let mut limits = SaturateLimits::default();
        limits.step_limit = 3;
        let result = saturate(&mut state, &mut control, &limits);
        assert!(result.is_none());
        assert_eq!(state.counters.processed_count, 3);
    }

    #[test]
    fn test_condensing_scenario() {
        let mut parms = HeuristicParms::default();
        parms.condensing = true;
        let (state, result) = prove_limited(&["c0(x0) | c0(x1)"], parms, 1);
        assert!(result.is_none());
        // Condensing reduced the clause to a unit during forward
        // simplification, so the non-unit partition never sees it.
        assert!(state.processed_non_units.is_empty());
        assert_eq!(state.proc_cardinality(), 1);
    }

    #[test]
    fn test_watchlist_scenario() {
        let mut state = ProofState::new(Signature::new(), vec![Clause::parse("c0")]);
        state.set_watchlist(vec![Clause::parse("c0")]);
        let mut control = ProofControl::new(HeuristicParms::default(), FvIndexParms::default());
        state.init(&mut control);
        // The initial clause subsumes the watch target during init.
        assert!(state.watchlist.as_ref().unwrap().is_empty());
        let initial = state.unprocessed.ids()[0];
        assert!(state
            .arena
            .get(initial)
            .flags
            .query(ClauseFlags::SUBSUMES_WATCH));
        // With the watchlist emptied, saturation stops immediately.
        let result = saturate(&mut state, &mut control, &SaturateLimits::default());
        assert!(result.is_none());
        assert_eq!(state.counters.processed_count, 0);
    }

    #[test]
    fn test_schema_generation_counts() {
        let mut parms = HeuristicParms::default();
        // Keep the run short; one processed clause is enough.
        parms.selection_strategy = SelectionStrategy::NoSelection;
        let clauses = vec![Clause::parse("c0(x0, x1)")];
        let mut state = ProofState::new(Signature::new(), clauses);
        let mut control = ProofControl::new(parms, FvIndexParms::default());
        state.init(&mut control);
        let mut limits = SaturateLimits::default();
        limits.step_limit = 1;
        saturate(&mut state, &mut control, &limits);
        // The two replacement orientations were CNF-translated and counted.
        assert_eq!(state.f_axioms.len(), 2);
        assert!(state.counters.generated_count > 0);
        assert!(state.unprocessed.len() > 0);
    }

    #[test]
    fn test_invariants_after_saturation() {
        let (state, _) = prove_limited(
            &["c0(c1) = c1", "c0(x0) = x0 | c2(x0)", "not c2(c1)"],
            HeuristicParms::default(),
            20,
        );
        state.check_invariants();
    }

    #[test]
    fn test_backward_subsumption_during_run() {
        // FIFO order processes the specific clause first; activating the
        // general unit afterwards retires it backward.
        let mut parms = HeuristicParms::default();
        parms.heuristic_name = "FIFO".to_string();
        let (state, result) = prove_limited(&["c0(c1) | c2(c3)", "c0(x0)"], parms, 2);
        assert!(result.is_none());
        assert_eq!(state.counters.backward_subsumed_count, 1);
        assert!(state.processed_non_units.is_empty());
    }
}
