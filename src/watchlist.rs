use log::{debug, info};

use crate::clause_sets::PackedClause;
use crate::control::ProofControl;
use crate::demodulation::Demodulators;
use crate::proof_step::{ClauseFlags, SetKind, StepId};
use crate::state::ProofState;
use crate::subsumption::clause_subsumes;

/// The watchlist tracks user-supplied goal clauses. Clauses that subsume a
/// watch member get flagged (and boosted by the heuristic); with a dynamic
/// watchlist the subsumed members are removed, so an empty watchlist means
/// every goal has been hit.

pub fn check_watchlist(state: &mut ProofState, control: &ProofControl, id: StepId) {
    if state.watchlist.is_none() {
        return;
    }
    state.arena.get_mut(id).recompute_weight();
    if control.heuristic_parms.watchlist_is_static {
        let clause = state.arena.get(id).clause.clone();
        let watch_ids = state.watchlist.as_ref().unwrap().ids();
        for wid in watch_ids {
            if clause_subsumes(&clause, &state.arena.get(wid).clause) {
                state
                    .arena
                    .get_mut(id)
                    .flags
                    .set(ClauseFlags::SUBSUMES_WATCH);
                return;
            }
        }
    } else {
        let packed = PackedClause::pack(&state.arena, &control.fvi_parms, id);
        let removed = state.remove_subsumed(&packed, SetKind::Watchlist);
        if removed > 0 {
            state
                .arena
                .get_mut(id)
                .flags
                .set(ClauseFlags::SUBSUMES_WATCH);
            info!(
                "# Watchlist reduced by {} clause{}",
                removed,
                if removed == 1 { "" } else { "s" }
            );
        }
    }
}

/// Keeps the watchlist in normal form: when a new demodulator arrives,
/// rewrite every watch clause with the full rewrite system and reindex it.
pub fn simplify_watchlist(state: &mut ProofState, control: &ProofControl, id: StepId) {
    if state.watchlist.is_none() {
        return;
    }
    if !state.arena.get(id).clause.is_demodulator_shape() {
        return;
    }
    let watch_ids = state.watchlist.as_ref().unwrap().ids();
    let system_date = state.system_date;
    for wid in watch_ids {
        let clause = state.arena.get(wid).clause.clone();
        let result = {
            let demods = Demodulators {
                arena: &state.arena,
                kbo: &control.kbo,
                rules: &state.processed_pos_rules,
                eqns: &state.processed_pos_eqns,
                level: control.heuristic_parms.forward_demod,
                prefer_general: control.heuristic_parms.prefer_general,
                date_limit: None,
                exclude: None,
            };
            demods.normalize_clause(&mut state.tmp_terms, system_date, &clause)
        };
        let Some((mut new_clause, _)) = result else {
            continue;
        };
        debug!("# watchlist simplify: {} -> {}", clause, new_clause);
        new_clause.orient(&control.kbo);
        // Re-pack: membership and both indices must track the new shape.
        state.extract_from(SetKind::Watchlist, wid);
        {
            let step = state.arena.get_mut(wid);
            state.wlindices.delete_clause(step);
            step.clause = new_clause;
            step.recompute_weight();
        }
        {
            let step = state.arena.get_mut(wid);
            state.wlindices.insert_clause(step);
        }
        state.insert_into(SetKind::Watchlist, wid);
    }
}
