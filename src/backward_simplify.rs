use log::debug;

use crate::clause::Clause;
use crate::clause_sets::PackedClause;
use crate::control::ProofControl;
use crate::proof_step::{ClauseFlags, SetKind, StepId};
use crate::state::ProofState;
use crate::subsumption::{contextual_literal_cut, unit_cut_indices, Matcher};
use crate::term::Term;

/// Backward simplification: once a clause enters the processed set, evict the
/// processed clauses it makes redundant. Victims go to tmp_store (not the
/// archive) flagged IRVictim, so the re-entry path re-simplifies them fully.

fn move_victim_to_tmp(state: &mut ProofState, id: StepId, kind: SetKind, simplifier: StepId) {
    {
        let step = state.arena.get_mut(id);
        state.gindices.delete_clause(step);
    }
    state.extract_from(kind, id);
    let step = state.arena.get_mut(id);
    step.flags.set(ClauseFlags::IR_VICTIM);
    step.flags.set(ClauseFlags::LIMITED_RW);
    if !step.simplifiers.contains(&simplifier) {
        step.simplifiers.push(simplifier);
    }
    state.tmp_store.insert(&mut state.arena, id);
}

// Does the demodulator rewrite any subterm of the clause? For unorientable
// demodulators the matched instance must be ordered.
fn clause_rewritable_by(
    state: &ProofState,
    control: &ProofControl,
    clause: &Clause,
    demod: StepId,
) -> bool {
    let literal = &state.arena.get(demod).clause.literals[0];
    let sides: Vec<(&Term, &Term)> = if literal.oriented {
        vec![(&literal.left, &literal.right)]
    } else {
        vec![
            (&literal.left, &literal.right),
            (&literal.right, &literal.left),
        ]
    };
    for target_literal in &clause.literals {
        for term in [&target_literal.left, &target_literal.right] {
            for (_, subterm) in term.rewritable_subterms() {
                for (from, to) in &sides {
                    let mut matcher = Matcher::new();
                    if matcher.match_terms(from, subterm) {
                        if literal.oriented {
                            return true;
                        }
                        let reduct = matcher.apply(to);
                        if control.kbo.greater(subterm, &reduct) {
                            return true;
                        }
                    }
                }
            }
        }
    }
    false
}

/// If the new clause is a demodulator, advance the system date and move every
/// processed clause it can rewrite into tmp_store. Returns whether anything
/// was moved.
pub fn eliminate_backward_rewritten_clauses(
    state: &mut ProofState,
    control: &ProofControl,
    id: StepId,
) -> bool {
    let clause = state.arena.get(id).clause.clone();
    if !clause.is_demodulator_shape() {
        return false;
    }
    state.system_date += 1;

    let mut victims = vec![];
    if let Some(index) = &state.gindices.bw_rw {
        // Indexed path: candidate subterm positions that could be instances
        // of the demodulator's sides.
        let literal = &clause.literals[0];
        let mut patterns = vec![&literal.left];
        if !literal.oriented {
            patterns.push(&literal.right);
        }
        let mut candidate_steps = vec![];
        for pattern in patterns {
            for (_, pos) in index.find_instances(pattern) {
                if pos.step != id && !candidate_steps.contains(&pos.step) {
                    candidate_steps.push(pos.step);
                }
            }
        }
        for candidate in candidate_steps {
            let step = state.arena.get(candidate);
            if step.is_dead() {
                continue;
            }
            if let Some(kind) = step.set {
                if matches!(
                    kind,
                    SetKind::PosRules | SetKind::PosEqns | SetKind::NegUnits | SetKind::NonUnits
                ) && clause_rewritable_by(state, control, &step.clause, id)
                {
                    victims.push((candidate, kind));
                }
            }
        }
    } else {
        for kind in ProofState::processed_kinds() {
            for &candidate in state.set(kind).iter() {
                if candidate == id {
                    continue;
                }
                let step = state.arena.get(candidate);
                if clause_rewritable_by(state, control, &step.clause, id) {
                    victims.push((candidate, kind));
                }
            }
        }
    }

    let moved = !victims.is_empty();
    for (victim, kind) in victims {
        debug!(
            "# backward rewritable: {}",
            state.arena.get(victim).clause
        );
        state.counters.backward_rewritten_count += 1;
        state.counters.backward_rewritten_lit_count +=
            state.arena.get(victim).clause.len() as u64;
        move_victim_to_tmp(state, victim, kind, id);
    }

    if control.heuristic_parms.detsort_bw_rw {
        let (tmp_store, arena) = state.set_and_arena_mut(SetKind::TmpStore);
        tmp_store.sort_by_weight(arena);
    }
    moved
}

/// Backward subsumption with the class dispatch of the processed partitions.
/// A unit rewrite rule skips the positive partitions: a variant of an older
/// rule is already subsumed by that older rule, and evicting the older copy
/// would lose it.
pub fn eliminate_backward_subsumed_clauses(
    state: &mut ProofState,
    packed: &PackedClause,
) -> u64 {
    let clause = state.arena.get(packed.id).clause.clone();
    let mut removed = 0;
    if clause.is_unit() {
        if clause.literals[0].positive {
            let is_rw_rule = clause.literals[0].oriented;
            if !is_rw_rule {
                removed += state.remove_subsumed(packed, SetKind::PosRules);
                removed += state.remove_subsumed(packed, SetKind::PosEqns);
            }
            removed += state.remove_subsumed(packed, SetKind::NonUnits);
        } else {
            removed += state.remove_subsumed(packed, SetKind::NegUnits);
            removed += state.remove_subsumed(packed, SetKind::NonUnits);
        }
    } else {
        removed += state.remove_subsumed(packed, SetKind::NonUnits);
    }
    state.counters.backward_subsumed_count += removed;
    removed
}

/// Unit back-simplification: a non-rewrite-rule unit cuts opposite-sign
/// literal instances out of processed clauses; the cut clauses re-enter the
/// pipeline through tmp_store.
pub fn eliminate_unit_simplified_clauses(
    state: &mut ProofState,
    control: &ProofControl,
    id: StepId,
) {
    let clause = state.arena.get(id).clause.clone();
    if !clause.is_unit() || (clause.literals[0].positive && clause.literals[0].oriented) {
        return;
    }
    let unit = clause.literals[0].clone();
    let kinds: Vec<SetKind> = if unit.positive {
        vec![SetKind::NonUnits, SetKind::NegUnits]
    } else {
        vec![SetKind::NonUnits, SetKind::PosRules, SetKind::PosEqns]
    };
    for kind in kinds {
        let candidates = state.set(kind).ids();
        for candidate in candidates {
            if candidate == id {
                continue;
            }
            let target = state.arena.get(candidate).clause.clone();
            let cuts = unit_cut_indices(&unit, &target);
            if cuts.is_empty() {
                continue;
            }
            let literals = target
                .literals
                .iter()
                .enumerate()
                .filter(|(i, _)| !cuts.contains(i))
                .map(|(_, literal)| literal.clone())
                .collect();
            let mut new_clause = Clause::new(literals);
            new_clause.orient(&control.kbo);
            debug!("# unit simplified: {}", target);
            {
                let step = state.arena.get_mut(candidate);
                step.clause = new_clause;
                step.recompute_weight();
            }
            move_victim_to_tmp(state, candidate, kind, id);
        }
    }
}

/// Backward contextual simplify-reflect against the processed non-units.
pub fn eliminate_context_sr_clauses(
    state: &mut ProofState,
    control: &ProofControl,
    id: StepId,
) -> u64 {
    if !control.heuristic_parms.backward_context_sr {
        return 0;
    }
    let simplifier = state.arena.get(id).clause.clone();
    let mut removed = 0;
    let candidates = state.processed_non_units.ids();
    for candidate in candidates {
        if candidate == id {
            continue;
        }
        let target = state.arena.get(candidate).clause.clone();
        let Some(index) = contextual_literal_cut(&target, &simplifier) else {
            continue;
        };
        let literals = target
            .literals
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, literal)| literal.clone())
            .collect();
        let mut new_clause = Clause::new(literals);
        new_clause.orient(&control.kbo);
        {
            let step = state.arena.get_mut(candidate);
            step.clause = new_clause;
            step.recompute_weight();
        }
        move_victim_to_tmp(state, candidate, SetKind::NonUnits, id);
        removed += 1;
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::HeuristicParms;
    use crate::feature_vector::FvIndexParms;
    use crate::signature::Signature;

    fn setup() -> (ProofState, ProofControl) {
        let mut state = ProofState::new(Signature::new(), vec![]);
        let mut control = ProofControl::new(HeuristicParms::default(), FvIndexParms::default());
        state.init(&mut control);
        (state, control)
    }

    fn install(state: &mut ProofState, control: &ProofControl, s: &str) -> (StepId, SetKind) {
        let mut clause = Clause::parse(s);
        clause.orient(&control.kbo);
        let id = state.arena.new_assumption(clause);
        let step = state.arena.get_mut(id);
        step.flags.set(ClauseFlags::PROCESSED);
        let kind = if step.clause.is_demodulator_shape() {
            if step.clause.literals[0].oriented {
                SetKind::PosRules
            } else {
                SetKind::PosEqns
            }
        } else if step.clause.is_unit() {
            SetKind::NegUnits
        } else {
            SetKind::NonUnits
        };
        state.insert_into(kind, id);
        {
            let step = state.arena.get_mut(id);
            state.gindices.insert_clause(step);
        }
        (id, kind)
    }

    #[test]
    fn test_backward_rewritten_moves_to_tmp() {
        let (mut state, control) = setup();
        let (victim, _) = install(&mut state, &control, "c1(c0(c2))");
        let demod = state.arena.new_assumption({
            let mut c = Clause::parse("c0(x0) = x0");
            c.orient(&control.kbo);
            c
        });
        let moved = eliminate_backward_rewritten_clauses(&mut state, &control, demod);
        assert!(moved);
        assert_eq!(state.system_date, 1);
        assert!(state.tmp_store.contains(victim));
        let step = state.arena.get(victim);
        assert!(step.flags.query(ClauseFlags::IR_VICTIM));
        assert!(step.flags.query(ClauseFlags::LIMITED_RW));
        assert_eq!(state.counters.backward_rewritten_count, 1);
    }

    #[test]
    fn test_system_date_advances_only_for_demodulators() {
        let (mut state, control) = setup();
        let non_demod = state.arena.new_assumption(Clause::parse("not c0(c1)"));
        eliminate_backward_rewritten_clauses(&mut state, &control, non_demod);
        assert_eq!(state.system_date, 0);
    }

    #[test]
    fn test_backward_subsumption_dispatch() {
        let (mut state, control) = setup();
        let (long, _) = install(&mut state, &control, "c0(c1) | c2(c3)");
        let unit = state.arena.new_assumption({
            let mut c = Clause::parse("c0(x0)");
            c.orient(&control.kbo);
            c
        });
        let packed = PackedClause::pack(&state.arena, &FvIndexParms::default(), unit);
        let removed = eliminate_backward_subsumed_clauses(&mut state, &packed);
        assert_eq!(removed, 1);
        assert!(state.arena.get(long).is_dead());
        assert_eq!(state.counters.backward_subsumed_count, 1);
    }

    #[test]
    fn test_unit_rw_rule_does_not_evict_variant() {
        let (mut state, control) = setup();
        let (older, _) = install(&mut state, &control, "c0(x0) = x0");
        // A variant of the same rule.
        let variant = state.arena.new_assumption({
            let mut c = Clause::parse("c0(x1) = x1");
            c.orient(&control.kbo);
            c
        });
        let packed = PackedClause::pack(&state.arena, &FvIndexParms::default(), variant);
        let removed = eliminate_backward_subsumed_clauses(&mut state, &packed);
        assert_eq!(removed, 0);
        assert!(!state.arena.get(older).is_dead());
    }

    #[test]
    fn test_unit_simplification_cuts_and_moves() {
        let (mut state, control) = setup();
        let (target, _) = install(&mut state, &control, "c0(c1) | c2(c3)");
        // A negative unit cutting c0(c1).
        let unit = state.arena.new_assumption({
            let mut c = Clause::parse("not c0(x0)");
            c.orient(&control.kbo);
            c
        });
        eliminate_unit_simplified_clauses(&mut state, &control, unit);
        assert!(state.tmp_store.contains(target));
        assert_eq!(format!("{}", state.arena.get(target).clause), "c2(c3)");
    }
}
