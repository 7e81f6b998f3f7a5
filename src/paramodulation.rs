use std::cmp::Ordering;

use crate::clause::Clause;
use crate::clause_sets::{PmFromPos, PmIntoPos};
use crate::control::{ParamodType, ProofControl};
use crate::literal::Literal;
use crate::proof_step::{Rule, SetKind, StepId};
use crate::state::ProofState;
use crate::unifier::{Scope, Unifier};

/// The generating inferences: equality factoring, equality resolution, and
/// ordered paramodulation/superposition. All results land in tmp_store,
/// pre-evaluation.

// A literal is eligible for inferences if it is selected, or maximal when the
// clause has no selection.
fn eligible(clause: &Clause, literal: &Literal) -> bool {
    if clause.has_selection() {
        literal.selected
    } else {
        literal.maximal
    }
}

fn push_generated(state: &mut ProofState, control: &ProofControl, clause: Clause, rule: Rule) -> bool {
    if clause.is_tautology() {
        return false;
    }
    let mut clause = clause;
    clause.orient(&control.kbo);
    let id = state.arena.new_step(clause, rule);
    state.add_to_tmp_store(id);
    true
}

/// Equality factoring: from s = t | u = v | R, when s and u unify, infer
/// sigma(t != v | u = v | R). Only maximal positive literals factor.
pub fn compute_all_equality_factors(
    state: &mut ProofState,
    control: &ProofControl,
    id: StepId,
) -> u64 {
    let clause = state.arena.get(id).clause.clone();
    if clause.num_positive_literals() < 2 || clause.has_selection() {
        return 0;
    }
    let mut count = 0;
    for i in 0..clause.literals.len() {
        let lit_i = &clause.literals[i];
        if !lit_i.positive || !lit_i.maximal {
            continue;
        }
        for j in 0..clause.literals.len() {
            if i == j || !clause.literals[j].positive {
                continue;
            }
            let lit_j = &clause.literals[j];
            for (_, s, t) in lit_i.both_term_pairs() {
                for (_, u, v) in lit_j.both_term_pairs() {
                    let mut unifier = Unifier::new(3);
                    if !unifier.unify(Scope::LEFT, s, Scope::LEFT, u) {
                        continue;
                    }
                    let new_left = unifier.apply(Scope::LEFT, t);
                    let new_right = unifier.apply(Scope::LEFT, v);
                    let mut literals = vec![Literal::new(false, new_left, new_right)];
                    for (k, literal) in clause.literals.iter().enumerate() {
                        if k == i {
                            continue;
                        }
                        let (unified, _) = unifier.apply_to_literal(Scope::LEFT, literal);
                        literals.push(unified);
                    }
                    if push_generated(
                        state,
                        control,
                        Clause::new(literals),
                        Rule::EqualityFactoring(id),
                    ) {
                        count += 1;
                    }
                }
            }
        }
    }
    count
}

/// Equality resolution: a negative literal u != v whose sides unify is
/// resolved away, keeping the instantiated rest of the clause.
pub fn compute_all_eqn_resolvents(
    state: &mut ProofState,
    control: &ProofControl,
    id: StepId,
) -> u64 {
    let clause = state.arena.get(id).clause.clone();
    let has_selection = clause.has_selection();
    let mut count = 0;
    for i in 0..clause.literals.len() {
        let literal = &clause.literals[i];
        if literal.positive || (has_selection && !literal.selected) {
            continue;
        }
        let mut unifier = Unifier::new(3);
        if !unifier.unify(Scope::LEFT, &literal.left, Scope::LEFT, &literal.right) {
            continue;
        }
        let mut literals = vec![];
        for (k, other) in clause.literals.iter().enumerate() {
            if k == i {
                continue;
            }
            let (unified, _) = unifier.apply_to_literal(Scope::LEFT, other);
            literals.push(unified);
        }
        if push_generated(
            state,
            control,
            Clause::new(literals),
            Rule::EqualityResolution(id),
        ) {
            count += 1;
        }
    }
    count
}

// The sides of a clause's literals usable as paramodulators.
fn from_positions(step_id: StepId, clause: &Clause) -> Vec<PmFromPos> {
    let mut positions = vec![];
    if clause.has_selection() {
        // A clause with selected literals only acts as a target.
        return positions;
    }
    for (lit, literal) in clause.literals.iter().enumerate() {
        if !literal.positive || !literal.maximal {
            continue;
        }
        if !literal.left.is_true() && literal.left.atomic_variable().is_none() {
            positions.push(PmFromPos {
                step: step_id,
                lit,
                left: true,
            });
        }
        if !literal.oriented
            && !literal.right.is_true()
            && literal.right.atomic_variable().is_none()
        {
            positions.push(PmFromPos {
                step: step_id,
                lit,
                left: false,
            });
        }
    }
    positions
}

// The subterm positions of a clause that paramodulation can act into.
fn into_positions(step_id: StepId, clause: &Clause) -> Vec<PmIntoPos> {
    let mut positions = vec![];
    for (lit, literal) in clause.literals.iter().enumerate() {
        if !eligible(clause, literal) {
            continue;
        }
        for (left, term) in [(true, &literal.left), (false, &literal.right)] {
            if !left && literal.oriented {
                continue;
            }
            for (path, _) in term.rewritable_subterms() {
                positions.push(PmIntoPos {
                    step: step_id,
                    lit,
                    left,
                    path,
                });
            }
        }
    }
    positions
}

// One paramodulation attempt. The paramodulator lives in the left scope and
// the target in the right scope, which keeps their variables disjoint.
fn try_paramod(
    state: &mut ProofState,
    control: &ProofControl,
    from: &PmFromPos,
    into: &PmIntoPos,
) -> bool {
    let from_clause = state.arena.get(from.step).clause.clone();
    let into_clause = state.arena.get(into.step).clause.clone();
    let from_literal = &from_clause.literals[from.lit];
    let (s, t) = if from.left {
        (&from_literal.left, &from_literal.right)
    } else {
        (&from_literal.right, &from_literal.left)
    };
    let into_literal = &into_clause.literals[into.lit];
    let into_side = if into.left {
        &into_literal.left
    } else {
        &into_literal.right
    };
    let Some(subterm) = into_side.subterm_at_path(&into.path) else {
        return false;
    };
    if subterm.atomic_variable().is_some() || subterm.is_true() {
        return false;
    }

    let mut unifier = Unifier::new(3);
    if !unifier.unify(Scope::LEFT, s, Scope::RIGHT, subterm) {
        return false;
    }

    if control.heuristic_parms.pm_type != ParamodType::Plain {
        // The instantiated paramodulator must still be ordered left-to-right.
        let sigma_s = unifier.apply(Scope::LEFT, s);
        let sigma_t = unifier.apply(Scope::LEFT, t);
        if control.kbo.term_cmp(&sigma_s, &sigma_t) == Some(Ordering::Less) {
            return false;
        }
        if control.heuristic_parms.pm_type == ParamodType::Super {
            // The rewritten side must not be below the other side.
            let other = if into.left {
                &into_literal.right
            } else {
                &into_literal.left
            };
            let sigma_u = unifier.apply(Scope::RIGHT, into_side);
            let sigma_v = unifier.apply(Scope::RIGHT, other);
            if control.kbo.term_cmp(&sigma_u, &sigma_v) == Some(Ordering::Less) {
                return false;
            }
        }
    }

    let literals = unifier.superpose_clauses(
        t,
        &from_clause,
        from.lit,
        &into.path,
        &into_clause,
        into.lit,
        into.left,
    );
    push_generated(
        state,
        control,
        Clause::new(literals),
        Rule::Paramodulation {
            from: from.step,
            into: into.step,
        },
    )
}

// Scan-path paramodulation of the given clause against one partner clause,
// in both directions.
fn paramod_pair(
    state: &mut ProofState,
    control: &ProofControl,
    given: StepId,
    partner: StepId,
) -> u64 {
    let given_clause = state.arena.get(given).clause.clone();
    let partner_clause = state.arena.get(partner).clause.clone();
    let mut count = 0;
    for from in from_positions(given, &given_clause) {
        for into in into_positions(partner, &partner_clause) {
            if try_paramod(state, control, &from, &into) {
                count += 1;
            }
        }
    }
    // The reverse direction; when the partner is the given clause itself the
    // first loop already covered every pair.
    if partner != given {
        for from in from_positions(partner, &partner_clause) {
            for into in into_positions(given, &given_clause) {
                if try_paramod(state, control, &from, &into) {
                    count += 1;
                }
            }
        }
    }
    count
}

/// Ordered paramodulation of the freshly processed clause against the
/// processed partitions. Uses the paramodulation indices when installed, the
/// set scan otherwise.
pub fn compute_all_paramodulants(
    state: &mut ProofState,
    control: &ProofControl,
    given: StepId,
) -> u64 {
    let given_clause = state.arena.get(given).clause.clone();
    let parms = &control.heuristic_parms;
    if !parms.enable_neg_unit_paramod && given_clause.is_unit() && given_clause.is_negative() {
        return 0;
    }

    if state.gindices.enabled() {
        return compute_all_paramodulants_indexed(state, control, given, &given_clause);
    }

    let mut count = 0;
    let mut partner_kinds = vec![SetKind::PosRules, SetKind::PosEqns, SetKind::NonUnits];
    if parms.enable_neg_unit_paramod && !given_clause.is_negative() {
        partner_kinds.push(SetKind::NegUnits);
    }
    for kind in partner_kinds {
        let partners = state.set(kind).ids();
        for partner in partners {
            count += paramod_pair(state, control, given, partner);
        }
    }
    count
}

// Indexed path: unify the given clause's paramodulator sides against the
// into/negp indices, and its subterm positions against the from index.
fn compute_all_paramodulants_indexed(
    state: &mut ProofState,
    control: &ProofControl,
    given: StepId,
    given_clause: &Clause,
) -> u64 {
    let mut count = 0;
    let parms = &control.heuristic_parms;

    // The given clause as paramodulator.
    for from in from_positions(given, given_clause) {
        let from_literal = &given_clause.literals[from.lit];
        let s = if from.left {
            &from_literal.left
        } else {
            &from_literal.right
        };
        let mut targets: Vec<PmIntoPos> = vec![];
        if let Some(index) = &state.gindices.pm_into {
            targets.extend(index.find_unifying(s).into_iter().map(|(_, pos)| pos.clone()));
        }
        if parms.enable_neg_unit_paramod && !given_clause.is_negative() {
            if let Some(index) = &state.gindices.pm_negp {
                targets.extend(index.find_unifying(s).into_iter().map(|(_, pos)| pos.clone()));
            }
        }
        for into in targets {
            if state.arena.get(into.step).is_dead() {
                continue;
            }
            if try_paramod(state, control, &from, &into) {
                count += 1;
            }
        }
    }

    // The given clause as target.
    for into in into_positions(given, given_clause) {
        let into_literal = &given_clause.literals[into.lit];
        let side = if into.left {
            &into_literal.left
        } else {
            &into_literal.right
        };
        let Some(subterm) = side.subterm_at_path(&into.path) else {
            continue;
        };
        let mut froms: Vec<PmFromPos> = vec![];
        if let Some(index) = &state.gindices.pm_from {
            froms.extend(
                index
                    .find_unifying(subterm)
                    .into_iter()
                    .map(|(_, pos)| *pos),
            );
        }
        for from in froms {
            // Pairs with the given clause itself were covered above.
            if from.step == given {
                continue;
            }
            if state.arena.get(from.step).is_dead() {
                continue;
            }
            // A negative-unit target pairs with processed positives only when
            // negative-unit paramodulation is on; that gate was checked on
            // entry for the given clause.
            if try_paramod(state, control, &from, &into) {
                count += 1;
            }
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::HeuristicParms;
    use crate::feature_vector::FvIndexParms;
    use crate::proof_step::ClauseFlags;
    use crate::signature::Signature;

    fn setup(indexed: bool) -> (ProofState, ProofControl) {
        let mut parms = FvIndexParms::default();
        parms.use_global_indices = indexed;
        let mut state = ProofState::new(Signature::new(), vec![]);
        let mut control = ProofControl::new(HeuristicParms::default(), parms);
        state.init(&mut control);
        (state, control)
    }

    fn install(state: &mut ProofState, control: &ProofControl, s: &str) -> StepId {
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
        id
    }

    fn tmp_clauses(state: &ProofState) -> Vec<String> {
        state
            .tmp_store
            .ids()
            .iter()
            .map(|&id| format!("{}", state.arena.get(id).clause))
            .collect()
    }

    #[test]
    fn test_equality_resolution() {
        let (mut state, control) = setup(false);
        let clause = Clause {
            literals: vec![
                Literal::parse("x0 != c0"),
                Literal::parse("x0 = c1"),
            ],
        };
        let mut clause = Clause::new(clause.literals);
        clause.orient(&control.kbo);
        let id = state.arena.new_assumption(clause);
        let count = compute_all_eqn_resolvents(&mut state, &control, id);
        assert_eq!(count, 1);
        assert_eq!(tmp_clauses(&state), vec!["c1 = c0".to_string()]);
    }

    #[test]
    fn test_equality_factoring() {
        let (mut state, control) = setup(false);
        let mut clause = Clause::parse("x0 = c0 | x1 = c0");
        clause.orient(&control.kbo);
        let id = state.arena.new_assumption(clause);
        let count = compute_all_equality_factors(&mut state, &control, id);
        assert!(count >= 1);
        assert!(tmp_clauses(&state).iter().any(|c| c == "x0 = c0"));
    }

    #[test]
    fn test_paramodulation_scan_path() {
        let (mut state, control) = setup(false);
        install(&mut state, &control, "c0(x0) = x0");
        let mut clause = Clause::parse("not c1(c0(c2))");
        clause.orient(&control.kbo);
        let id = state.arena.new_assumption(clause);
        let step = state.arena.get_mut(id);
        step.flags.set(ClauseFlags::PROCESSED);
        state.insert_into(SetKind::NegUnits, id);

        let count = compute_all_paramodulants(&mut state, &control, id);
        assert!(count >= 1);
        assert!(tmp_clauses(&state).iter().any(|c| c == "not c1(c2)"));
    }

    #[test]
    fn test_paramodulation_indexed_matches_scan(
    ) {
        // Run the same configuration through both paths and compare results.
        let mut results = vec![];
        for indexed in [false, true] {
            let (mut state, control) = setup(indexed);
            install(&mut state, &control, "c0(x0) = x0");
            let given = install(&mut state, &control, "c1(c0(c2)) = c3");
            compute_all_paramodulants(&mut state, &control, given);
            let mut clauses = tmp_clauses(&state);
            clauses.sort();
            clauses.dedup();
            results.push(clauses);
        }
        assert_eq!(results[0], results[1]);
        assert!(!results[0].is_empty());
    }

    #[test]
    fn test_neg_unit_paramod_gate() {
        let (mut state, mut control) = setup(false);
        control.heuristic_parms.enable_neg_unit_paramod = false;
        install(&mut state, &control, "c0(x0) = x0");
        let mut clause = Clause::parse("not c1(c0(c2))");
        clause.orient(&control.kbo);
        let id = state.arena.new_assumption(clause);
        let count = compute_all_paramodulants(&mut state, &control, id);
        assert_eq!(count, 0);
    }
}
