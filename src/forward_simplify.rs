use log::debug;

use crate::clause::Clause;
use crate::clause_sets::PackedClause;
use crate::control::{ProofControl, RewriteLevel};
use crate::demodulation::Demodulators;
use crate::literal::Literal;
use crate::proof_step::{ClauseFlags, Rule, SetKind, StepId};
use crate::state::ProofState;
use crate::subsumption::{clause_subsumes, condense, contextual_literal_cut, unit_cut_indices};

/// The forward simplification entry points: normalize a clause against the
/// processed sets, and decide whether it survives at all.

fn rewrite_step(state: &mut ProofState, control: &ProofControl, id: StepId, level: RewriteLevel) {
    if level == RewriteLevel::NoRewrite {
        return;
    }
    let step = state.arena.get(id);
    let date_limit = if step.flags.query(ClauseFlags::LIMITED_RW) {
        Some(step.date)
    } else {
        None
    };
    let clause = step.clause.clone();
    let exclude = Some(id);
    let system_date = state.system_date;

    let result = {
        let demods = Demodulators {
            arena: &state.arena,
            kbo: &control.kbo,
            rules: &state.processed_pos_rules,
            eqns: &state.processed_pos_eqns,
            level,
            prefer_general: control.heuristic_parms.prefer_general,
            date_limit,
            exclude,
        };
        demods.normalize_clause(&mut state.tmp_terms, system_date, &clause)
    };

    if let Some((mut new_clause, used)) = result {
        new_clause.orient(&control.kbo);
        state.tmp_terms.intern_clause(&new_clause);
        let step = state.arena.get_mut(id);
        step.clause = new_clause;
        step.recompute_weight();
        for demod in used {
            if !step.simplifiers.contains(&demod) {
                step.simplifiers.push(demod);
            }
        }
    }
}

// Remove negative literals whose sides are equal modulo AC; they are false
// once the AC theory is in force.
fn remove_ac_resolved(state: &mut ProofState, control: &ProofControl, id: StepId) {
    if !control.ac_handling_active {
        return;
    }
    let clause = &state.arena.get(id).clause;
    let keep: Vec<Literal> = clause
        .literals
        .iter()
        .filter(|literal| {
            literal.positive
                || literal.left.ac_normalize(&state.signature)
                    != literal.right.ac_normalize(&state.signature)
        })
        .cloned()
        .collect();
    if keep.len() != clause.literals.len() {
        let mut new_clause = Clause::new(keep);
        new_clause.orient(&control.kbo);
        let step = state.arena.get_mut(id);
        step.clause = new_clause;
        step.recompute_weight();
    }
}

// Cut literals with processed units (simplify-reflect and unit conflicts),
// and optionally with full contextual simplify-reflect against non-units.
fn context_simplify_reflect(
    state: &mut ProofState,
    control: &ProofControl,
    id: StepId,
    aggressive: bool,
) {
    let unit_kinds = [SetKind::PosRules, SetKind::PosEqns, SetKind::NegUnits];
    loop {
        let clause = state.arena.get(id).clause.clone();
        if clause.is_empty() {
            return;
        }
        let mut cut: Option<(usize, StepId)> = None;
        'search: for kind in unit_kinds {
            for &unit_id in state.set(kind).iter() {
                if unit_id == id {
                    continue;
                }
                let unit = &state.arena.get(unit_id).clause.literals[0];
                let indices = unit_cut_indices(unit, &clause);
                if let Some(&index) = indices.first() {
                    cut = Some((index, unit_id));
                    break 'search;
                }
            }
        }
        if cut.is_none() && aggressive {
            'search_nonunits: for &simp_id in state.processed_non_units.iter() {
                if simp_id == id {
                    continue;
                }
                let simplifier = state.arena.get(simp_id).clause.clone();
                if let Some(index) = contextual_literal_cut(&clause, &simplifier) {
                    cut = Some((index, simp_id));
                    break 'search_nonunits;
                }
            }
        }
        let Some((index, simp_id)) = cut else {
            return;
        };
        let mut literals = clause.literals.clone();
        literals.remove(index);
        let mut new_clause = Clause::new(literals);
        new_clause.orient(&control.kbo);
        let step = state.arena.get_mut(id);
        step.clause = new_clause;
        step.recompute_weight();
        if !step.simplifiers.contains(&simp_id) {
            step.simplifiers.push(simp_id);
        }
    }
}

/// Normalizes a clause in place: interreduction against the demodulators,
/// AC cleanup, contextual simplify-reflect, condensing. The clause's
/// derivation picks up every simplifier used.
pub fn forward_modify_clause(
    state: &mut ProofState,
    control: &ProofControl,
    id: StepId,
    context_sr: bool,
    condensing: bool,
    level: RewriteLevel,
) {
    rewrite_step(state, control, id, level);
    remove_ac_resolved(state, control, id);
    if context_sr {
        let aggressive = control.heuristic_parms.forward_context_sr_aggressive;
        context_simplify_reflect(state, control, id, aggressive);
    }
    if condensing {
        let clause = state.arena.get(id).clause.clone();
        if let Some(mut condensed) = condense(&clause) {
            condensed.orient(&control.kbo);
            let step = state.arena.get_mut(id);
            step.clause = condensed;
            step.recompute_weight();
        }
    }
}

/// Marks a clause that no set owns as dead and archives it.
pub fn destroy_floating(state: &mut ProofState, id: StepId) {
    debug_assert!(state.arena.get(id).set.is_none());
    state.arena.get_mut(id).flags.set(ClauseFlags::DEAD);
    state.archive.insert(&mut state.arena, id);
}

// Is the clause subsumed by some processed unit? Checked through the
// feature-vector indices of the unit partitions.
fn forward_unit_subsumed(state: &ProofState, packed: &PackedClause) -> Option<StepId> {
    let clause = &state.arena.get(packed.id).clause;
    for kind in [SetKind::PosRules, SetKind::PosEqns, SetKind::NegUnits] {
        for candidate in state.set(kind).find_subsumer_candidates(packed) {
            if candidate == packed.id {
                continue;
            }
            let unit = state.arena.get(candidate);
            if unit.is_dead() {
                continue;
            }
            if clause_subsumes(&unit.clause, clause) {
                return Some(candidate);
            }
        }
    }
    None
}

/// The forward simplification pipeline for a freshly selected clause.
/// Returns None when the clause was consumed (trivial or subsumed), otherwise
/// the packed clause; an empty clause comes back packed for the caller to
/// recognize.
pub fn forward_contract_clause(
    state: &mut ProofState,
    control: &ProofControl,
    id: StepId,
    context_sr: bool,
    condensing: bool,
    level: RewriteLevel,
) -> Option<PackedClause> {
    forward_modify_clause(state, control, id, context_sr, condensing, level);

    let step = state.arena.get(id);
    let trivial = if control.ac_handling_active {
        step.clause.is_tautology_ac(&state.signature)
    } else {
        step.clause.is_tautology()
    };
    if trivial {
        state.counters.proc_trivial_count += 1;
        debug!("# trivial: {}", step.clause);
        destroy_floating(state, id);
        return None;
    }
    if step.clause.is_empty() {
        return Some(PackedClause::pack(&state.arena, &control.fvi_parms, id));
    }

    let packed = PackedClause::pack(&state.arena, &control.fvi_parms, id);
    if let Some(subsumer) = forward_unit_subsumed(state, &packed) {
        debug!(
            "# forward subsumed by {}: {}",
            subsumer,
            state.arena.get(id).clause
        );
        state.counters.other_redundant_count += 1;
        destroy_floating(state, id);
        return None;
    }
    Some(packed)
}

/// Destructive equality resolution of variable literals: a literal x != y
/// (or x != t under the strong variant) is resolved away by binding the
/// variable, replacing the clause with its resolvent. Returns the number of
/// clauses emitted into tmp_store (0 means the clause was left alone).
pub fn er_normalize_var(state: &mut ProofState, control: &ProofControl, id: StepId) -> u64 {
    let strong = control.heuristic_parms.er_strong_destructive;
    let mut clause = state.arena.get(id).clause.clone();
    let mut resolved_any = false;
    loop {
        let mut resolved = None;
        for (index, literal) in clause.literals.iter().enumerate() {
            if literal.positive {
                continue;
            }
            // The canonically larger side is on the left, so a variable side
            // shows up on the right (or both sides are variables).
            if let Some(v) = literal.right.atomic_variable() {
                let eligible = literal.left.atomic_variable().is_some() || strong;
                if eligible && !literal.left.has_variable(v) {
                    resolved = Some((index, v, literal.left.clone()));
                    break;
                }
            }
        }
        let Some((index, v, binding)) = resolved else {
            break;
        };
        resolved_any = true;
        let literals = clause
            .literals
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, literal)| {
                Literal::new(
                    literal.positive,
                    literal.left.replace_variable(v, &binding),
                    literal.right.replace_variable(v, &binding),
                )
            })
            .collect();
        clause = Clause::new(literals);
    }
    if !resolved_any {
        return 0;
    }
    clause.orient(&control.kbo);
    let new_id = state.arena.new_step(clause, Rule::ErVariant(id));
    state.add_to_tmp_store(new_id);

    if let Some(kind) = state.arena.get(id).set {
        state.extract_from(kind, id);
    }
    destroy_floating(state, id);
    1
}

/// Forward contraction sweep over a whole set: every member is renormalized,
/// trivial and unit-subsumed members are retired. Returns an empty clause if
/// simplification found one.
pub fn forward_contract_set(
    state: &mut ProofState,
    control: &ProofControl,
    kind: SetKind,
    level: RewriteLevel,
) -> Option<StepId> {
    let ids = state.set(kind).ids();
    for id in ids {
        if !state.set(kind).contains(id) || state.arena.get(id).is_dead() {
            continue;
        }
        forward_modify_clause(
            state,
            control,
            id,
            control.heuristic_parms.forward_context_sr,
            control.heuristic_parms.condensing,
            level,
        );
        let step = state.arena.get(id);
        if step.clause.is_empty() {
            state.extract_from(kind, id);
            return Some(id);
        }
        let trivial = if control.ac_handling_active {
            step.clause.is_tautology_ac(&state.signature)
        } else {
            step.clause.is_tautology()
        };
        let mut remove = trivial;
        if !remove {
            let packed = PackedClause::pack(&state.arena, &control.fvi_parms, id);
            remove = forward_unit_subsumed(state, &packed).is_some();
        }
        if remove {
            state.counters.other_redundant_count += 1;
            state.extract_from(kind, id);
            destroy_floating(state, id);
        }
    }
    None
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

    fn add_processed(state: &mut ProofState, control: &ProofControl, s: &str) -> StepId {
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
        id
    }

    #[test]
    fn test_demodulation_records_simplifier() {
        let (mut state, control) = setup();
        let rule = add_processed(&mut state, &control, "c0(x0) = x0");
        let id = state.arena.new_assumption(Clause::parse("c1(c0(c2))"));
        forward_modify_clause(&mut state, &control, id, false, false, RewriteLevel::Full);
        let step = state.arena.get(id);
        assert_eq!(format!("{}", step.clause), "c1(c2)");
        assert_eq!(step.simplifiers, vec![rule]);
    }

    #[test]
    fn test_forward_contract_discards_tautology() {
        let (mut state, control) = setup();
        let id = state
            .arena
            .new_assumption(Clause::parse("c0(x0) | not c0(x0)"));
        let result =
            forward_contract_clause(&mut state, &control, id, false, false, RewriteLevel::Full);
        assert!(result.is_none());
        assert!(state.arena.get(id).is_dead());
        assert_eq!(state.counters.proc_trivial_count, 1);
    }

    #[test]
    fn test_forward_unit_subsumption() {
        let (mut state, control) = setup();
        add_processed(&mut state, &control, "c0(x0)");
        let id = state
            .arena
            .new_assumption(Clause::parse("c0(c1) | c2(c3)"));
        let result =
            forward_contract_clause(&mut state, &control, id, false, false, RewriteLevel::Full);
        assert!(result.is_none());
        assert_eq!(state.counters.other_redundant_count, 1);
    }

    #[test]
    fn test_simplify_reflect_cuts_literal() {
        let (mut state, control) = setup();
        let unit = add_processed(&mut state, &control, "c0(x0) = x0");
        // c0(c1) != c1 is an instance of the unit negated, so it gets cut.
        let id = state
            .arena
            .new_assumption(Clause::parse("c0(c1) != c1 | c2(c3)"));
        // Avoid the demodulator rewriting the literal away first.
        forward_modify_clause(&mut state, &control, id, true, false, RewriteLevel::NoRewrite);
        let step = state.arena.get(id);
        assert_eq!(format!("{}", step.clause), "c2(c3)");
        assert!(step.simplifiers.contains(&unit));
    }

    #[test]
    fn test_condensing_in_pipeline() {
        let (mut state, control) = setup();
        let id = state
            .arena
            .new_assumption(Clause::parse("c0(x0) | c0(x1)"));
        forward_modify_clause(&mut state, &control, id, false, true, RewriteLevel::Full);
        assert_eq!(format!("{}", state.arena.get(id).clause), "c0(x0)");
    }

    #[test]
    fn test_er_normalize_var_destructive() {
        let (mut state, mut control) = setup();
        control.heuristic_parms.er_varlit_destructive = true;
        let clause = Clause {
            literals: vec![
                Literal::parse("x0 != x1"),
                Literal::parse("c0(x0, x1)"),
            ],
        };
        let id = state.arena.new_assumption(clause);
        let count = er_normalize_var(&mut state, &control, id);
        assert_eq!(count, 1);
        assert!(state.arena.get(id).is_dead());
        assert_eq!(state.tmp_store.len(), 1);
        let new_id = state.tmp_store.ids()[0];
        assert_eq!(format!("{}", state.arena.get(new_id).clause), "c0(x0, x0)");
    }
}
