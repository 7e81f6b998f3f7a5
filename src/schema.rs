use log::{debug, trace};

use crate::atom::{Atom, AtomId};
use crate::formula::Formula;
use crate::control::ProofControl;
use crate::proof_step::{Rule, SchemaKind, StepId};
use crate::state::ProofState;
use crate::term::Term;
use crate::tptp;

/// The schema expander: instantiate the set-theoretic comprehension and
/// replacement schemas with the current clause as the parameter formula.
/// A clause with exactly one free variable yields a comprehension instance;
/// exactly two free variables yield the two replacement orientations. Any
/// other arity, and any translation hiccup, is a silent skip.

fn max_symbol_id(term: &Term, max: &mut u32) {
    if let Atom::Symbol(id) = term.head {
        *max = (*max).max(id + 1);
    }
    for arg in &term.args {
        max_symbol_id(arg, max);
    }
}

fn member_atom(member: crate::atom::SymbolId, x: AtomId, y: AtomId) -> Formula {
    Formula::Atom(Term::new(
        Atom::Symbol(member),
        vec![Term::variable(x), Term::variable(y)],
    ))
}

// forall A exists B forall X: member(X, B) <=> (member(X, A) & phi(X)).
fn comprehension_instance(
    member: crate::atom::SymbolId,
    phi: &Formula,
    x: AtomId,
    fresh: AtomId,
) -> Formula {
    let a = fresh;
    let b = fresh + 1;
    Formula::forall(
        a,
        Formula::exists(
            b,
            Formula::forall(
                x,
                Formula::iff(
                    member_atom(member, x, b),
                    Formula::and(member_atom(member, x, a), phi.clone()),
                ),
            ),
        ),
    )
}

// (forall X exists Y forall Y': phi(X, Y') <=> Y' = Y)
//   => (forall A exists B forall Z:
//         member(Z, B) <=> exists W: member(W, A) & phi(W, Z)).
// The `swapped` variant instantiates phi with its two free variables
// exchanged, giving the second orientation.
fn replacement_instance(
    member: crate::atom::SymbolId,
    phi: &Formula,
    x: AtomId,
    y: AtomId,
    fresh: AtomId,
    swapped: bool,
) -> Formula {
    let v2 = fresh;
    let v3 = fresh + 1;
    let v4 = fresh + 2;
    let v5 = fresh + 3;
    let v6 = fresh + 4;

    let antecedent_body = if swapped {
        phi.replace_variable(x, &Term::variable(v2))
            .replace_variable(y, &Term::variable(x))
    } else {
        phi.replace_variable(y, &Term::variable(v2))
    };
    let antecedent = Formula::forall(
        x,
        Formula::exists(
            y,
            Formula::forall(
                v2,
                Formula::iff(antecedent_body, Formula::Eq(Term::variable(v2), Term::variable(y))),
            ),
        ),
    );

    let conclusion_body = if swapped {
        phi.replace_variable(x, &Term::variable(v5))
            .replace_variable(y, &Term::variable(v6))
    } else {
        phi.replace_variable(x, &Term::variable(v6))
            .replace_variable(y, &Term::variable(v5))
    };
    let conclusion = Formula::forall(
        v3,
        Formula::exists(
            v4,
            Formula::forall(
                v5,
                Formula::iff(
                    member_atom(member, v5, v4),
                    Formula::exists(
                        v6,
                        Formula::and(member_atom(member, v6, v3), conclusion_body),
                    ),
                ),
            ),
        ),
    );
    Formula::implies(antecedent, conclusion)
}

// CNF-translate one instance through the textual round trip and append the
// resulting clauses to tmp_store. A parse failure counts as a skip.
fn inject_instance(
    state: &mut ProofState,
    control: &ProofControl,
    parent: StepId,
    kind: SchemaKind,
    name: &str,
    formula: Formula,
) -> bool {
    let text = tptp::formula_to_tptp(&state.signature, &formula, name, "axiom");
    debug!("# schema instance: {}", text);
    state.f_axioms.push(formula);

    let inputs = match tptp::parse(&mut state.signature, &text) {
        Ok(inputs) => inputs,
        Err(err) => {
            trace!("# schema instance dropped: {}", err);
            return false;
        }
    };
    let mut injected = false;
    for input in inputs {
        let tptp::TptpInput::Formula { formula, .. } = input else {
            continue;
        };
        let clauses = formula.cnf(&mut state.signature);
        for mut clause in clauses {
            clause.orient(&control.kbo);
            let id = state
                .arena
                .new_step(clause, Rule::SchemaInstance { parent, kind });
            state.add_to_tmp_store(id);
            injected = true;
        }
    }
    injected
}

/// Attempts schema expansion for the given clause. Returns 1 when at least
/// one instance was injected, 0 otherwise; expansion never fails fatally.
pub fn compute_replacement(state: &mut ProofState, control: &ProofControl, id: StepId) -> u64 {
    let clause = state.arena.get(id).clause.clone();
    if clause.is_empty() {
        return 0;
    }

    // Names must round-trip through the serialized form, and the membership
    // predicate must not collide with any numbered symbol already in play.
    let mut floor = 0;
    for step in state.arena.iter() {
        for literal in &step.clause.literals {
            for term in [&literal.left, &literal.right] {
                max_symbol_id(term, &mut floor);
            }
        }
    }
    state.signature.reserve(floor);
    state.signature.register_fallback_names(&clause);
    let member = state.signature.member();
    state.signature.set_arity(member, 2);

    let text = tptp::clause_to_tptp(&state.signature, &clause, &format!("c{}", id), "plain");
    trace!("# schema expansion considers: {}", text);

    let free = clause.collect_variables();
    let phi = Formula::from_clause(&clause);
    let fresh = clause.var_bound();

    let mut injected = false;
    match free.len() {
        1 => {
            let instance = comprehension_instance(member, &phi, free[0], fresh);
            injected |= inject_instance(
                state,
                control,
                id,
                SchemaKind::Comprehension,
                &format!("cmp{}", id),
                instance,
            );
        }
        2 => {
            let forward =
                replacement_instance(member, &phi, free[0], free[1], fresh, false);
            injected |= inject_instance(
                state,
                control,
                id,
                SchemaKind::ReplacementForward,
                &format!("rpm{}", id),
                forward,
            );
            let backward =
                replacement_instance(member, &phi, free[0], free[1], fresh, true);
            injected |= inject_instance(
                state,
                control,
                id,
                SchemaKind::ReplacementBackward,
                &format!("rpm{}b", id),
                backward,
            );
        }
        _ => {
            trace!("# not one or two free variables, no schema instance");
            return 0;
        }
    }
    if injected {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Clause;
    use crate::control::HeuristicParms;
    use crate::feature_vector::FvIndexParms;
    use crate::signature::Signature;

    fn setup() -> (ProofState, ProofControl) {
        let mut state = ProofState::new(Signature::new(), vec![]);
        let mut control = ProofControl::new(HeuristicParms::default(), FvIndexParms::default());
        state.init(&mut control);
        (state, control)
    }

    #[test]
    fn test_one_free_variable_builds_comprehension() {
        let (mut state, control) = setup();
        let id = state.arena.new_assumption(Clause::parse("c0(x0)"));
        let result = compute_replacement(&mut state, &control, id);
        assert_eq!(result, 1);
        assert!(!state.tmp_store.is_empty());
        assert_eq!(state.f_axioms.len(), 1);
        // Every injected clause derives from the parent via the schema rule.
        for &tid in state.tmp_store.iter() {
            match state.arena.get(tid).rule {
                Rule::SchemaInstance { parent, kind } => {
                    assert_eq!(parent, id);
                    assert_eq!(kind, SchemaKind::Comprehension);
                }
                _ => panic!("expected a schema instance"),
            }
        }
    }

    #[test]
    fn test_two_free_variables_build_two_replacements() {
        let (mut state, control) = setup();
        let id = state
            .arena
            .new_assumption(Clause::parse("c0(x0, x1)"));
        let result = compute_replacement(&mut state, &control, id);
        assert_eq!(result, 1);
        assert_eq!(state.f_axioms.len(), 2);
        let kinds: Vec<SchemaKind> = state
            .tmp_store
            .iter()
            .map(|&tid| match state.arena.get(tid).rule {
                Rule::SchemaInstance { kind, .. } => kind,
                _ => panic!("expected a schema instance"),
            })
            .collect();
        assert!(kinds.contains(&SchemaKind::ReplacementForward));
        assert!(kinds.contains(&SchemaKind::ReplacementBackward));
    }

    #[test]
    fn test_zero_and_three_free_variables_skip() {
        let (mut state, control) = setup();
        let ground = state.arena.new_assumption(Clause::parse("c0(c1)"));
        assert_eq!(compute_replacement(&mut state, &control, ground), 0);
        let three = state
            .arena
            .new_assumption(Clause::parse("c0(x0, x1, x2)"));
        assert_eq!(compute_replacement(&mut state, &control, three), 0);
        assert!(state.tmp_store.is_empty());
    }

    #[test]
    fn test_comprehension_clauses_mention_member() {
        let (mut state, control) = setup();
        let id = state.arena.new_assumption(Clause::parse("c0(x0)"));
        compute_replacement(&mut state, &control, id);
        let member = state.signature.lookup("member").unwrap();
        let mentions_member = state.tmp_store.iter().any(|&tid| {
            state.arena.get(tid).clause.literals.iter().any(|literal| {
                literal.left.head == Atom::Symbol(member)
                    || literal.right.head == Atom::Symbol(member)
            })
        });
        assert!(mentions_member);
    }

    proptest::proptest! {
        // The injected clauses come from serializing the instance and parsing
        // it back; translating the instance AST directly must agree.
        #[test]
        fn prop_schema_roundtrip(clause in crate::clause::strategies::arb_clause()) {
            let vars = clause.collect_variables();
            proptest::prop_assume!(vars.len() == 1 || vars.len() == 2);
            proptest::prop_assume!(!clause.is_empty());
            let (mut state, control) = setup();
            let id = state.arena.new_assumption(clause);
            let result = compute_replacement(&mut state, &control, id);
            proptest::prop_assert_eq!(result, 1);
            let mut direct = 0;
            for formula in state.f_axioms.clone() {
                direct += formula.cnf(&mut state.signature).len();
            }
            proptest::prop_assert_eq!(direct, state.tmp_store.len());
        }
    }

    #[test]
    fn test_serialized_instance_reparses_equivalently() {
        // The instance we inject comes from the in-memory text round trip;
        // building the CNF directly from the AST must agree with it.
        let (mut state, control) = setup();
        let id = state.arena.new_assumption(Clause::parse("c0(x0)"));
        compute_replacement(&mut state, &control, id);
        let formula = state.f_axioms[0].clone();
        let direct = formula.cnf(&mut state.signature);
        assert_eq!(direct.len(), state.tmp_store.len());
    }
}
