use fxhash::FxHashMap;
use log::debug;
use varisat::{ExtendFormula, Lit, Solver};

use crate::atom::Atom;
use crate::clause::Clause;
use crate::control::{GroundingMode, ProofControl, RewriteLevel};
use crate::forward_simplify::forward_contract_set;
use crate::proof_step::{Rule, SetKind, StepId};
use crate::state::ProofState;
use crate::term::Term;

/// The interleaved ground check: instantiate the current clause set to ground
/// (or pseudo-ground) clauses, abstract to propositional logic, and ask the
/// SAT solver. An unsatisfiable ground abstraction witnesses the empty clause.

fn max_symbol_id(term: &Term, max: &mut u32) {
    if let Atom::Symbol(id) = term.head {
        *max = (*max).max(id + 1);
    }
    for arg in &term.args {
        max_symbol_id(arg, max);
    }
}

fn first_constant(term: &Term) -> Option<Term> {
    if term.head.is_symbol() && term.args.is_empty() {
        return Some(term.clone());
    }
    term.args.iter().find_map(first_constant)
}

// Picks the constants used to instantiate variables. Minted constants get ids
// above every symbol occurring in the clause set, so the propositional
// abstraction never conflates a grounding constant with a problem symbol.
struct Grounding {
    mode: GroundingMode,
    first: Option<Term>,
}

impl Grounding {
    fn prepare(state: &mut ProofState, mode: GroundingMode, imported: &[StepId]) -> Grounding {
        let mut floor = 0;
        let mut first = None;
        for &id in imported {
            for literal in &state.arena.get(id).clause.literals {
                for term in [&literal.left, &literal.right] {
                    max_symbol_id(term, &mut floor);
                    if first.is_none() {
                        first = first_constant(term);
                    }
                }
            }
        }
        state.signature.reserve(floor);
        Grounding { mode, first }
    }

    fn term_for(&self, state: &mut ProofState, var: u16) -> Term {
        if self.mode == GroundingMode::FirstConstant {
            if let Some(first) = &self.first {
                return first.clone();
            }
        }
        let name = match self.mode {
            GroundingMode::FreshConstant => format!("sat_x{}", var),
            _ => "sat_c0".to_string(),
        };
        let symbol = state.signature.intern(&name);
        state.signature.set_arity(symbol, 0);
        Term::new(Atom::Symbol(symbol), vec![])
    }

    fn ground_clause(&self, state: &mut ProofState, clause: &Clause) -> Clause {
        let vars = clause.collect_variables();
        let mut literals = clause.literals.clone();
        for v in vars {
            let replacement = self.term_for(state, v);
            for literal in &mut literals {
                literal.left = literal.left.replace_variable(v, &replacement);
                literal.right = literal.right.replace_variable(v, &replacement);
            }
        }
        Clause { literals }
    }
}

/// Runs the ground SAT check over the processed partitions and unprocessed.
/// Returns an empty-clause witness on unsatisfiability.
pub fn sat_check(state: &mut ProofState, control: &ProofControl) -> Option<StepId> {
    let mode = control.heuristic_parms.sat_check_grounding;
    if mode == GroundingMode::NoGrounding {
        return None;
    }

    if control.heuristic_parms.sat_check_normalize {
        if let Some(empty) =
            forward_contract_set(state, control, SetKind::Unprocessed, RewriteLevel::Full)
        {
            return Some(empty);
        }
    }

    let mut imported: Vec<StepId> = vec![];
    for kind in ProofState::processed_kinds() {
        imported.extend(state.set(kind).iter().copied());
    }
    imported.extend(state.unprocessed.iter().copied());

    let grounding = Grounding::prepare(state, mode, &imported);
    let mut atom_vars: FxHashMap<(Term, Term), isize> = FxHashMap::default();
    let mut solver = Solver::new();
    let mut actual_size: u64 = 0;

    for &id in &imported {
        let clause = state.arena.get(id).clause.clone();
        let ground = grounding.ground_clause(state, &clause);
        let mut lits = vec![];
        let mut trivially_true = false;
        for literal in &ground.literals {
            if literal.left == literal.right {
                if literal.positive {
                    trivially_true = true;
                    break;
                }
                continue;
            }
            let key = if literal.left <= literal.right {
                (literal.left.clone(), literal.right.clone())
            } else {
                (literal.right.clone(), literal.left.clone())
            };
            let next = atom_vars.len() as isize + 1;
            let var = *atom_vars.entry(key).or_insert(next);
            let dimacs = if literal.positive { var } else { -var };
            let lit = Lit::from_dimacs(dimacs);
            if !lits.contains(&lit) {
                lits.push(lit);
            }
        }
        if trivially_true {
            continue;
        }
        solver.add_clause(&lits);
        actual_size += 1;
    }

    state.counters.satcheck_count += 1;
    match solver.solve() {
        Ok(false) => {
            debug!("# SAT check found the ground set unsatisfiable");
            state.counters.satcheck_success += 1;
            state.counters.satcheck_full_size = imported.len() as u64;
            state.counters.satcheck_actual_size = actual_size;
            state.counters.satcheck_core_size = actual_size;
            let id = state
                .arena
                .new_step(Clause::impossible(), Rule::SatRefutation(imported));
            Some(id)
        }
        Ok(true) => {
            state.counters.satcheck_satisfiable += 1;
            None
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::HeuristicParms;
    use crate::feature_vector::FvIndexParms;
    use crate::signature::Signature;

    fn setup(mode: GroundingMode) -> (ProofState, ProofControl) {
        let mut parms = HeuristicParms::default();
        parms.sat_check_grounding = mode;
        let mut state = ProofState::new(Signature::new(), vec![]);
        let mut control = ProofControl::new(parms, FvIndexParms::default());
        state.init(&mut control);
        (state, control)
    }

    fn add_unprocessed(state: &mut ProofState, s: &str) -> StepId {
        let id = state.arena.new_assumption(Clause::parse(s));
        state.unprocessed.insert(&mut state.arena, id);
        id
    }

    #[test]
    fn test_disabled_by_default() {
        let (mut state, control) = setup(GroundingMode::NoGrounding);
        add_unprocessed(&mut state, "c0(c1)");
        assert!(sat_check(&mut state, &control).is_none());
        assert_eq!(state.counters.satcheck_count, 0);
    }

    #[test]
    fn test_unsat_ground_set_yields_witness(
    ) {
        let (mut state, control) = setup(GroundingMode::FirstConstant);
        add_unprocessed(&mut state, "c0(c1)");
        add_unprocessed(&mut state, "not c0(c1)");
        let witness = sat_check(&mut state, &control).unwrap();
        assert!(state.arena.get(witness).clause.is_empty());
        assert_eq!(state.counters.satcheck_success, 1);
        assert!(matches!(
            state.arena.get(witness).rule,
            Rule::SatRefutation(_)
        ));
    }

    #[test]
    fn test_satisfiable_ground_set_continues() {
        let (mut state, control) = setup(GroundingMode::FirstConstant);
        add_unprocessed(&mut state, "c0(c1)");
        add_unprocessed(&mut state, "not c0(c2)");
        assert!(sat_check(&mut state, &control).is_none());
        assert_eq!(state.counters.satcheck_satisfiable, 1);
    }

    #[test]
    fn test_grounding_collapses_variables() {
        // First-constant grounding instantiates x0 with c1, the first
        // constant of the problem, which clashes with the negative unit.
        let (mut state, control) = setup(GroundingMode::FirstConstant);
        add_unprocessed(&mut state, "not c0(c1)");
        add_unprocessed(&mut state, "c0(x0)");
        assert!(sat_check(&mut state, &control).is_some());
    }
}
