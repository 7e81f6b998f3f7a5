use fxhash::FxHashMap;
use log::debug;

use crate::atom::{Atom, SymbolId};
use crate::clause::Clause;
use crate::control::{ProofControl, SplitMethod};
use crate::literal::Literal;
use crate::proof_step::{ClauseFlags, Rule, StepId};
use crate::signature::Signature;
use crate::state::ProofState;
use crate::term::Term;

/// Remembers which definition predicate stands for which split component, so
/// that equal components reuse their definition instead of minting a new one.
#[derive(Debug, Default)]
pub struct DefinitionStore {
    defs: FxHashMap<String, SymbolId>,
}

impl DefinitionStore {
    pub fn new() -> DefinitionStore {
        DefinitionStore::default()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    fn get_or_create(&mut self, sig: &mut Signature, key: String, fresh: bool) -> SymbolId {
        if !fresh {
            if let Some(&symbol) = self.defs.get(&key) {
                return symbol;
            }
        }
        let symbol = sig.fresh_definition();
        sig.set_arity(symbol, 0);
        self.defs.insert(key, symbol);
        symbol
    }
}

// Partition the literals into variable-disjoint components. Each returned
// component is a list of literal indices.
fn variable_disjoint_components(clause: &Clause) -> Vec<Vec<usize>> {
    let n = clause.literals.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        if parent[i] != i {
            let root = find(parent, parent[i]);
            parent[i] = root;
        }
        parent[i]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let mut vars_i = vec![];
            clause.literals[i].collect_variables(&mut vars_i);
            let mut vars_j = vec![];
            clause.literals[j].collect_variables(&mut vars_j);
            if vars_i.iter().any(|v| vars_j.contains(v)) {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                parent[ri] = rj;
            }
        }
    }

    let mut components: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for i in 0..n {
        let root = find(&mut parent, i);
        components.entry(root).or_default().push(i);
    }
    let mut result: Vec<Vec<usize>> = components.into_values().collect();
    result.sort_by_key(|c| c[0]);
    result
}

/// Controlled clause splitting. When the clause separates into
/// variable-disjoint components, replace it with one clause per component,
/// chained through fresh definition literals. Component clauses go to
/// tmp_store; the original is retired. Returns the number of new clauses,
/// zero when no split happened.
pub fn controlled_clause_split(
    state: &mut ProofState,
    control: &ProofControl,
    id: StepId,
) -> u64 {
    let parms = &control.heuristic_parms;
    if parms.split_clauses == 0 {
        return 0;
    }
    let clause = state.arena.get(id).clause.clone();
    if clause.literals.len() < 2 || clause.literals.len() < parms.split_clauses {
        return 0;
    }

    let components = variable_disjoint_components(&clause);
    if components.len() < 2 {
        return 0;
    }
    if parms.split_method == SplitMethod::GroundOnly
        && !components.iter().any(|c| {
            c.iter()
                .all(|&i| !clause.literals[i].has_any_variable())
        })
    {
        return 0;
    }

    let fresh_defs = parms.split_fresh_defs;
    let n = components.len();
    let mut def_literals = vec![];
    for component in components.iter().take(n - 1) {
        let literals: Vec<Literal> = component
            .iter()
            .map(|&i| clause.literals[i].clone())
            .collect();
        let key = format!("{}", Clause::new(literals));
        let symbol =
            state
                .definition_store
                .get_or_create(&mut state.signature, key, fresh_defs);
        def_literals.push(Literal::positive_atom(Term::new(
            Atom::Symbol(symbol),
            vec![],
        )));
    }

    debug!("# splitting clause into {} components: {}", n, clause);

    let mut created = 0;
    for (k, component) in components.iter().enumerate() {
        let mut literals: Vec<Literal> = component
            .iter()
            .map(|&i| clause.literals[i].clone())
            .collect();
        if k < n - 1 {
            literals.push(def_literals[k].clone());
        } else {
            for def in &def_literals {
                let mut negated = def.clone();
                negated.positive = false;
                literals.push(negated);
            }
        }
        let mut component_clause = Clause::new(literals);
        component_clause.orient(&control.kbo);
        let new_id = state.arena.new_step(component_clause, Rule::SplitComponent(id));
        state.add_to_tmp_store(new_id);
        created += 1;
    }

    // The original is replaced by its components.
    if let Some(kind) = state.arena.get(id).set {
        state.extract_from(kind, id);
    }
    state.arena.get_mut(id).flags.set(ClauseFlags::DEAD);
    state.archive.insert(&mut state.arena, id);
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::HeuristicParms;
    use crate::feature_vector::FvIndexParms;

    fn setup(split_clauses: usize) -> (ProofState, ProofControl) {
        let mut parms = HeuristicParms::default();
        parms.split_clauses = split_clauses;
        let mut state = ProofState::new(Signature::new(), vec![]);
        let mut control = ProofControl::new(parms, FvIndexParms::default());
        state.init(&mut control);
        (state, control)
    }

    #[test]
    fn test_variable_disjoint_components() {
        let clause = Clause::parse("c0(x0) | c1(x0, x1) | c2(x2)");
        let components = variable_disjoint_components(&clause);
        assert_eq!(components.len(), 2);
    }

    #[test]
    fn test_split_produces_linked_components() {
        let (mut state, mut control) = setup(2);
        let id = state.arena.new_assumption(Clause::parse("c0(x0) | c1(x1)"));
        let created = controlled_clause_split(&mut state, &mut control, id);
        assert_eq!(created, 2);
        assert_eq!(state.tmp_store.len(), 2);
        assert!(state.arena.get(id).is_dead());

        // One component carries the definition literal positively, the other
        // negatively, so the components stay linked.
        let ids = state.tmp_store.ids();
        let first = &state.arena.get(ids[0]).clause;
        let second = &state.arena.get(ids[1]).clause;
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_no_split_when_connected() {
        let (mut state, mut control) = setup(2);
        let id = state
            .arena
            .new_assumption(Clause::parse("c0(x0) | c1(x0)"));
        assert_eq!(controlled_clause_split(&mut state, &mut control, id), 0);
        assert!(state.tmp_store.is_empty());
    }

    #[test]
    fn test_definition_reuse() {
        let (mut state, mut control) = setup(2);
        control.heuristic_parms.split_fresh_defs = false;
        let a = state.arena.new_assumption(Clause::parse("c0(x0) | c1(x1)"));
        let b = state.arena.new_assumption(Clause::parse("c0(x0) | c2(x1)"));
        controlled_clause_split(&mut state, &mut control, a);
        controlled_clause_split(&mut state, &mut control, b);
        // Both splits lead with the same component, so the definition symbol
        // is shared.
        assert_eq!(state.definition_store.len(), 1);
    }
}
