use crate::atom::AtomId;
use crate::clause::Clause;
use crate::literal::Literal;
use crate::term::Term;

/// One-way matching: variables of the pattern may bind, the target is fixed.
/// Bindings can be rolled back to a mark, which the backtracking search over
/// literal assignments relies on.
#[derive(Debug, Default)]
pub struct Matcher {
    map: Vec<Option<Term>>,
    trail: Vec<AtomId>,
}

impl Matcher {
    pub fn new() -> Matcher {
        Matcher::default()
    }

    pub fn mark(&self) -> usize {
        self.trail.len()
    }

    pub fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let id = self.trail.pop().unwrap();
            self.map[id as usize] = None;
        }
    }

    fn get(&self, id: AtomId) -> Option<&Term> {
        match self.map.get(id as usize) {
            Some(Some(term)) => Some(term),
            _ => None,
        }
    }

    fn bind(&mut self, id: AtomId, term: &Term) {
        while self.map.len() <= id as usize {
            self.map.push(None);
        }
        self.map[id as usize] = Some(term.clone());
        self.trail.push(id);
    }

    pub fn match_terms(&mut self, pattern: &Term, target: &Term) -> bool {
        if let Some(id) = pattern.atomic_variable() {
            return match self.get(id) {
                Some(bound) => bound == target,
                None => {
                    self.bind(id, target);
                    true
                }
            };
        }
        if pattern.head != target.head || pattern.args.len() != target.args.len() {
            return false;
        }
        pattern
            .args
            .iter()
            .zip(target.args.iter())
            .all(|(p, t)| self.match_terms(p, t))
    }

    pub fn match_literals(&mut self, pattern: &Literal, target: &Literal, flipped: bool) -> bool {
        if flipped {
            self.match_terms(&pattern.left, &target.right)
                && self.match_terms(&pattern.right, &target.left)
        } else {
            self.match_terms(&pattern.left, &target.left)
                && self.match_terms(&pattern.right, &target.right)
        }
    }

    /// Applies the current bindings; unbound variables stay as they are.
    pub fn apply(&self, term: &Term) -> Term {
        if let Some(id) = term.atomic_variable() {
            if let Some(bound) = self.get(id) {
                return bound.clone();
            }
        }
        Term {
            head: term.head,
            args: term.args.iter().map(|a| self.apply(a)).collect(),
        }
    }

    pub fn apply_to_literal(&self, literal: &Literal) -> Literal {
        Literal::new(
            literal.positive,
            self.apply(&literal.left),
            self.apply(&literal.right),
        )
    }
}

fn subsume_rec(
    subsumer: &Clause,
    target: &Clause,
    index: usize,
    used: &mut Vec<bool>,
    matcher: &mut Matcher,
) -> bool {
    if index == subsumer.literals.len() {
        return true;
    }
    let literal = &subsumer.literals[index];
    for (j, target_literal) in target.literals.iter().enumerate() {
        if used[j] || target_literal.positive != literal.positive {
            continue;
        }
        for flipped in [false, true] {
            if flipped && target_literal.left == target_literal.right {
                continue;
            }
            let mark = matcher.mark();
            if matcher.match_literals(literal, target_literal, flipped) {
                used[j] = true;
                if subsume_rec(subsumer, target, index + 1, used, matcher) {
                    return true;
                }
                used[j] = false;
            }
            matcher.undo_to(mark);
        }
    }
    false
}

/// Multiset subsumption: some substitution maps the subsumer's literals
/// injectively onto literals of the target.
pub fn clause_subsumes(subsumer: &Clause, target: &Clause) -> bool {
    if subsumer.literals.len() > target.literals.len() {
        return false;
    }
    let mut used = vec![false; target.literals.len()];
    let mut matcher = Matcher::new();
    subsume_rec(subsumer, target, 0, &mut used, &mut matcher)
}

/// Two clauses are variants when each subsumes the other with the same length,
/// i.e. they are equal up to variable renaming.
pub fn is_variant(a: &Clause, b: &Clause) -> bool {
    a.literals.len() == b.literals.len() && clause_subsumes(a, b) && clause_subsumes(b, a)
}

/// Indices of literals in the clause that the unit cuts: literals of the
/// opposite sign that are instances of the unit's equation. This is
/// simplify-reflect when the unit is positive and unit-conflict cutting when
/// it is negative.
pub fn unit_cut_indices(unit: &Literal, clause: &Clause) -> Vec<usize> {
    let mut answer = vec![];
    for (i, literal) in clause.literals.iter().enumerate() {
        if literal.positive == unit.positive {
            continue;
        }
        for flipped in [false, true] {
            let mut matcher = Matcher::new();
            if matcher.match_literals(unit, literal, flipped) {
                answer.push(i);
                break;
            }
        }
    }
    answer
}

/// Contextual simplify-reflect: literal k of the clause can be cut by the
/// simplifier if the simplifier subsumes the clause with literal k negated.
/// Returns the first cuttable literal index.
pub fn contextual_literal_cut(clause: &Clause, simplifier: &Clause) -> Option<usize> {
    if simplifier.literals.len() > clause.literals.len() {
        return None;
    }
    for k in 0..clause.literals.len() {
        let mut literals = clause.literals.clone();
        let flipped = &mut literals[k];
        flipped.positive = !flipped.positive;
        let context = Clause {
            literals: literals.clone(),
        };
        if clause_subsumes(simplifier, &context) {
            return Some(k);
        }
    }
    None
}

/// Condensing: if some literal of the clause can be mapped onto another,
/// producing a strictly smaller clause that still subsumes the original,
/// replace the clause with the smaller one. Iterates to a fixpoint.
pub fn condense(clause: &Clause) -> Option<Clause> {
    let mut current = clause.clone();
    let mut changed = false;
    'outer: loop {
        if current.literals.len() < 2 {
            break;
        }
        for i in 0..current.literals.len() {
            for j in 0..current.literals.len() {
                if i == j {
                    continue;
                }
                let pattern = &current.literals[i];
                let target = &current.literals[j];
                if pattern.positive != target.positive {
                    continue;
                }
                for flipped in [false, true] {
                    let mut matcher = Matcher::new();
                    if !matcher.match_literals(pattern, target, flipped) {
                        continue;
                    }
                    // The candidate is the instantiated clause; deduplication
                    // inside Clause::new is what shrinks it.
                    let literals = current
                        .literals
                        .iter()
                        .map(|literal| matcher.apply_to_literal(literal))
                        .collect();
                    let candidate = Clause::new(literals);
                    if candidate.literals.len() < current.literals.len()
                        && clause_subsumes(&candidate, &current)
                    {
                        current = candidate;
                        changed = true;
                        continue 'outer;
                    }
                }
            }
        }
        break;
    }
    if changed {
        Some(current)
    } else {
        None
    }
}
