use std::fmt;

use crate::atom::{Atom, AtomId};
use crate::clause::Clause;
use crate::literal::Literal;
use crate::term::Term;

/// A mapping from variable ids in one scope to terms in the output scope.
#[derive(Debug, Clone, Default)]
pub struct VariableMap {
    terms: Vec<Option<Term>>,
}

impl VariableMap {
    pub fn new() -> VariableMap {
        VariableMap::default()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn push_none(&mut self) {
        self.terms.push(None);
    }

    pub fn has_mapping(&self, i: AtomId) -> bool {
        matches!(self.terms.get(i as usize), Some(Some(_)))
    }

    pub fn set(&mut self, i: AtomId, term: Term) {
        while self.terms.len() <= i as usize {
            self.terms.push(None);
        }
        self.terms[i as usize] = Some(term);
    }

    pub fn get_mapping(&self, i: AtomId) -> Option<&Term> {
        match self.terms.get(i as usize) {
            Some(Some(term)) => Some(term),
            _ => None,
        }
    }

    pub fn apply_to_all<F: Fn(&Term) -> Term>(&mut self, f: F) {
        for slot in &mut self.terms {
            if let Some(term) = slot {
                *slot = Some(f(term));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AtomId, &Term)> {
        self.terms
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (i as AtomId, t)))
    }
}

impl fmt::Display for VariableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (i, t) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "x{} -> {}", i, t)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Scope(usize);

impl Scope {
    pub const OUTPUT: Scope = Scope(0);
    pub const LEFT: Scope = Scope(1);
    pub const RIGHT: Scope = Scope(2);

    pub fn get(&self) -> usize {
        self.0
    }
}

/// A Unifier combines terms whose variables exist in different scopes.
/// There are normally two input scopes, the "left" and the "right".
/// For each scope we keep a mapping from variable id to the term in the output
/// scope, left as "None" until the variable is forced to map somewhere.
///
/// The output scope is the scope of the final term. Two complex terms in the
/// output scope may still need unifying against each other, which is why the
/// output scope gets a mapping too.
pub struct Unifier {
    maps: Vec<VariableMap>,
}

// Information for how to replace a subterm during application.
struct Replacement<'a> {
    path: &'a [usize],
    scope: Scope,
    term: &'a Term,
}

impl Unifier {
    pub fn new(num_scopes: usize) -> Unifier {
        let mut maps = Vec::with_capacity(num_scopes);
        for _ in 0..num_scopes {
            maps.push(VariableMap::new());
        }
        Unifier { maps }
    }

    fn mut_map(&mut self, scope: Scope) -> &mut VariableMap {
        &mut self.maps[scope.get()]
    }

    fn map(&self, scope: Scope) -> &VariableMap {
        &self.maps[scope.get()]
    }

    fn has_mapping(&self, scope: Scope, i: AtomId) -> bool {
        self.map(scope).has_mapping(i)
    }

    fn set_mapping(&mut self, scope: Scope, i: AtomId, term: Term) {
        self.mut_map(scope).set(i, term);
    }

    pub fn get_mapping(&self, scope: Scope, i: AtomId) -> Option<&Term> {
        self.map(scope).get_mapping(i)
    }

    // Applies the unification to a term, possibly replacing a subterm with the
    // unification of the data provided in replacement.
    // The replacement can have a different scope from the main term.
    fn apply_replace(
        &mut self,
        scope: Scope,
        term: &Term,
        replacement: Option<Replacement>,
    ) -> Term {
        if let Some(ref replacement) = replacement {
            if replacement.path.is_empty() {
                return self.apply(replacement.scope, replacement.term);
            }
        }

        // First apply to the head, flattening its args into this term if it's
        // a variable that expands into a term with its own arguments.
        let mut answer = match term.head {
            Atom::Variable(i) => {
                if !self.has_mapping(scope, i) && scope != Scope::OUTPUT {
                    // Route this variable to a new output variable.
                    let var_id = self.maps[Scope::OUTPUT.get()].len() as AtomId;
                    self.maps[Scope::OUTPUT.get()].push_none();
                    self.set_mapping(scope, i, Term::variable(var_id));
                }

                match self.get_mapping(scope, i) {
                    Some(mapped) => mapped.clone(),
                    None => {
                        // An output variable with no mapping stays as it is.
                        debug_assert!(scope == Scope::OUTPUT);
                        Term::atom(term.head)
                    }
                }
            }
            head => Term::atom(head),
        };

        // Recurse on the arguments.
        for (i, arg) in term.args.iter().enumerate() {
            let new_replacement = if let Some(ref replacement) = replacement {
                if replacement.path[0] == i {
                    Some(Replacement {
                        path: &replacement.path[1..],
                        scope: replacement.scope,
                        term: replacement.term,
                    })
                } else {
                    None
                }
            } else {
                None
            };
            answer.args.push(self.apply_replace(scope, arg, new_replacement));
        }

        answer
    }

    pub fn apply(&mut self, scope: Scope, term: &Term) -> Term {
        self.apply_replace(scope, term, None)
    }

    /// Returns the resulting literal, and whether it was flipped.
    pub fn apply_to_literal(&mut self, scope: Scope, literal: &Literal) -> (Literal, bool) {
        let apply_left = self.apply(scope, &literal.left);
        let apply_right = self.apply(scope, &literal.right);
        Literal::new_with_flip(literal.positive, apply_left, apply_right)
    }

    // Replace variable i in the output scope with the given term (also in the
    // output scope). If they're both variables, keep the one with the lower id.
    // It fails if this would require making a variable self-nesting.
    fn remap(&mut self, id: AtomId, term: &Term) -> bool {
        if let Some(other_id) = term.atomic_variable() {
            if other_id > id {
                // Keep this id and remap the other one instead.
                return self.unify_variable(
                    Scope::OUTPUT,
                    other_id,
                    Scope::OUTPUT,
                    &Term::variable(id),
                );
            }
        }
        let term = self.apply(Scope::OUTPUT, term);
        if term.has_variable(id) {
            // An un-unifiable condition like x0 = c0(x0).
            return false;
        }

        for i in 0..self.maps.len() {
            self.maps[i].apply_to_all(|t| t.replace_variable(id, &term));
        }
        self.maps[Scope::OUTPUT.get()].set(id, term);
        true
    }

    fn unify_variable(
        &mut self,
        var_scope: Scope,
        var_id: AtomId,
        term_scope: Scope,
        term: &Term,
    ) -> bool {
        if term_scope != Scope::OUTPUT {
            // Convert the term to the output scope and then unify.
            let term = self.apply(term_scope, term);
            return self.unify_variable(var_scope, var_id, Scope::OUTPUT, &term);
        }

        if self.has_mapping(var_scope, var_id) {
            let existing = self.get_mapping(var_scope, var_id).unwrap().clone();
            return self.unify(Scope::OUTPUT, &existing, Scope::OUTPUT, term);
        }

        if var_scope == Scope::OUTPUT {
            if term.atomic_variable() == Some(var_id) {
                // Unifying a variable with itself.
                return true;
            }

            if term.has_variable(var_id) {
                return false;
            }

            return self.remap(var_id, term);
        }

        self.set_mapping(var_scope, var_id, term.clone());
        true
    }

    fn unify_atoms(&mut self, scope1: Scope, atom1: Atom, scope2: Scope, atom2: Atom) -> bool {
        if let Atom::Variable(i) = atom1 {
            return self.unify_variable(scope1, i, scope2, &Term::atom(atom2));
        }
        if let Atom::Variable(i) = atom2 {
            return self.unify_variable(scope2, i, scope1, &Term::atom(atom1));
        }
        atom1 == atom2
    }

    /// Unify two terms, which may be in different scopes.
    pub fn unify(&mut self, scope1: Scope, term1: &Term, scope2: Scope, term2: &Term) -> bool {
        // Handle the case where we're unifying something with a variable.
        if let Some(i) = term1.atomic_variable() {
            return self.unify_variable(scope1, i, scope2, term2);
        }
        if let Some(i) = term2.atomic_variable() {
            return self.unify_variable(scope2, i, scope1, term1);
        }

        if term1.args.len() != term2.args.len() {
            return false;
        }
        if !self.unify_atoms(scope1, term1.head, scope2, term2.head) {
            return false;
        }

        for (a1, a2) in term1.args.iter().zip(term2.args.iter()) {
            if !self.unify(scope1, a1, scope2, a2) {
                return false;
            }
        }

        true
    }

    // Handle paramodulation into either positive or negative literals.
    //
    // The rule is, given:
    // s = t   (the paramodulator's literal, in the "left" scope)
    // u ?= v  (the target literal, in the "right" scope)
    //
    // if s unifies with the subterm of u at `path`, replace it with t:
    //
    // u[s -> t] ?= v
    // (after the unifier has been applied to the whole thing)
    //
    // If 'target_forwards' is false, the u ?= v literal is read as v ?= u.
    pub fn superpose_literals(
        &mut self,
        t: &Term,
        path: &[usize],
        target_literal: &Literal,
        target_forwards: bool,
    ) -> Literal {
        let (u, v) = if target_forwards {
            (&target_literal.left, &target_literal.right)
        } else {
            (&target_literal.right, &target_literal.left)
        };
        let unified_u = self.apply_replace(
            Scope::RIGHT,
            u,
            Some(Replacement {
                path,
                scope: Scope::LEFT,
                term: t,
            }),
        );
        let unified_v = self.apply(Scope::RIGHT, v);
        Literal::new(target_literal.positive, unified_u, unified_v)
    }

    // Handle paramodulation between two entire clauses.
    //
    // Given:
    // s = t | S   (the paramodulator's clause, "left" scope)
    // u ?= v | R  (the target clause, "right" scope)
    //
    // produce the superposed literal plus the unified literals of S and R.
    // The paramodulating and target literals both get dropped in favor of the
    // combined one.
    pub fn superpose_clauses(
        &mut self,
        t: &Term,
        pm_clause: &Clause,
        pm_literal_index: usize,
        path: &[usize],
        target_clause: &Clause,
        target_literal_index: usize,
        target_forwards: bool,
    ) -> Vec<Literal> {
        let target_literal = &target_clause.literals[target_literal_index];
        let new_literal = self.superpose_literals(t, path, target_literal, target_forwards);
        let mut literals = vec![new_literal];

        for (i, literal) in target_clause.literals.iter().enumerate() {
            if i == target_literal_index {
                continue;
            }
            let (unified_literal, _) = self.apply_to_literal(Scope::RIGHT, literal);
            literals.push(unified_literal);
        }

        for (i, literal) in pm_clause.literals.iter().enumerate() {
            if i == pm_literal_index {
                continue;
            }
            let (unified_literal, _) = self.apply_to_literal(Scope::LEFT, literal);
            literals.push(unified_literal);
        }

        literals
    }
}

impl fmt::Display for Unifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Unifier:")?;
        for (scope, map) in self.maps.iter().enumerate() {
            write!(f, "  {:?}: {}", Scope(scope), map)?;
            if scope < self.maps.len() - 1 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unify(u: &mut Unifier, s1: Scope, t1: &Term, s2: Scope, t2: &Term) {
        assert!(u.unify(s1, t1, s2, t2), "failed to unify {} and {}", t1, t2);
        let out1 = u.apply(s1, t1);
        let out2 = u.apply(s2, t2);
        assert_eq!(out1, out2, "inconsistent unification of {} and {}", t1, t2);
    }

    #[test]
    fn test_same_scope() {
        let term1 = Term::parse("c0(x0, x1)");
        let term2 = Term::parse("c0(x1, x2)");
        let mut u = Unifier::new(3);
        assert_unify(&mut u, Scope::LEFT, &term1, Scope::LEFT, &term2);
        let new1 = u.apply(Scope::LEFT, &term1);
        assert_eq!(format!("{}", new1), "c0(x0, x0)");
    }

    #[test]
    fn test_different_scope() {
        let term1 = Term::parse("c0(x0, x1)");
        let term2 = Term::parse("c0(x1, x2)");
        let mut u = Unifier::new(3);
        assert_unify(&mut u, Scope::LEFT, &term1, Scope::RIGHT, &term2);
        let new1 = u.apply(Scope::LEFT, &term1);
        assert_eq!(format!("{}", new1), "c0(x0, x1)");
    }

    #[test]
    fn test_occurs_check() {
        let first = Term::parse("c0(x0, c0(x1, c1(x2)))");
        let second = Term::parse("c0(c0(x2, x1), x0)");
        let mut u = Unifier::new(3);
        assert!(!u.unify(Scope::LEFT, &first, Scope::LEFT, &second));
    }

    #[test]
    fn test_recursive_reference_in_output() {
        let first = Term::parse("c2(x0, x0)");
        let second = Term::parse("c2(c2(c1(c0, x0), x0), c2(x1, x1))");
        let mut u = Unifier::new(3);
        assert!(!u.unify(Scope::LEFT, &first, Scope::RIGHT, &second));
    }

    #[test]
    fn test_superpose_clauses() {
        // Pattern: c1 = c3. Target: c0(c3) = c2. Rewriting c3 inside the target
        // at path [0] with the pattern backwards gives c0(c1) = c2.
        let pm_clause = Clause::parse("c3 = c1");
        let target_clause = Clause::parse("c0(c3) = c2");
        let mut u = Unifier::new(3);
        let s = &pm_clause.literals[0].left;
        assert!(u.unify(
            Scope::LEFT,
            s,
            Scope::RIGHT,
            target_clause.literals[0].left.subterm_at_path(&[0]).unwrap()
        ));
        let t = pm_clause.literals[0].right.clone();
        let literals = u.superpose_clauses(&t, &pm_clause, 0, &[0], &target_clause, 0, true);
        let clause = Clause::new(literals);
        assert_eq!(format!("{}", clause), "c0(c1) = c2");
    }

    #[test]
    fn test_superpose_keeps_residual_literals() {
        let pm_clause = Clause::parse("c3 = c1 | c4(x0)");
        let target_clause = Clause::parse("c0(c3) != c2 | c5(x0)");
        let mut u = Unifier::new(3);
        let s = &pm_clause.literals[0].left;
        assert!(u.unify(
            Scope::LEFT,
            s,
            Scope::RIGHT,
            target_clause.literals[0].left.subterm_at_path(&[0]).unwrap(),
        ));
        let t = pm_clause.literals[0].right.clone();
        let literals = u.superpose_clauses(&t, &pm_clause, 0, &[0], &target_clause, 0, true);
        assert_eq!(literals.len(), 3);
    }
}
