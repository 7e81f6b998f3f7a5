use crate::atom::{Atom, AtomId};
use crate::clause::Clause;
use crate::literal::Literal;
use crate::signature::Signature;
use crate::term::Term;

/// A first-order formula, used for the synthesized schema instances.
/// Quantifiers bind one variable id each; the builders and the parser keep
/// bound variable ids distinct, so capture is not a concern here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    Atom(Term),
    Eq(Term, Term),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),
    Forall(AtomId, Box<Formula>),
    Exists(AtomId, Box<Formula>),
}

// Negation normal form: what's left after connective elimination.
enum Nnf {
    Lit(Literal),
    And(Box<Nnf>, Box<Nnf>),
    Or(Box<Nnf>, Box<Nnf>),
    Forall(AtomId, Box<Nnf>),
    Exists(AtomId, Box<Nnf>),
}

impl Formula {
    pub fn not(f: Formula) -> Formula {
        Formula::Not(Box::new(f))
    }

    pub fn and(a: Formula, b: Formula) -> Formula {
        Formula::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: Formula, b: Formula) -> Formula {
        Formula::Or(Box::new(a), Box::new(b))
    }

    pub fn implies(a: Formula, b: Formula) -> Formula {
        Formula::Implies(Box::new(a), Box::new(b))
    }

    pub fn iff(a: Formula, b: Formula) -> Formula {
        Formula::Iff(Box::new(a), Box::new(b))
    }

    pub fn forall(v: AtomId, f: Formula) -> Formula {
        Formula::Forall(v, Box::new(f))
    }

    pub fn exists(v: AtomId, f: Formula) -> Formula {
        Formula::Exists(v, Box::new(f))
    }

    /// The disjunction of a clause's literals, for use as a schema body.
    pub fn from_clause(clause: &Clause) -> Formula {
        let mut literals = clause.literals.iter();
        let first = literals
            .next()
            .expect("cannot build a formula from the empty clause");
        let mut formula = Formula::from_literal(first);
        for literal in literals {
            formula = Formula::or(formula, Formula::from_literal(literal));
        }
        formula
    }

    pub fn from_literal(literal: &Literal) -> Formula {
        let base = if literal.is_predicate() {
            Formula::Atom(literal.left.clone())
        } else {
            Formula::Eq(literal.left.clone(), literal.right.clone())
        };
        if literal.positive {
            base
        } else {
            Formula::not(base)
        }
    }

    /// Replaces free occurrences of the variable. Shadowing binders stop the
    /// replacement, although the builders never create shadowed ids.
    pub fn replace_variable(&self, id: AtomId, replacement: &Term) -> Formula {
        match self {
            Formula::Atom(t) => Formula::Atom(t.replace_variable(id, replacement)),
            Formula::Eq(a, b) => Formula::Eq(
                a.replace_variable(id, replacement),
                b.replace_variable(id, replacement),
            ),
            Formula::Not(f) => Formula::not(f.replace_variable(id, replacement)),
            Formula::And(a, b) => Formula::and(
                a.replace_variable(id, replacement),
                b.replace_variable(id, replacement),
            ),
            Formula::Or(a, b) => Formula::or(
                a.replace_variable(id, replacement),
                b.replace_variable(id, replacement),
            ),
            Formula::Implies(a, b) => Formula::implies(
                a.replace_variable(id, replacement),
                b.replace_variable(id, replacement),
            ),
            Formula::Iff(a, b) => Formula::iff(
                a.replace_variable(id, replacement),
                b.replace_variable(id, replacement),
            ),
            Formula::Forall(v, f) if *v != id => {
                Formula::forall(*v, f.replace_variable(id, replacement))
            }
            Formula::Exists(v, f) if *v != id => {
                Formula::exists(*v, f.replace_variable(id, replacement))
            }
            shadowed => shadowed.clone(),
        }
    }

    /// Free variables in order of first occurrence.
    pub fn free_variables(&self) -> Vec<AtomId> {
        let mut acc = vec![];
        self.collect_free(&mut vec![], &mut acc);
        acc
    }

    fn collect_free(&self, bound: &mut Vec<AtomId>, acc: &mut Vec<AtomId>) {
        match self {
            Formula::Atom(t) => Formula::term_free(t, bound, acc),
            Formula::Eq(a, b) => {
                Formula::term_free(a, bound, acc);
                Formula::term_free(b, bound, acc);
            }
            Formula::Not(f) => f.collect_free(bound, acc),
            Formula::And(a, b)
            | Formula::Or(a, b)
            | Formula::Implies(a, b)
            | Formula::Iff(a, b) => {
                a.collect_free(bound, acc);
                b.collect_free(bound, acc);
            }
            Formula::Forall(v, f) | Formula::Exists(v, f) => {
                bound.push(*v);
                f.collect_free(bound, acc);
                bound.pop();
            }
        }
    }

    fn term_free(term: &Term, bound: &[AtomId], acc: &mut Vec<AtomId>) {
        if let Atom::Variable(i) = term.head {
            if !bound.contains(&i) && !acc.contains(&i) {
                acc.push(i);
            }
        }
        for arg in &term.args {
            Formula::term_free(arg, bound, acc);
        }
    }

    /// One past the largest variable id mentioned anywhere in the formula.
    pub fn var_bound(&self) -> AtomId {
        match self {
            Formula::Atom(t) => t.var_bound(),
            Formula::Eq(a, b) => a.var_bound().max(b.var_bound()),
            Formula::Not(f) => f.var_bound(),
            Formula::And(a, b)
            | Formula::Or(a, b)
            | Formula::Implies(a, b)
            | Formula::Iff(a, b) => a.var_bound().max(b.var_bound()),
            Formula::Forall(v, f) | Formula::Exists(v, f) => (*v + 1).max(f.var_bound()),
        }
    }

    // Connective elimination and negation pushing in one pass.
    fn to_nnf(&self, negate: bool) -> Nnf {
        match self {
            Formula::Atom(t) => Nnf::Lit(Literal::new(
                !negate,
                t.clone(),
                Term::new_true(),
            )),
            Formula::Eq(a, b) => Nnf::Lit(Literal::new(!negate, a.clone(), b.clone())),
            Formula::Not(f) => f.to_nnf(!negate),
            Formula::And(a, b) => {
                if negate {
                    Nnf::Or(Box::new(a.to_nnf(true)), Box::new(b.to_nnf(true)))
                } else {
                    Nnf::And(Box::new(a.to_nnf(false)), Box::new(b.to_nnf(false)))
                }
            }
            Formula::Or(a, b) => {
                if negate {
                    Nnf::And(Box::new(a.to_nnf(true)), Box::new(b.to_nnf(true)))
                } else {
                    Nnf::Or(Box::new(a.to_nnf(false)), Box::new(b.to_nnf(false)))
                }
            }
            Formula::Implies(a, b) => {
                if negate {
                    // !(a -> b) is a & !b
                    Nnf::And(Box::new(a.to_nnf(false)), Box::new(b.to_nnf(true)))
                } else {
                    Nnf::Or(Box::new(a.to_nnf(true)), Box::new(b.to_nnf(false)))
                }
            }
            Formula::Iff(a, b) => {
                if negate {
                    // !(a <=> b) is (a | b) & (!a | !b)
                    Nnf::And(
                        Box::new(Nnf::Or(
                            Box::new(a.to_nnf(false)),
                            Box::new(b.to_nnf(false)),
                        )),
                        Box::new(Nnf::Or(
                            Box::new(a.to_nnf(true)),
                            Box::new(b.to_nnf(true)),
                        )),
                    )
                } else {
                    // a <=> b is (!a | b) & (a | !b)
                    Nnf::And(
                        Box::new(Nnf::Or(
                            Box::new(a.to_nnf(true)),
                            Box::new(b.to_nnf(false)),
                        )),
                        Box::new(Nnf::Or(
                            Box::new(a.to_nnf(false)),
                            Box::new(b.to_nnf(true)),
                        )),
                    )
                }
            }
            Formula::Forall(v, f) => {
                if negate {
                    Nnf::Exists(*v, Box::new(f.to_nnf(true)))
                } else {
                    Nnf::Forall(*v, Box::new(f.to_nnf(false)))
                }
            }
            Formula::Exists(v, f) => {
                if negate {
                    Nnf::Forall(*v, Box::new(f.to_nnf(true)))
                } else {
                    Nnf::Exists(*v, Box::new(f.to_nnf(false)))
                }
            }
        }
    }

    /// CNF translation: negation normal form, skolemization against the
    /// enclosing universal stack (non-prenex, so skolem arities stay small),
    /// then distribution. Free variables are implicitly universal.
    pub fn cnf(&self, sig: &mut Signature) -> Vec<Clause> {
        let nnf = self.to_nnf(false);
        let free = self.free_variables();
        let skolemized = skolemize(&free, nnf, sig);
        let mut lists = vec![];
        distribute(skolemized, &mut lists);
        lists
            .into_iter()
            .map(Clause::new)
            .filter(|c| !c.is_tautology())
            .collect()
    }
}

// The stack holds the universally quantified variables in scope. Each
// existential variable becomes a fresh skolem function applied to the stack.
fn skolemize(stack: &[AtomId], nnf: Nnf, sig: &mut Signature) -> Nnf {
    match nnf {
        Nnf::Forall(v, body) => {
            let mut new_stack = stack.to_vec();
            if !new_stack.contains(&v) {
                new_stack.push(v);
            }
            // The quantifier itself is dropped; CNF variables are implicitly
            // universal.
            skolemize(&new_stack, *body, sig)
        }
        Nnf::Exists(v, body) => {
            let symbol = sig.fresh_skolem();
            sig.set_arity(symbol, stack.len());
            let args = stack.iter().map(|&i| Term::variable(i)).collect();
            let replacement = Term::new(Atom::Symbol(symbol), args);
            let replaced = replace_in_nnf(*body, v, &replacement);
            skolemize(stack, replaced, sig)
        }
        Nnf::And(a, b) => Nnf::And(
            Box::new(skolemize(stack, *a, sig)),
            Box::new(skolemize(stack, *b, sig)),
        ),
        Nnf::Or(a, b) => Nnf::Or(
            Box::new(skolemize(stack, *a, sig)),
            Box::new(skolemize(stack, *b, sig)),
        ),
        lit => lit,
    }
}

fn replace_in_nnf(nnf: Nnf, id: AtomId, replacement: &Term) -> Nnf {
    match nnf {
        Nnf::Lit(literal) => {
            let left = literal.left.replace_variable(id, replacement);
            let right = literal.right.replace_variable(id, replacement);
            Nnf::Lit(Literal::new(literal.positive, left, right))
        }
        Nnf::And(a, b) => Nnf::And(
            Box::new(replace_in_nnf(*a, id, replacement)),
            Box::new(replace_in_nnf(*b, id, replacement)),
        ),
        Nnf::Or(a, b) => Nnf::Or(
            Box::new(replace_in_nnf(*a, id, replacement)),
            Box::new(replace_in_nnf(*b, id, replacement)),
        ),
        Nnf::Forall(v, f) if v != id => {
            Nnf::Forall(v, Box::new(replace_in_nnf(*f, id, replacement)))
        }
        Nnf::Exists(v, f) if v != id => {
            Nnf::Exists(v, Box::new(replace_in_nnf(*f, id, replacement)))
        }
        shadowed => shadowed,
    }
}

// Distributes or over and, producing lists of literals.
fn distribute(nnf: Nnf, output: &mut Vec<Vec<Literal>>) {
    match nnf {
        Nnf::And(a, b) => {
            distribute(*a, output);
            distribute(*b, output);
        }
        other => {
            let mut disjuncts = vec![];
            collect_disjunction(other, &mut disjuncts);
            // Each conjunctive disjunct multiplies out.
            let mut lists: Vec<Vec<Literal>> = vec![vec![]];
            for disjunct in disjuncts {
                match disjunct {
                    DisjunctPart::Lit(literal) => {
                        for list in &mut lists {
                            list.push(literal.clone());
                        }
                    }
                    DisjunctPart::Conj(sub) => {
                        let mut sub_lists = vec![];
                        for part in sub {
                            distribute(part, &mut sub_lists);
                        }
                        let mut new_lists = vec![];
                        for list in &lists {
                            for sub_list in &sub_lists {
                                let mut combined = list.clone();
                                combined.extend(sub_list.iter().cloned());
                                new_lists.push(combined);
                            }
                        }
                        lists = new_lists;
                    }
                }
            }
            output.extend(lists);
        }
    }
}

enum DisjunctPart {
    Lit(Literal),
    Conj(Vec<Nnf>),
}

fn collect_disjunction(nnf: Nnf, output: &mut Vec<DisjunctPart>) {
    match nnf {
        Nnf::Or(a, b) => {
            collect_disjunction(*a, output);
            collect_disjunction(*b, output);
        }
        Nnf::Lit(literal) => output.push(DisjunctPart::Lit(literal)),
        Nnf::And(a, b) => output.push(DisjunctPart::Conj(vec![*a, *b])),
        Nnf::Forall(..) | Nnf::Exists(..) => {
            panic!("quantifiers must be gone before distribution")
        }
    }
}
