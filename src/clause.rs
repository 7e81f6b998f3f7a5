use std::fmt;

use crate::atom::AtomId;
use crate::literal::Literal;
use crate::ordering::Kbo;
use crate::signature::Signature;

/// A clause is a disjunction (an "or") of literals, universally quantified over
/// its variables. An empty clause is the contradiction.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct Clause {
    pub literals: Vec<Literal>,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.literals.is_empty() {
            return write!(f, "<empty>");
        }
        for (i, literal) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", literal)?;
        }
        Ok(())
    }
}

impl Clause {
    /// Sorts literals, removes duplicate and impossible ones, and renumbers
    /// the variables. An empty result indicates a contradiction.
    pub fn new(literals: Vec<Literal>) -> Clause {
        let mut literals = literals
            .into_iter()
            .filter(|x| !x.is_impossible())
            .collect::<Vec<_>>();
        literals.sort();
        literals.dedup();

        let mut clause = Clause { literals };
        clause.normalize_vars();
        clause
    }

    pub fn impossible() -> Clause {
        Clause { literals: vec![] }
    }

    pub fn parse(s: &str) -> Clause {
        let s = s.replace(" or ", " | ");
        Clause::new(s.split(" | ").map(Literal::parse).collect::<Vec<_>>())
    }

    /// Renumbers variables in order of first occurrence. Idempotent.
    pub fn normalize_vars(&mut self) {
        let mut var_ids = vec![];
        for literal in &mut self.literals {
            literal.left.normalize_var_ids(&mut var_ids);
            literal.right.normalize_var_ids(&mut var_ids);
        }
    }

    /// An alpha-equivalent copy sharing no variable ids with the original.
    pub fn copy_disjoint(&self) -> Clause {
        let offset = self.var_bound();
        let literals = self
            .literals
            .iter()
            .map(|lit| {
                let mut copy = lit.clone();
                copy.left = copy.left.offset_vars(offset);
                copy.right = copy.right.offset_vars(offset);
                copy
            })
            .collect();
        Clause { literals }
    }

    pub fn var_bound(&self) -> AtomId {
        self.literals
            .iter()
            .map(|lit| lit.var_bound())
            .max()
            .unwrap_or(0)
    }

    pub fn collect_variables(&self) -> Vec<AtomId> {
        let mut acc = vec![];
        for literal in &self.literals {
            literal.collect_variables(&mut acc);
        }
        acc
    }

    pub fn is_tautology(&self) -> bool {
        // Negative literals sort first; check for (!p, p) pairs.
        if let Some(first_pos) = self.literals.iter().position(|x| x.positive) {
            for neg_literal in &self.literals[0..first_pos] {
                for pos_literal in &self.literals[first_pos..] {
                    if neg_literal.left == pos_literal.left
                        && neg_literal.right == pos_literal.right
                    {
                        return true;
                    }
                }
            }
        }
        self.literals.iter().any(|x| x.is_tautology())
    }

    /// Tautology check modulo AC, used once AC handling is active.
    pub fn is_tautology_ac(&self, sig: &Signature) -> bool {
        if self.is_tautology() {
            return true;
        }
        self.literals
            .iter()
            .any(|x| x.positive && x.left.ac_normalize(sig) == x.right.ac_normalize(sig))
    }

    pub fn is_impossible(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn is_unit(&self) -> bool {
        self.literals.len() == 1
    }

    pub fn atom_count(&self) -> u32 {
        self.literals.iter().map(|x| x.atom_count()).sum()
    }

    /// Standard clause weight: 2 per symbol, 1 per variable occurrence.
    pub fn standard_weight(&self) -> u32 {
        self.literals.iter().map(|x| x.standard_weight()).sum()
    }

    pub fn has_any_variable(&self) -> bool {
        self.literals.iter().any(|x| x.has_any_variable())
    }

    pub fn num_positive_literals(&self) -> usize {
        self.literals.iter().filter(|x| x.positive).count()
    }

    pub fn is_negative(&self) -> bool {
        self.literals.iter().all(|x| !x.positive)
    }

    /// A demodulator is a positive unit equation whose sides are ordered.
    /// The caller decides between the rule set (oriented) and the equation set.
    pub fn is_demodulator_shape(&self) -> bool {
        self.is_unit() && self.literals[0].positive
    }

    /// A rewrite rule: unit, positive, and oriented under the default ordering.
    pub fn is_rewrite_rule(&self) -> bool {
        if !self.is_demodulator_shape() {
            return false;
        }
        let literal = &self.literals[0];
        literal.left.kbo_cmp(&literal.right) == Some(std::cmp::Ordering::Greater)
    }

    /// Recomputes the orientation and maximality flags under the given
    /// ordering. After this, every oriented literal has its larger side left.
    pub fn orient(&mut self, kbo: &Kbo) {
        for literal in &mut self.literals {
            literal.orient(kbo);
        }
        let snapshot = self.literals.clone();
        for (i, literal) in self.literals.iter_mut().enumerate() {
            literal.maximal = !snapshot.iter().enumerate().any(|(j, other)| {
                j != i && literal.literal_cmp(other, kbo) == Some(std::cmp::Ordering::Less)
            });
        }
    }

    pub fn clear_selection(&mut self) {
        for literal in &mut self.literals {
            literal.selected = false;
        }
    }

    pub fn has_selection(&self) -> bool {
        self.literals.iter().any(|x| x.selected)
    }
}

/// Proptest generators for small random terms, literals and clauses, shared
/// by the property tests across the crate.
#[cfg(test)]
pub mod strategies {
    use proptest::prelude::*;

    use super::*;
    use crate::atom::Atom;
    use crate::literal::Literal;
    use crate::term::Term;

    pub fn arb_term() -> impl Strategy<Value = Term> {
        let leaf = prop_oneof![
            (0u16..3).prop_map(Term::variable),
            (0u32..3).prop_map(|i| Term::new(Atom::Symbol(i), vec![])),
        ];
        leaf.prop_recursive(3, 16, 3, |inner| {
            (3u32..6, proptest::collection::vec(inner, 1..3))
                .prop_map(|(head, args)| Term::new(Atom::Symbol(head), args))
        })
    }

    pub fn arb_literal() -> impl Strategy<Value = Literal> {
        (any::<bool>(), arb_term(), arb_term())
            .prop_map(|(positive, left, right)| Literal::new(positive, left, right))
    }

    pub fn arb_clause() -> impl Strategy<Value = Clause> {
        proptest::collection::vec(arb_literal(), 1..4).prop_map(Clause::new)
    }
}
