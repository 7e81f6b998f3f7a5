use std::cmp::Ordering;
use std::fmt;

use crate::atom::{Atom, AtomId};
use crate::ordering::Kbo;
use crate::signature::Signature;

/// A first-order term: a head atom applied to zero or more arguments.
/// Variables never have arguments.
#[derive(Debug, Eq, PartialEq, Hash, Clone, PartialOrd, Ord)]
pub struct Term {
    pub head: Atom,
    pub args: Vec<Term>,
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.args.is_empty() {
            write!(f, "(")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl Term {
    pub fn atom(head: Atom) -> Term {
        Term { head, args: vec![] }
    }

    pub fn new(head: Atom, args: Vec<Term>) -> Term {
        debug_assert!(args.is_empty() || !head.is_variable());
        Term { head, args }
    }

    pub fn new_true() -> Term {
        Term::atom(Atom::True)
    }

    pub fn variable(id: AtomId) -> Term {
        Term::atom(Atom::Variable(id))
    }

    pub fn is_true(&self) -> bool {
        self.head == Atom::True && self.args.is_empty()
    }

    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    /// If this term is a plain variable, return its id.
    pub fn atomic_variable(&self) -> Option<AtomId> {
        match self.head {
            Atom::Variable(i) if self.args.is_empty() => Some(i),
            _ => None,
        }
    }

    pub fn has_any_variable(&self) -> bool {
        self.head.is_variable() || self.args.iter().any(|a| a.has_any_variable())
    }

    pub fn has_variable(&self, id: AtomId) -> bool {
        self.head == Atom::Variable(id) || self.args.iter().any(|a| a.has_variable(id))
    }

    /// Appends the variables of this term in order of first occurrence.
    pub fn collect_variables(&self, acc: &mut Vec<AtomId>) {
        if let Atom::Variable(i) = self.head {
            if !acc.contains(&i) {
                acc.push(i);
            }
        }
        for arg in &self.args {
            arg.collect_variables(acc);
        }
    }

    /// One past the largest variable id in this term, zero if ground.
    pub fn var_bound(&self) -> AtomId {
        let mut bound = match self.head {
            Atom::Variable(i) => i + 1,
            _ => 0,
        };
        for arg in &self.args {
            bound = bound.max(arg.var_bound());
        }
        bound
    }

    /// Number of symbol occurrences (the "true" head counts as a symbol).
    pub fn symbol_count(&self) -> u32 {
        let mut count = if self.head.is_variable() { 0 } else { 1 };
        for arg in &self.args {
            count += arg.symbol_count();
        }
        count
    }

    /// Number of variable occurrences.
    pub fn variable_count(&self) -> u32 {
        let mut count = if self.head.is_variable() { 1 } else { 0 };
        for arg in &self.args {
            count += arg.variable_count();
        }
        count
    }

    /// Standard term weight: 2 per symbol occurrence, 1 per variable occurrence.
    pub fn standard_weight(&self) -> u32 {
        2 * self.symbol_count() + self.variable_count()
    }

    /// Renumbers variables in order of first occurrence, using `var_ids` as the
    /// running map from old id to new id. Idempotent when started from scratch.
    pub fn normalize_var_ids(&mut self, var_ids: &mut Vec<AtomId>) {
        if let Atom::Variable(i) = self.head {
            let new_id = match var_ids.iter().position(|&x| x == i) {
                Some(pos) => pos as AtomId,
                None => {
                    var_ids.push(i);
                    (var_ids.len() - 1) as AtomId
                }
            };
            self.head = Atom::Variable(new_id);
        }
        for arg in &mut self.args {
            arg.normalize_var_ids(var_ids);
        }
    }

    /// Shifts every variable id upward by `offset`.
    pub fn offset_vars(&self, offset: AtomId) -> Term {
        let head = match self.head {
            Atom::Variable(i) => Atom::Variable(i + offset),
            other => other,
        };
        Term {
            head,
            args: self.args.iter().map(|a| a.offset_vars(offset)).collect(),
        }
    }

    /// Replaces every occurrence of the variable with the replacement term.
    pub fn replace_variable(&self, id: AtomId, replacement: &Term) -> Term {
        if self.head == Atom::Variable(id) {
            debug_assert!(self.args.is_empty());
            return replacement.clone();
        }
        Term {
            head: self.head,
            args: self
                .args
                .iter()
                .map(|a| a.replace_variable(id, replacement))
                .collect(),
        }
    }

    pub fn subterm_at_path(&self, path: &[usize]) -> Option<&Term> {
        match path.split_first() {
            None => Some(self),
            Some((&i, rest)) => self.args.get(i).and_then(|a| a.subterm_at_path(rest)),
        }
    }

    pub fn replace_at_path(&self, path: &[usize], replacement: Term) -> Term {
        match path.split_first() {
            None => replacement,
            Some((&i, rest)) => {
                let mut new_term = self.clone();
                new_term.args[i] = self.args[i].replace_at_path(rest, replacement);
                new_term
            }
        }
    }

    /// All non-variable subterms paired with their paths, outermost first.
    /// Variables are not rewrite targets, so they are skipped.
    pub fn rewritable_subterms(&self) -> Vec<(Vec<usize>, &Term)> {
        let mut answer = vec![];
        self.push_rewritable_subterms(&mut vec![], &mut answer);
        answer
    }

    fn push_rewritable_subterms<'a>(
        &'a self,
        path: &mut Vec<usize>,
        acc: &mut Vec<(Vec<usize>, &'a Term)>,
    ) {
        if !self.head.is_variable() {
            acc.push((path.clone(), self));
        }
        for (i, arg) in self.args.iter().enumerate() {
            path.push(i);
            arg.push_rewritable_subterms(path, acc);
            path.pop();
        }
    }

    /// Knuth-Bendix comparison with default symbol weights.
    /// `Some(Greater)` means self is strictly larger in every instance.
    pub fn kbo_cmp(&self, other: &Term) -> Option<Ordering> {
        Kbo::default().term_cmp(self, other)
    }

    /// Flattens nested applications of AC symbols and sorts their arguments,
    /// so that AC-equal terms compare equal structurally.
    pub fn ac_normalize(&self, sig: &Signature) -> Term {
        let args: Vec<Term> = self.args.iter().map(|a| a.ac_normalize(sig)).collect();
        if let Atom::Symbol(s) = self.head {
            if sig.is_ac(s) {
                let mut flat = vec![];
                for arg in args {
                    if arg.head == self.head {
                        flat.extend(arg.args);
                    } else {
                        flat.push(arg);
                    }
                }
                flat.sort();
                return Term {
                    head: self.head,
                    args: flat,
                };
            }
        }
        Term {
            head: self.head,
            args,
        }
    }

    /// Parses the test syntax, e.g. "c0(x0, c1(x1))".
    pub fn parse(s: &str) -> Term {
        let mut chars = s.trim().chars().peekable();
        let term = Term::parse_partial(&mut chars);
        assert!(chars.next().is_none(), "trailing characters in term: {}", s);
        term
    }

    fn parse_partial(chars: &mut std::iter::Peekable<std::str::Chars>) -> Term {
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        let head = Atom::parse(&name);
        let mut args = vec![];
        if chars.peek() == Some(&'(') {
            chars.next();
            loop {
                args.push(Term::parse_partial(chars));
                match chars.next() {
                    Some(',') => {
                        while chars.peek() == Some(&' ') {
                            chars.next();
                        }
                    }
                    Some(')') => break,
                    c => panic!("unexpected char in term: {:?}", c),
                }
            }
        }
        Term::new(head, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_roundtrip() {
        for s in ["x0", "c0", "c0(x0)", "c0(x0, c1(x1, c2))"] {
            assert_eq!(format!("{}", Term::parse(s)), s);
        }
    }

    #[test]
    fn test_subterm_paths() {
        let term = Term::parse("c0(x0, c1(c2))");
        assert_eq!(
            format!("{}", term.subterm_at_path(&[1, 0]).unwrap()),
            "c2"
        );
        let replaced = term.replace_at_path(&[1], Term::parse("x1"));
        assert_eq!(format!("{}", replaced), "c0(x0, x1)");
        // Variables are not rewritable subterms.
        let subterms = term.rewritable_subterms();
        assert_eq!(subterms.len(), 3);
    }

    #[test]
    fn test_normalize_var_ids_idempotent() {
        let mut term = Term::parse("c0(x3, c1(x1, x3))");
        term.normalize_var_ids(&mut vec![]);
        assert_eq!(format!("{}", term), "c0(x0, c1(x1, x0))");
        let once = term.clone();
        term.normalize_var_ids(&mut vec![]);
        assert_eq!(term, once);
    }

    #[test]
    fn test_kbo_basics() {
        // A term is larger than its proper subterm.
        let big = Term::parse("c0(c1(x0))");
        let small = Term::parse("c1(x0)");
        assert_eq!(big.kbo_cmp(&small), Some(Ordering::Greater));
        // Terms with unrelated variables are incomparable.
        let left = Term::parse("c0(x0)");
        let right = Term::parse("c0(x1)");
        assert_eq!(left.kbo_cmp(&right), None);
    }

    #[test]
    fn test_standard_weight() {
        assert_eq!(Term::parse("c0(x0, c1)").standard_weight(), 5);
    }
}
