use fxhash::FxHashMap;

use crate::atom::{Atom, SymbolId};
use crate::clause::Clause;
use crate::term::Term;

/// Per-symbol information tracked by the signature.
#[derive(Debug, Clone, Default)]
struct SymbolInfo {
    name: String,
    arity: Option<usize>,
    is_associative: bool,
    is_commutative: bool,
}

/// Interns function and predicate symbols. Also mints the fresh skolem and
/// definition symbols that CNF translation and clause splitting need, and
/// tracks which symbols have been recognized as AC.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    symbols: Vec<SymbolInfo>,
    by_name: FxHashMap<String, SymbolId>,
    skolem_count: usize,
    def_count: usize,
}

impl Signature {
    pub fn new() -> Signature {
        Signature::default()
    }

    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.symbols.len() as SymbolId;
        self.symbols.push(SymbolInfo {
            name: name.to_string(),
            ..SymbolInfo::default()
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    /// The membership predicate that the comprehension and replacement
    /// instances are built around.
    pub fn member(&mut self) -> SymbolId {
        self.intern("member")
    }

    /// Falls back to the test-syntax spelling for symbols that were never
    /// interned by name (e.g. clauses built with `Clause::parse`).
    pub fn symbol_name(&self, id: SymbolId) -> String {
        match self.symbols.get(id as usize) {
            Some(info) if !info.name.is_empty() => info.name.clone(),
            _ => format!("c{}", id),
        }
    }

    pub fn set_arity(&mut self, id: SymbolId, arity: usize) {
        self.ensure(id);
        self.symbols[id as usize].arity = Some(arity);
    }

    pub fn arity(&self, id: SymbolId) -> Option<usize> {
        self.symbols.get(id as usize).and_then(|info| info.arity)
    }

    fn ensure(&mut self, id: SymbolId) {
        while self.symbols.len() <= id as usize {
            self.symbols.push(SymbolInfo::default());
        }
    }

    /// Guarantees that the next interned symbol gets an id of at least
    /// `floor`. Callers that mix named symbols with externally numbered ones
    /// use this to keep the id spaces from colliding.
    pub fn reserve(&mut self, floor: SymbolId) {
        if floor > 0 {
            self.ensure(floor - 1);
        }
    }

    /// Gives every unnamed symbol of the clause its fallback spelling, so
    /// that printing and re-parsing the clause maps back to the same ids.
    pub fn register_fallback_names(&mut self, clause: &Clause) {
        for literal in &clause.literals {
            for term in [&literal.left, &literal.right] {
                self.register_term_names(term);
            }
        }
    }

    fn register_term_names(&mut self, term: &Term) {
        if let Atom::Symbol(id) = term.head {
            self.ensure(id);
            if self.symbols[id as usize].name.is_empty() {
                let name = format!("c{}", id);
                self.symbols[id as usize].name = name.clone();
                self.by_name.insert(name, id);
            }
        }
        for arg in &term.args {
            self.register_term_names(arg);
        }
    }

    pub fn fresh_skolem(&mut self) -> SymbolId {
        loop {
            self.skolem_count += 1;
            let name = format!("esk{}", self.skolem_count);
            if !self.by_name.contains_key(&name) {
                return self.intern(&name);
            }
        }
    }

    pub fn fresh_definition(&mut self) -> SymbolId {
        loop {
            self.def_count += 1;
            let name = format!("epred{}", self.def_count);
            if !self.by_name.contains_key(&name) {
                return self.intern(&name);
            }
        }
    }

    pub fn is_ac(&self, id: SymbolId) -> bool {
        match self.symbols.get(id as usize) {
            Some(info) => info.is_associative && info.is_commutative,
            None => false,
        }
    }

    /// Checks whether the clause is a commutativity or associativity axiom and
    /// records the fact. Returns true if the AC theory was extended.
    pub fn scan_ac(&mut self, clause: &Clause) -> bool {
        if clause.literals.len() != 1 {
            return false;
        }
        let literal = &clause.literals[0];
        if !literal.positive {
            return false;
        }
        let mut extended = false;
        if let Some(id) = Signature::commutativity_symbol(&literal.left, &literal.right) {
            self.ensure(id);
            if !self.symbols[id as usize].is_commutative {
                self.symbols[id as usize].is_commutative = true;
                extended = self.is_ac(id);
            }
        }
        if let Some(id) = Signature::associativity_symbol(&literal.left, &literal.right) {
            self.ensure(id);
            if !self.symbols[id as usize].is_associative {
                self.symbols[id as usize].is_associative = true;
                extended = extended || self.is_ac(id);
            }
        }
        extended
    }

    // Matches f(x, y) = f(y, x) with x != y.
    fn commutativity_symbol(left: &Term, right: &Term) -> Option<SymbolId> {
        let id = match (left.head, right.head) {
            (Atom::Symbol(a), Atom::Symbol(b)) if a == b => a,
            _ => None?,
        };
        if left.args.len() != 2 || right.args.len() != 2 {
            return None;
        }
        let x = left.args[0].atomic_variable()?;
        let y = left.args[1].atomic_variable()?;
        if x != y
            && right.args[0].atomic_variable() == Some(y)
            && right.args[1].atomic_variable() == Some(x)
        {
            Some(id)
        } else {
            None
        }
    }

    // Matches f(f(x, y), z) = f(x, f(y, z)) in either orientation.
    fn associativity_symbol(left: &Term, right: &Term) -> Option<SymbolId> {
        if Signature::is_left_assoc_side(left, right) {
            return match left.head {
                Atom::Symbol(id) => Some(id),
                _ => None,
            };
        }
        if Signature::is_left_assoc_side(right, left) {
            return match right.head {
                Atom::Symbol(id) => Some(id),
                _ => None,
            };
        }
        None
    }

    fn is_left_assoc_side(left: &Term, right: &Term) -> bool {
        let id = match (left.head, right.head) {
            (Atom::Symbol(a), Atom::Symbol(b)) if a == b => a,
            _ => return false,
        };
        if left.args.len() != 2 || right.args.len() != 2 {
            return false;
        }
        let inner_left = &left.args[0];
        let inner_right = &right.args[1];
        if inner_left.head != Atom::Symbol(id) || inner_right.head != Atom::Symbol(id) {
            return false;
        }
        if inner_left.args.len() != 2 || inner_right.args.len() != 2 {
            return false;
        }
        let x = inner_left.args[0].atomic_variable();
        let y = inner_left.args[1].atomic_variable();
        let z = left.args[1].atomic_variable();
        x.is_some()
            && y.is_some()
            && z.is_some()
            && x != y
            && y != z
            && x != z
            && right.args[0].atomic_variable() == x
            && inner_right.args[0].atomic_variable() == y
            && inner_right.args[1].atomic_variable() == z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut sig = Signature::new();
        let f = sig.intern("f");
        assert_eq!(sig.intern("f"), f);
        assert_ne!(sig.intern("g"), f);
        assert_eq!(sig.symbol_name(f), "f");
    }

    #[test]
    fn test_scan_ac() {
        let mut sig = Signature::new();
        // c0(x0, x1) = c0(x1, x0) is commutativity of symbol 0.
        let comm = Clause::parse("c0(x0, x1) = c0(x1, x0)");
        assert!(!sig.scan_ac(&comm));
        assert!(!sig.is_ac(0));
        let assoc = Clause::parse("c0(c0(x0, x1), x2) = c0(x0, c0(x1, x2))");
        assert!(sig.scan_ac(&assoc));
        assert!(sig.is_ac(0));
    }

    #[test]
    fn test_ac_normalize_sorts_flattened_args() {
        let mut sig = Signature::new();
        sig.scan_ac(&Clause::parse("c0(x0, x1) = c0(x1, x0)"));
        sig.scan_ac(&Clause::parse("c0(c0(x0, x1), x2) = c0(x0, c0(x1, x2))"));
        let left = Term::parse("c0(c1, c0(c2, c3))").ac_normalize(&sig);
        let right = Term::parse("c0(c0(c3, c2), c1)").ac_normalize(&sig);
        assert_eq!(left, right);
    }

    #[test]
    fn test_fresh_symbols_avoid_collisions() {
        let mut sig = Signature::new();
        sig.intern("esk1");
        let sk = sig.fresh_skolem();
        assert_eq!(sig.symbol_name(sk), "esk2");
    }
}
