use fxhash::{FxHashMap, FxHashSet};

use crate::clause::Clause;
use crate::term::Term;

/// Node threshold past which the periodic garbage pass runs.
pub const TMPBANK_GC_LIMIT: usize = 20_000;

/// A hash-consing store for terms, shared by all clauses. The bank tracks how
/// many distinct term nodes exist, counts insertions (which drives the
/// term-insertion resource limit and one of the SAT-check cadences), and holds
/// the rewrite links that demodulation uses to avoid renormalizing terms.
///
/// The proof state owns two banks: the main one, and a tmp bank that receives
/// ephemeral terms created during simplification and is swept each cycle.
#[derive(Debug, Clone, Default)]
pub struct TermBank {
    nodes: FxHashSet<Term>,

    /// Total insertions over the bank's lifetime, never reset by sweeps.
    insertions: u64,

    /// Rewrite links: term -> (normal form, system date it was computed at).
    /// A link is only trusted while the rewrite system hasn't grown.
    nf_cache: FxHashMap<Term, (Term, u64)>,
}

impl TermBank {
    pub fn new() -> TermBank {
        TermBank::default()
    }

    /// Records the term and all its subterms, returning a shared copy.
    /// Every new node counts as one insertion.
    pub fn intern(&mut self, term: &Term) -> Term {
        self.intern_inner(term);
        term.clone()
    }

    fn intern_inner(&mut self, term: &Term) {
        if self.nodes.contains(term) {
            return;
        }
        for arg in &term.args {
            self.intern_inner(arg);
        }
        self.nodes.insert(term.clone());
        self.insertions += 1;
    }

    pub fn intern_clause(&mut self, clause: &Clause) {
        for literal in &clause.literals {
            self.intern_inner(&literal.left);
            self.intern_inner(&literal.right);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn insertions(&self) -> u64 {
        self.insertions
    }

    pub fn needs_gc(&self) -> bool {
        self.nodes.len() > TMPBANK_GC_LIMIT
    }

    /// Stores a rewrite link from a term to its normal form.
    pub fn set_rewrite_link(&mut self, term: Term, normal_form: Term, date: u64) {
        self.nf_cache.insert(term, (normal_form, date));
    }

    /// A cached normal form is only valid if it was computed at the current
    /// system date; installing a new demodulator invalidates older links.
    pub fn get_rewrite_link(&self, term: &Term, date: u64) -> Option<&Term> {
        match self.nf_cache.get(term) {
            Some((normal_form, link_date)) if *link_date == date => Some(normal_form),
            _ => None,
        }
    }

    /// Mark/sweep garbage pass: retains exactly the nodes reachable from the
    /// given clauses, and drops rewrite links whose terms died.
    pub fn gc_sweep<'a>(&mut self, live: impl Iterator<Item = &'a Clause>) {
        let mut retained = FxHashSet::default();
        for clause in live {
            for literal in &clause.literals {
                TermBank::mark(&literal.left, &mut retained);
                TermBank::mark(&literal.right, &mut retained);
            }
        }
        self.nodes.retain(|t| retained.contains(t));
        self.nf_cache
            .retain(|t, (nf, _)| retained.contains(t) && retained.contains(nf));
    }

    fn mark(term: &Term, retained: &mut FxHashSet<Term>) {
        if retained.contains(term) {
            return;
        }
        for arg in &term.args {
            TermBank::mark(arg, retained);
        }
        retained.insert(term.clone());
    }

    /// Drops everything. Used for the tmp bank between cycles.
    pub fn sweep_all(&mut self) {
        self.nodes.clear();
        self.nf_cache.clear();
    }
}
