use crate::clause::Clause;
use crate::clause_sets::{ClauseArena, ClauseSet};
use crate::control::RewriteLevel;
use crate::literal::Literal;
use crate::ordering::Kbo;
use crate::proof_step::StepId;
use crate::subsumption::Matcher;
use crate::term::Term;
use crate::term_bank::TermBank;

/// The demodulators available for rewriting: the oriented positive rules and,
/// at full rewrite level, the unorientable positive equations (used only in
/// instance-ordered direction).
pub struct Demodulators<'a> {
    pub arena: &'a ClauseArena,
    pub kbo: &'a Kbo,
    pub rules: &'a ClauseSet,
    pub eqns: &'a ClauseSet,
    pub level: RewriteLevel,
    pub prefer_general: bool,

    /// LimitedRW gating: when set, only demodulators installed at or before
    /// this date apply.
    pub date_limit: Option<u64>,

    /// A clause that must not rewrite itself.
    pub exclude: Option<StepId>,
}

impl<'a> Demodulators<'a> {
    fn eligible(&self, id: StepId) -> bool {
        if self.exclude == Some(id) {
            return false;
        }
        if let Some(limit) = self.date_limit {
            if self.arena.get(id).date > limit {
                return false;
            }
        }
        true
    }

    // Try one rewrite step at the root of the term. Returns the reduct and
    // the demodulator used.
    fn rewrite_root(&self, term: &Term) -> Option<(Term, StepId)> {
        if self.level == RewriteLevel::NoRewrite {
            return None;
        }
        let mut best: Option<(Term, StepId, u32)> = None;
        for &id in self.rules.iter() {
            if !self.eligible(id) {
                continue;
            }
            let literal = &self.arena.get(id).clause.literals[0];
            let mut matcher = Matcher::new();
            if matcher.match_terms(&literal.left, term) {
                let reduct = matcher.apply(&literal.right);
                let generality = literal.left.standard_weight();
                if self.prefer_general {
                    let better = match &best {
                        Some((_, _, best_generality)) => generality < *best_generality,
                        None => true,
                    };
                    if better {
                        best = Some((reduct, id, generality));
                    }
                    continue;
                }
                return Some((reduct, id));
            }
        }
        if let Some((reduct, id, _)) = best {
            return Some((reduct, id));
        }

        if self.level < RewriteLevel::Full {
            return None;
        }
        // Unorientable equations rewrite only where the instance is ordered.
        for &id in self.eqns.iter() {
            if !self.eligible(id) {
                continue;
            }
            let literal = &self.arena.get(id).clause.literals[0];
            for (from, to) in [
                (&literal.left, &literal.right),
                (&literal.right, &literal.left),
            ] {
                let mut matcher = Matcher::new();
                if matcher.match_terms(from, term) {
                    let reduct = matcher.apply(to);
                    if self.kbo.greater(term, &reduct) {
                        return Some((reduct, id));
                    }
                }
            }
        }
        None
    }

    /// Computes the normal form of a term, innermost first, recording the
    /// demodulators used. The bank caches irreducibility per system date.
    pub fn normal_form(
        &self,
        bank: &mut TermBank,
        system_date: u64,
        term: &Term,
        used: &mut Vec<StepId>,
    ) -> Term {
        if bank.get_rewrite_link(term, system_date).is_some() {
            // Known irreducible at this date.
            return term.clone();
        }
        let used_before = used.len();
        let mut current = Term {
            head: term.head,
            args: term
                .args
                .iter()
                .map(|arg| self.normal_form(bank, system_date, arg, used))
                .collect(),
        };
        loop {
            match self.rewrite_root(&current) {
                Some((reduct, id)) => {
                    used.push(id);
                    current = self.normal_form(bank, system_date, &reduct, used);
                }
                None => break,
            }
        }
        if used.len() == used_before && self.date_limit.is_none() {
            // Nothing applied anywhere inside: irreducible. Only cacheable
            // for unrestricted rewriting.
            bank.set_rewrite_link(term.clone(), current.clone(), system_date);
        }
        current
    }

    /// Rewrites every literal of the clause to normal form. Returns the new
    /// clause and the demodulators used, or None if nothing changed.
    pub fn normalize_clause(
        &self,
        bank: &mut TermBank,
        system_date: u64,
        clause: &Clause,
    ) -> Option<(Clause, Vec<StepId>)> {
        let mut used = vec![];
        let mut changed = false;
        let mut literals = vec![];
        for literal in &clause.literals {
            let left = self.normal_form(bank, system_date, &literal.left, &mut used);
            let right = self.normal_form(bank, system_date, &literal.right, &mut used);
            if left != literal.left || right != literal.right {
                changed = true;
            }
            literals.push(Literal::new(literal.positive, left, right));
        }
        if !changed {
            return None;
        }
        Some((Clause::new(literals), used))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof_step::SetKind;

    struct Fixture {
        arena: ClauseArena,
        kbo: Kbo,
        rules: ClauseSet,
        eqns: ClauseSet,
    }

    impl Fixture {
        fn new(rules: &[&str], eqns: &[&str]) -> Fixture {
            let mut arena = ClauseArena::new();
            let kbo = Kbo::new();
            let mut rule_set = ClauseSet::new(SetKind::PosRules);
            let mut eqn_set = ClauseSet::new(SetKind::PosEqns);
            for s in rules {
                let mut clause = Clause::parse(s);
                clause.orient(&kbo);
                let id = arena.new_assumption(clause);
                rule_set.insert(&mut arena, id);
            }
            for s in eqns {
                let mut clause = Clause::parse(s);
                clause.orient(&kbo);
                let id = arena.new_assumption(clause);
                eqn_set.insert(&mut arena, id);
            }
            Fixture {
                arena,
                kbo,
                rules: rule_set,
                eqns: eqn_set,
            }
        }

        fn demods(&self) -> Demodulators {
            Demodulators {
                arena: &self.arena,
                kbo: &self.kbo,
                rules: &self.rules,
                eqns: &self.eqns,
                level: RewriteLevel::Full,
                prefer_general: false,
                date_limit: None,
                exclude: None,
            }
        }
    }

    #[test]
    fn test_rewrites_to_fixpoint() {
        let fixture = Fixture::new(&["c0(x0) = x0"], &[]);
        let mut used = vec![];
        let demods = fixture.demods();
        let mut bank = TermBank::new();
        let nf = demods.normal_form(&mut bank, 0, &Term::parse("c0(c0(c0(c1)))"), &mut used);
        assert_eq!(format!("{}", nf), "c1");
        assert_eq!(used.len(), 3);
    }

    #[test]
    fn test_unorientable_eqn_rewrites_ordered_instances() {
        // Commutativity can still rewrite c0(c2, c1) to c0(c1, c2) because
        // that instance is ordered.
        let fixture = Fixture::new(&[], &["c0(x0, x1) = c0(x1, x0)"]);
        let demods = fixture.demods();
        let mut bank = TermBank::new();
        let mut used = vec![];
        let nf = demods.normal_form(&mut bank, 0, &Term::parse("c0(c2, c1)"), &mut used);
        assert_eq!(format!("{}", nf), "c0(c1, c2)");
    }

    #[test]
    fn test_date_limit_gates_young_demodulators() {
        let mut fixture = Fixture::new(&["c0(x0) = x0"], &[]);
        let rule_id = *fixture.rules.iter().next().unwrap();
        fixture.arena.get_mut(rule_id).date = 5;
        let mut demods = fixture.demods();
        demods.date_limit = Some(3);
        let mut bank = TermBank::new();
        let mut used = vec![];
        let term = Term::parse("c0(c1)");
        let nf = demods.normal_form(&mut bank, 5, &term, &mut used);
        assert_eq!(nf, term);

        let mut demods = fixture.demods();
        demods.date_limit = Some(5);
        let nf = demods.normal_form(&mut bank, 5, &term, &mut used);
        assert_eq!(format!("{}", nf), "c1");
    }

    #[test]
    fn test_normalize_clause_reports_demods_used() {
        let fixture = Fixture::new(&["c0(x0) = x0"], &[]);
        let demods = fixture.demods();
        let mut bank = TermBank::new();
        let clause = Clause::parse("c2(c0(c1)) != c2(c1)");
        let (rewritten, used) = demods.normalize_clause(&mut bank, 0, &clause).unwrap();
        // Both sides normalize to c2(c1), making the literal impossible and
        // the clause empty.
        assert!(rewritten.is_empty());
        assert_eq!(used.len(), 1);
    }

    #[test]
    fn test_exclusion_prevents_self_rewrite() {
        let fixture = Fixture::new(&["c0(x0) = x0"], &[]);
        let rule_id = *fixture.rules.iter().next().unwrap();
        let mut demods = fixture.demods();
        demods.exclude = Some(rule_id);
        let mut bank = TermBank::new();
        let mut used = vec![];
        let term = Term::parse("c0(c1)");
        assert_eq!(demods.normal_form(&mut bank, 0, &term, &mut used), term);
    }
}
