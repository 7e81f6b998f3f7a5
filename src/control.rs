use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

use crate::clause_sets::{ClauseArena, ClauseSet};
use crate::feature_vector::FvIndexParms;
use crate::ordering::Kbo;
use crate::proof_step::{ClauseFlags, Eval, ProofStep, StepId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcHandling {
    /// Never scan for AC axioms.
    NoHandling,
    /// Scan for AC axioms and enable AC-aware simplification once found.
    Detect,
}

/// Which flavor of paramodulation to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamodType {
    /// No ordering checks after unification.
    Plain,
    /// Check that the instantiated paramodulator is still oriented.
    Sim,
    /// Additionally require the target literal to stay eligible.
    Super,
}

/// How much rewriting forward simplification applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RewriteLevel {
    NoRewrite,
    RulesOnly,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMethod {
    /// Split any variable-disjoint components.
    Any,
    /// Only split off ground components.
    GroundOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// No literal selection; ordering restrictions alone apply.
    NoSelection,
    /// Process clauses but generate nothing (used for preprocessing runs).
    NoGeneration,
    /// Select the first negative literal.
    SelectFirstNegative,
    /// Select the largest negative literal.
    SelectLargestNegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundingMode {
    /// The interleaved SAT check is disabled.
    NoGrounding,
    /// Instantiate every variable with the first constant of the problem.
    FirstConstant,
    /// Instantiate every variable with one fresh constant.
    FreshConstant,
}

/// The heuristic parameter block, consumed from external collaborators.
/// Field names follow the option keys the rest of the system knows them by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicParms {
    pub ac_handling: AcHandling,
    pub enable_eq_factoring: bool,
    pub enable_neg_unit_paramod: bool,
    pub pm_type: ParamodType,

    pub forward_demod: RewriteLevel,
    pub forward_context_sr: bool,
    pub forward_context_sr_aggressive: bool,
    pub backward_context_sr: bool,
    pub condensing: bool,
    pub condensing_aggressive: bool,

    pub detsort_bw_rw: bool,
    pub detsort_tmpset: bool,

    pub er_varlit_destructive: bool,
    pub er_strong_destructive: bool,
    pub er_aggressive: bool,

    pub split_aggressive: bool,
    pub split_clauses: usize,
    pub split_method: SplitMethod,
    pub split_fresh_defs: bool,

    pub prefer_initial_clauses: bool,
    pub prefer_general: bool,
    pub select_on_proc_only: bool,
    pub selection_strategy: SelectionStrategy,

    pub watchlist_is_static: bool,
    pub watchlist_simplify: bool,
    pub use_tptp_sos: bool,

    pub filter_orphans_limit: u64,
    pub forward_contract_limit: u64,
    pub delete_bad_limit: u64,

    pub sat_check_grounding: GroundingMode,
    pub sat_check_size_limit: u64,
    pub sat_check_step_limit: u64,
    pub sat_check_ttinsert_limit: u64,
    pub sat_check_normalize: bool,
    pub sat_check_normconst: bool,

    pub heuristic_name: String,
}

impl Default for HeuristicParms {
    fn default() -> HeuristicParms {
        HeuristicParms {
            ac_handling: AcHandling::Detect,
            enable_eq_factoring: true,
            enable_neg_unit_paramod: true,
            pm_type: ParamodType::Sim,
            forward_demod: RewriteLevel::Full,
            forward_context_sr: false,
            forward_context_sr_aggressive: false,
            backward_context_sr: false,
            condensing: false,
            condensing_aggressive: false,
            detsort_bw_rw: false,
            detsort_tmpset: false,
            er_varlit_destructive: false,
            er_strong_destructive: false,
            er_aggressive: false,
            split_aggressive: false,
            split_clauses: 0,
            split_method: SplitMethod::Any,
            split_fresh_defs: true,
            prefer_initial_clauses: false,
            prefer_general: false,
            select_on_proc_only: false,
            selection_strategy: SelectionStrategy::NoSelection,
            watchlist_is_static: false,
            watchlist_simplify: true,
            use_tptp_sos: false,
            filter_orphans_limit: u64::MAX,
            forward_contract_limit: u64::MAX,
            delete_bad_limit: u64::MAX,
            sat_check_grounding: GroundingMode::NoGrounding,
            sat_check_size_limit: 10_000,
            sat_check_step_limit: 5_000,
            sat_check_ttinsert_limit: 5_000_000,
            sat_check_normalize: false,
            sat_check_normconst: false,
            heuristic_name: "Default".to_string(),
        }
    }
}

/// Owns the term ordering and the heuristic machinery: everything about *how*
/// to saturate, as opposed to the proof state, which is *what* is saturated.
#[derive(Debug)]
pub struct ProofControl {
    pub kbo: Kbo,
    pub heuristic_parms: HeuristicParms,
    pub fvi_parms: FvIndexParms,

    /// One-way flag: set when AC axioms are detected, never unset.
    pub ac_handling_active: bool,

    /// How many picks happen by weight for each pick by age. A pure-FIFO
    /// heuristic always picks by age.
    age_weight_ratio: u64,
    fifo: bool,
    picks: u64,
}

impl Default for ProofControl {
    fn default() -> ProofControl {
        ProofControl::new(HeuristicParms::default(), FvIndexParms::default())
    }
}

impl ProofControl {
    pub fn new(heuristic_parms: HeuristicParms, fvi_parms: FvIndexParms) -> ProofControl {
        let (age_weight_ratio, fifo) = match heuristic_parms.heuristic_name.as_str() {
            "Weight" => (0, false),
            "FIFO" => (0, true),
            _ => (5, false),
        };
        ProofControl {
            kbo: Kbo::new(),
            heuristic_parms,
            fvi_parms,
            ac_handling_active: false,
            age_weight_ratio,
            fifo,
            picks: 0,
        }
    }

    /// The heuristic evaluation of a clause: priority dominates, then weight.
    pub fn evaluate(&self, step: &ProofStep) -> Eval {
        let mut priority = 0;
        if self.heuristic_parms.prefer_initial_clauses
            && step.flags.query(ClauseFlags::INITIAL)
        {
            priority -= 1;
        }
        if self.heuristic_parms.use_tptp_sos && step.sos {
            priority -= 1;
        }
        if step.flags.query(ClauseFlags::SUBSUMES_WATCH) {
            priority -= 1;
        }
        Eval {
            priority,
            weight: NotNan::new(step.weight as f64).unwrap(),
        }
    }

    /// Applies the configured literal selection strategy to a clause.
    pub fn do_literal_selection(&self, clause: &mut crate::clause::Clause) {
        clause.clear_selection();
        match self.heuristic_parms.selection_strategy {
            SelectionStrategy::NoSelection | SelectionStrategy::NoGeneration => {}
            SelectionStrategy::SelectFirstNegative => {
                if let Some(literal) = clause.literals.iter_mut().find(|l| !l.positive) {
                    literal.selected = true;
                }
            }
            SelectionStrategy::SelectLargestNegative => {
                let largest = clause
                    .literals
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| !l.positive)
                    .max_by_key(|(_, l)| l.standard_weight())
                    .map(|(i, _)| i);
                if let Some(i) = largest {
                    clause.literals[i].selected = true;
                }
            }
        }
    }

    /// Picks the best unprocessed clause without extracting it. Most picks go
    /// by evaluation; every age_weight_ratio-th pick takes the oldest clause,
    /// so heavy clauses cannot starve forever.
    pub fn hcb_select(&mut self, arena: &ClauseArena, unprocessed: &ClauseSet) -> Option<StepId> {
        if unprocessed.is_empty() {
            return None;
        }
        self.picks += 1;
        let by_age =
            self.fifo || (self.age_weight_ratio > 0 && self.picks % (self.age_weight_ratio + 1) == 0);
        let mut best: Option<StepId> = None;
        for &id in unprocessed.iter() {
            let step = arena.get(id);
            let better = match best {
                None => true,
                Some(best_id) => {
                    let best_step = arena.get(best_id);
                    if by_age {
                        (step.create_date, step.id) < (best_step.create_date, best_step.id)
                    } else {
                        let eval = step.eval.expect("unprocessed clause missing evaluation");
                        let best_eval =
                            best_step.eval.expect("unprocessed clause missing evaluation");
                        (eval.priority, eval.weight, step.id)
                            < (best_eval.priority, best_eval.weight, best_step.id)
                    }
                }
            };
            if better {
                best = Some(id);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Clause;
    use crate::proof_step::SetKind;

    #[test]
    fn test_select_prefers_light_clauses() {
        let mut arena = ClauseArena::new();
        let mut unprocessed = ClauseSet::new(SetKind::Unprocessed);
        let mut control = ProofControl::default();

        let heavy = arena.new_assumption(Clause::parse("c0(c1(c2(c3(c4))))"));
        let light = arena.new_assumption(Clause::parse("c0(c1)"));
        for id in [heavy, light] {
            let eval = control.evaluate(arena.get(id));
            arena.get_mut(id).eval = Some(eval);
            unprocessed.insert(&mut arena, id);
        }
        assert_eq!(control.hcb_select(&arena, &unprocessed), Some(light));
    }

    #[test]
    fn test_select_on_empty_returns_none() {
        let arena = ClauseArena::new();
        let unprocessed = ClauseSet::new(SetKind::Unprocessed);
        let mut control = ProofControl::default();
        assert_eq!(control.hcb_select(&arena, &unprocessed), None);
    }

    #[test]
    fn test_age_picks_interleave() {
        let mut arena = ClauseArena::new();
        let mut unprocessed = ClauseSet::new(SetKind::Unprocessed);
        let mut control = ProofControl::default();

        // The old clause is heavy, the new one light.
        let old = arena.new_assumption(Clause::parse("c0(c1(c2(c3)))"));
        arena.get_mut(old).create_date = 0;
        let new = arena.new_assumption(Clause::parse("c0(c1)"));
        arena.get_mut(new).create_date = 10;
        for id in [old, new] {
            let eval = control.evaluate(arena.get(id));
            arena.get_mut(id).eval = Some(eval);
            unprocessed.insert(&mut arena, id);
        }

        let mut picked_old = false;
        for _ in 0..6 {
            if control.hcb_select(&arena, &unprocessed) == Some(old) {
                picked_old = true;
            }
        }
        assert!(picked_old);
    }

}
