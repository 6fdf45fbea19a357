use clap::ValueEnum;
use serde::Serialize;

/// How the query builder compensates for incomplete state merging in the
/// verification oracle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ValueEnum)]
pub enum ConsolidationMode {
    /// No consolidation.
    #[default]
    Off,
    /// Fold all held predicates, pass a consolidation point, unfold again.
    Fold,
    /// Assume pairwise disjointness facts implied by separating conjuncts.
    Assume,
}

/// Granularity of basic-query verification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ValueEnum)]
pub enum BatchMode {
    /// One query covering all checks.
    #[default]
    Together,
    /// One query per check.
    PerCheck,
}

/// All knobs of the inference pipeline, read once at startup.
#[derive(Clone, Debug, Serialize)]
pub struct InferenceConfig {
    /// Maximum number of template escalations before giving up.
    pub max_escalations: usize,
    /// Reset the escalation level after each accepted hypothesis.
    pub de_escalate: bool,
    /// Predicate unfolding depth after an inhale.
    pub unfold_depth: usize,
    /// Predicate folding depth before an exhale.
    pub fold_depth: usize,
    /// Recursion depth when evaluating permission deltas during extraction.
    pub extract_depth: usize,
    /// Branch on pairwise aliasing of collected reference accesses.
    pub branching: bool,
    pub consolidation: ConsolidationMode,
    pub batch: BatchMode,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_escalations: 3,
            de_escalate: false,
            unfold_depth: 1,
            fold_depth: 1,
            extract_depth: 2,
            branching: false,
            consolidation: ConsolidationMode::Off,
            batch: BatchMode::Together,
        }
    }
}
