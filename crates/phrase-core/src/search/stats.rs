use serde::Serialize;

/// Counters collected during one decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Hypotheses allocated, including the root.
    pub created: usize,
    /// Expansions refused (overlap, distortion limit, `-inf` score).
    pub rejected: usize,
    /// Hypotheses dropped on stack insertion (below the stack threshold).
    pub discarded: usize,
    /// Expansions skipped before scoring by early discarding.
    pub early_discarded: usize,
    /// Recombination events.
    pub recombined: usize,
    /// Hypotheses removed by histogram or beam pruning.
    pub pruned: usize,
    /// Arena slots whose payload was freed before the end of the decode.
    pub reclaimed: usize,
    /// Stack size per coverage bucket after pruning.
    pub stack_sizes: Vec<usize>,
    pub cube_pops: usize,
    /// Grid cells scored by cube frontiers.
    pub cube_materialized: usize,
}
