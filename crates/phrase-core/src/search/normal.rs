use tracing::{debug, debug_span, trace};

use crate::coverage::BitmapPool;
use crate::options::Span;
use crate::settings::Settings;

use super::hypothesis::{reordering_allowed, HypId, HypothesisGraph};
use super::stack::HistogramStack;
use super::{Budget, ScoringScope, SearchOutcome};

/// Histogram/beam search: one stack per number of covered words, processed
/// in increasing order. Every hypothesis of a stack is expanded with every
/// admissible option before the next stack is touched.
pub(super) fn search(settings: &Settings, scope: &ScoringScope<'_>, budget: &Budget) -> SearchOutcome {
    let n = scope.options.source_len();
    let mut pool = BitmapPool::new(n);
    let mut graph = HypothesisGraph::new(settings.nbest.enabled, scope.features.context_order());
    let mut stacks: Vec<HistogramStack> = (0..=n)
        .map(|_| HistogramStack::from_settings(&settings.search))
        .collect();

    let root = graph.root(pool.empty(), scope.future.full_sentence());
    stacks[0].add_prune(&mut graph, root);

    let mut interrupted = false;
    'buckets: for bucket in 0..n {
        let _span = debug_span!("bucket", bucket).entered();
        let (done, pending) = stacks.split_at_mut(bucket + 1);
        let stack = &mut done[bucket];
        finalize(stack, &mut graph, settings);
        debug!(size = stack.len(), best = stack.best_score(), "expanding stack");

        for id in stack.sorted(&graph) {
            if budget.exhausted(graph.stats()) {
                debug!("budget exhausted");
                interrupted = true;
                break 'buckets;
            }
            let mut expansion = Expansion {
                graph: &mut graph,
                pool: &mut pool,
                scope,
                pending: &mut *pending,
                bucket,
                early_discarding: settings.search.early_discarding(),
            };
            expansion.expand(id);
        }
        stack.release_all(&mut graph);
    }

    // Earlier stacks still hold references when the search was cut short.
    for stack in &mut stacks[..n] {
        stack.release_all(&mut graph);
    }
    let last = &mut stacks[n];
    finalize(last, &mut graph, settings);
    let finals = last.take_sorted(&graph);
    debug!(bitmaps = pool.len(), complete = finals.len(), "normal search done");
    SearchOutcome {
        graph,
        finals,
        interrupted,
    }
}

/// Prune a stack before it is expanded or read out.
pub(super) fn finalize(stack: &mut HistogramStack, graph: &mut HypothesisGraph, settings: &Settings) {
    stack.prune_to_size(graph, settings.search.stack_size);
    if settings.nbest.enabled {
        stack.cleanup_arcs(graph, settings.nbest.size);
    }
    graph.stats_mut().stack_sizes.push(stack.len());
}

/// Everything needed to expand the hypotheses of one bucket into the
/// stacks after it.
struct Expansion<'s, 'a> {
    graph: &'s mut HypothesisGraph,
    pool: &'s mut BitmapPool,
    scope: &'s ScoringScope<'a>,
    /// Stacks of buckets `bucket + 1 ..= n`.
    pending: &'s mut [HistogramStack],
    bucket: usize,
    early_discarding: Option<f32>,
}

impl Expansion<'_, '_> {
    /// Apply every admissible option to `id` and insert the children into
    /// their stacks.
    fn expand(&mut self, id: HypId) {
        let scope = self.scope;
        let coverage = self.graph[id].coverage();
        let last_end = self.graph[id].last_end();
        let n = scope.options.source_len();
        let Some(first_gap) = self.pool.get(coverage).first_gap() else {
            return;
        };
        let expected = last_end.map_or(0, |end| end + 1);

        for start in first_gap..n {
            if scope
                .distortion_limit
                .is_some_and(|limit| start > expected + limit)
            {
                break;
            }
            if self.pool.get(coverage).is_set(start) {
                continue;
            }
            for &end in scope.options.ends_from(start) {
                let span = Span::new(start, end);
                let bitmap = self.pool.get(coverage);
                if bitmap.overlaps(span) {
                    break;
                }
                if !reordering_allowed(bitmap, last_end, span, scope.distortion_limit) {
                    continue;
                }
                self.expand_span(id, span);
            }
        }
    }

    fn expand_span(&mut self, id: HypId, span: Span) {
        let scope = self.scope;
        let stack = self.bucket_of(id, span);
        // Parent score plus the estimate of what stays uncovered.
        let base = self.early_discarding.map(|_| {
            let parent = &self.graph[id];
            parent.score() + scope.future.score_with(self.pool.get(parent.coverage()), span)
        });

        for option in scope.options.ids_for(span) {
            if let (Some(base), Some(threshold)) = (base, self.early_discarding) {
                let expected = base + scope.options.get(option).future_score();
                let allowed = self.pending[stack].worst_score() + threshold;
                if expected < allowed {
                    trace!(?id, ?option, expected, allowed, "early discarded");
                    self.graph.stats_mut().early_discarded += 1;
                    continue;
                }
            }
            if let Some(child) = self.graph.expand(self.pool, scope, id, option) {
                self.pending[stack].add_prune(self.graph, child);
            }
        }
    }

    /// Index into `pending` of the stack that children covering `span`
    /// land in.
    fn bucket_of(&self, id: HypId, span: Span) -> usize {
        self.graph[id].words_covered() + span.len() - self.bucket - 1
    }
}
