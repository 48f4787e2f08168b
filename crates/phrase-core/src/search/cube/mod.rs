//! Cube pruning.
//!
//! Hypotheses of a finished bucket are grouped by coverage bitmap. Each
//! group and each reachable span form a backwards edge into the container of
//! the resulting bitmap. A bucket is then filled by popping the best
//! (hypothesis, option) pairs across all of its containers, up to the pop
//! limit; only popped pairs are scored.

mod container;
pub(crate) mod frontier;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::rc::Rc;

use tracing::{debug, debug_span, trace};

use crate::coverage::{BitmapId, BitmapPool, CoverageBitmap};
use crate::options::Span;
use crate::settings::Settings;

use super::hypothesis::{gap_reachable, HypId, HypothesisGraph};
use super::normal::finalize;
use super::stack::HistogramStack;
use super::{Budget, ScoringScope, SearchOutcome};

use container::{BackwardsEdge, BitmapContainer, Pop};

type Containers = BTreeMap<BitmapId, BitmapContainer>;

#[derive(Debug, Clone, Copy)]
struct ContainerHead {
    score: f32,
    bitmap: BitmapId,
    deterministic: bool,
}

impl PartialEq for ContainerHead {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ContainerHead {}

impl PartialOrd for ContainerHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContainerHead {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_score = self.score.total_cmp(&other.score);
        if self.deterministic {
            by_score.then_with(|| other.bitmap.cmp(&self.bitmap))
        } else {
            by_score
        }
    }
}

pub(super) fn search(settings: &Settings, scope: &ScoringScope<'_>, budget: &Budget) -> SearchOutcome {
    let n = scope.options.source_len();
    let mut pool = BitmapPool::new(n);
    let mut graph = HypothesisGraph::new(settings.nbest.enabled, scope.features.context_order());
    let mut stacks: Vec<HistogramStack> = (0..=n)
        .map(|_| HistogramStack::from_settings(&settings.search))
        .collect();
    let mut containers: Vec<Containers> = (0..=n).map(|_| Containers::new()).collect();

    let root = graph.root(pool.empty(), scope.future.full_sentence());
    stacks[0].add_prune(&mut graph, root);

    // A stack is referenced by edges into buckets at most this far ahead.
    let reach = scope.options.spans().map(|s| s.len()).max().unwrap_or(1);
    let mut released = 0;
    let mut interrupted = false;

    for bucket in 0..=n {
        let _span = debug_span!("bucket", bucket).entered();
        let mut incoming = std::mem::take(&mut containers[bucket]);
        if !incoming.is_empty() {
            interrupted = fill_stack(
                &mut incoming,
                &mut stacks[bucket],
                &mut graph,
                &mut pool,
                scope,
                settings,
                budget,
            );
            let materialized: usize = incoming.values().map(|c| c.materialized()).sum();
            graph.stats_mut().cube_materialized += materialized;
        }
        finalize(&mut stacks[bucket], &mut graph, settings);
        debug!(
            size = stacks[bucket].len(),
            containers = incoming.len(),
            "stack filled"
        );
        drop(incoming);
        if interrupted {
            break;
        }

        if bucket < n {
            create_forward_todos(
                &stacks[bucket],
                &graph,
                &mut pool,
                scope,
                &mut containers,
                settings.cube.deterministic,
            );
        }
        while released < bucket && released + reach <= bucket {
            stacks[released].release_all(&mut graph);
            released += 1;
        }
    }

    for stack in &mut stacks[released..n] {
        stack.release_all(&mut graph);
    }
    let finals = stacks[n].take_sorted(&graph);
    SearchOutcome {
        graph,
        finals,
        interrupted,
    }
}

/// Pop the best pairs of every container into `stack`. Returns `true` if the
/// budget ran out.
fn fill_stack(
    containers: &mut Containers,
    stack: &mut HistogramStack,
    graph: &mut HypothesisGraph,
    pool: &mut BitmapPool,
    scope: &ScoringScope<'_>,
    settings: &Settings,
    budget: &Budget,
) -> bool {
    let deterministic = settings.cube.deterministic;
    let mut queue = BinaryHeap::new();
    for (&bitmap, container) in containers.iter_mut() {
        container.initialize_edges();
        trace!(?bitmap, edges = container.edge_count(), "container ready");
        if let Some(score) = container.top_score() {
            queue.push(ContainerHead {
                score,
                bitmap,
                deterministic,
            });
        }
    }

    let mut pops = 0;
    while pops < settings.cube.pop_limit {
        let Some(head) = queue.pop() else {
            break;
        };
        let Some(container) = containers.get_mut(&head.bitmap) else {
            continue;
        };
        if budget.exhausted(graph.stats()) {
            return true;
        }
        if let Some(pop) = container.pop_best() {
            pops += 1;
            process(pop, container, stack, graph, pool, scope);
        }
        if let Some(score) = container.top_score() {
            queue.push(ContainerHead {
                score,
                bitmap: head.bitmap,
                deterministic,
            });
        }
    }
    trace!(pops, "pop loop done");

    // Minimum number of stack insertions per container.
    let diversity = settings.cube.diversity;
    if diversity > 0 {
        for container in containers.values_mut() {
            while container.insertions() < diversity {
                if budget.exhausted(graph.stats()) {
                    return true;
                }
                let Some(pop) = container.pop_best() else {
                    break;
                };
                process(pop, container, stack, graph, pool, scope);
            }
        }
    }
    false
}

fn process(
    pop: Pop,
    container: &mut BitmapContainer,
    stack: &mut HistogramStack,
    graph: &mut HypothesisGraph,
    pool: &mut BitmapPool,
    scope: &ScoringScope<'_>,
) {
    graph.stats_mut().cube_pops += 1;
    trace!(parent = ?pop.parent, option = ?pop.option, estimate = pop.estimate, "pop");
    let Some(child) = graph.expand(pool, scope, pop.parent, pop.option) else {
        return;
    };
    debug_assert_eq!(graph[child].coverage(), container.bitmap());
    if stack.add_prune(graph, child) {
        container.record_insertion();
    }
}

/// Build the edges leaving every coverage group of `stack`.
fn create_forward_todos(
    stack: &HistogramStack,
    graph: &HypothesisGraph,
    pool: &mut BitmapPool,
    scope: &ScoringScope<'_>,
    containers: &mut [Containers],
    deterministic: bool,
) {
    let mut groups: BTreeMap<BitmapId, Vec<HypId>> = BTreeMap::new();
    for id in stack.sorted(graph) {
        groups.entry(graph[id].coverage()).or_default().push(id);
    }

    for (coverage, hyps) in groups {
        // Same coverage means same future cost, so rank order is score order.
        let scores: Vec<f32> = hyps.iter().map(|&h| graph[h].score()).collect();
        let hyps: Rc<[HypId]> = hyps.into();
        for span in candidate_spans(pool.get(coverage), scope) {
            let Some(target) = pool.transition(coverage, span) else {
                continue;
            };
            let future = scope.future.score_with(pool.get(coverage), span);
            if future == f32::NEG_INFINITY {
                continue;
            }
            let options: Vec<_> = scope.options.ids_for(span).collect();
            let option_scores = options
                .iter()
                .map(|&o| scope.options.get(o).future_score())
                .collect();
            let words = pool.get(target).words_covered();
            containers[words]
                .entry(target)
                .or_insert_with(|| BitmapContainer::new(target, deterministic))
                .add_edge(BackwardsEdge::new(
                    Rc::clone(&hyps),
                    scores.clone(),
                    options,
                    option_scores,
                    future,
                ));
        }
    }
}

/// Spans with options that fit into `bitmap` and keep the first gap
/// reachable. The jump from each hypothesis' last span is checked when a
/// pair is popped.
fn candidate_spans(bitmap: &CoverageBitmap, scope: &ScoringScope<'_>) -> Vec<Span> {
    let mut spans = Vec::new();
    for start in bitmap.gaps().flat_map(|gap| gap.start..=gap.end) {
        for &end in scope.options.ends_from(start) {
            let span = Span::new(start, end);
            if bitmap.overlaps(span) {
                break;
            }
            if scope
                .distortion_limit
                .is_some_and(|limit| !gap_reachable(bitmap, span, limit))
            {
                continue;
            }
            spans.push(span);
        }
    }
    spans
}
