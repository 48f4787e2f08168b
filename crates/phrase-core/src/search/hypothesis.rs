//! Hypothesis arena.
//!
//! Hypotheses form a DAG: every node points back to the node it extends, and a
//! recombination winner may keep the losers as alternative arcs. Nodes live in
//! slots of a per-sentence arena addressed by [`HypId`]. Slots are never
//! reused; each carries a count of its holders (children, stacks, arc lists)
//! and its payload is freed as soon as the count drops to zero.

use std::cmp::Ordering;
use std::ops::Index;

use tracing::trace;

use crate::coverage::{BitmapId, BitmapPool, CoverageBitmap};
use crate::feature::{distortion_distance, ExtensionContext, BOS};
use crate::options::{OptionId, Span};

use super::stats::SearchStats;
use super::ScoringScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HypId(u32);

impl HypId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// State that decides whether two hypotheses can be merged: everything any
/// future extension can observe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecombinationKey {
    pub coverage: BitmapId,
    pub last_end: Option<usize>,
    pub context: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Hypothesis {
    prev: Option<HypId>,
    option: Option<OptionId>,
    coverage: BitmapId,
    words_covered: usize,
    last_end: Option<usize>,
    /// Trailing target words, at most the feature set's context order.
    context: Vec<String>,
    score: f32,
    future: f32,
    arcs: Vec<HypId>,
}

impl Hypothesis {
    pub fn prev(&self) -> Option<HypId> {
        self.prev
    }

    /// The option applied to reach this node; `None` for the root.
    pub fn option(&self) -> Option<OptionId> {
        self.option
    }

    pub fn coverage(&self) -> BitmapId {
        self.coverage
    }

    pub fn words_covered(&self) -> usize {
        self.words_covered
    }

    pub fn last_end(&self) -> Option<usize> {
        self.last_end
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Accumulated score of the applied options.
    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn future_score(&self) -> f32 {
        self.future
    }

    pub fn estimated_total(&self) -> f32 {
        self.score + self.future
    }

    /// Recombination losers, kept when n-best output is enabled.
    pub fn arcs(&self) -> &[HypId] {
        &self.arcs
    }

    pub fn recombination_key(&self) -> RecombinationKey {
        RecombinationKey {
            coverage: self.coverage,
            last_end: self.last_end,
            context: self.context.clone(),
        }
    }

    pub fn same_state(&self, other: &Hypothesis) -> bool {
        self.coverage == other.coverage
            && self.last_end == other.last_end
            && self.context == other.context
    }

    /// Stack order: estimated total descending, then recombination key
    /// ascending.
    pub fn rank(&self, other: &Hypothesis) -> Ordering {
        other
            .estimated_total()
            .total_cmp(&self.estimated_total())
            .then_with(|| self.coverage.cmp(&other.coverage))
            .then_with(|| self.last_end.cmp(&other.last_end))
            .then_with(|| self.context.cmp(&other.context))
    }
}

/// Whether `span` may be translated next under `limit`.
///
/// The jump from the previous span must be within the limit, and when `span`
/// leaves a gap to its left the jump back from its end to that gap must be too.
pub fn reordering_allowed(
    bitmap: &CoverageBitmap,
    last_end: Option<usize>,
    span: Span,
    limit: Option<usize>,
) -> bool {
    let Some(limit) = limit else {
        return true;
    };
    distortion_distance(last_end, span.start) <= limit && gap_reachable(bitmap, span, limit)
}

/// The part of [`reordering_allowed`] that depends on coverage alone.
pub fn gap_reachable(bitmap: &CoverageBitmap, span: Span, limit: usize) -> bool {
    match bitmap.first_gap() {
        Some(gap) if gap != span.start => (span.end + 1).abs_diff(gap) <= limit,
        _ => true,
    }
}

struct Slot {
    hyp: Option<Hypothesis>,
    refs: u32,
}

pub struct HypothesisGraph {
    slots: Vec<Slot>,
    keep_arcs: bool,
    context_order: usize,
    stats: SearchStats,
}

impl HypothesisGraph {
    pub fn new(keep_arcs: bool, context_order: usize) -> Self {
        Self {
            slots: Vec::new(),
            keep_arcs,
            context_order,
            stats: SearchStats::default(),
        }
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut SearchStats {
        &mut self.stats
    }

    /// Empty hypothesis. The returned id carries one reference.
    pub fn root(&mut self, coverage: BitmapId, future: f32) -> HypId {
        let context = if self.context_order > 0 {
            vec![BOS.to_string()]
        } else {
            Vec::new()
        };
        self.alloc(Hypothesis {
            prev: None,
            option: None,
            coverage,
            words_covered: 0,
            last_end: None,
            context,
            score: 0.0,
            future,
            arcs: Vec::new(),
        })
    }

    /// Store `hyp`, taking a reference on its parent. The returned id
    /// carries one reference owned by the caller.
    fn alloc(&mut self, hyp: Hypothesis) -> HypId {
        if let Some(prev) = hyp.prev {
            self.retain(prev);
        }
        let id = HypId(self.slots.len() as u32);
        self.slots.push(Slot {
            hyp: Some(hyp),
            refs: 1,
        });
        self.stats.created += 1;
        id
    }

    pub fn retain(&mut self, id: HypId) {
        self.slots[id.index()].refs += 1;
    }

    /// Drop one reference; frees the node, and transitively its parent and
    /// arcs, when none remain.
    pub fn release(&mut self, id: HypId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let slot = &mut self.slots[id.index()];
            debug_assert!(slot.refs > 0, "release of unreferenced {id:?}");
            slot.refs = slot.refs.saturating_sub(1);
            if slot.refs > 0 {
                continue;
            }
            if let Some(hyp) = slot.hyp.take() {
                self.stats.reclaimed += 1;
                pending.extend(hyp.prev);
                pending.extend(hyp.arcs);
            }
        }
    }

    /// Release a hypothesis refused at stack insertion.
    pub fn discard(&mut self, id: HypId) {
        self.stats.discarded += 1;
        self.release(id);
    }

    /// Release a hypothesis removed by pruning.
    pub fn prune(&mut self, id: HypId) {
        self.stats.pruned += 1;
        self.release(id);
    }

    pub fn get(&self, id: HypId) -> Option<&Hypothesis> {
        self.slots.get(id.index()).and_then(|s| s.hyp.as_ref())
    }

    #[cfg(test)]
    pub fn is_live(&self, id: HypId) -> bool {
        self.get(id).is_some()
    }

    #[cfg(test)]
    pub fn ref_count(&self, id: HypId) -> u32 {
        self.slots.get(id.index()).map_or(0, |s| s.refs)
    }

    fn hyp_mut(&mut self, id: HypId) -> &mut Hypothesis {
        match self.slots[id.index()].hyp.as_mut() {
            Some(hyp) => hyp,
            None => panic!("hypothesis {id:?} was reclaimed"),
        }
    }

    /// Apply `option` to `parent`.
    ///
    /// Returns `None` when the span overlaps the parent's coverage, breaks the
    /// distortion limit, or the result cannot score above `-inf`.
    pub fn expand(
        &mut self,
        pool: &mut BitmapPool,
        scope: &ScoringScope<'_>,
        parent: HypId,
        option_id: OptionId,
    ) -> Option<HypId> {
        let (coverage, last_end, parent_score) = {
            let p = &self[parent];
            (p.coverage, p.last_end, p.score)
        };
        let option = scope.options.get(option_id);
        let span = option.span;

        let allowed = {
            let bitmap = pool.get(coverage);
            !bitmap.overlaps(span)
                && reordering_allowed(bitmap, last_end, span, scope.distortion_limit)
        };
        let next = if allowed {
            pool.transition(coverage, span)
        } else {
            None
        };
        let Some(next) = next else {
            self.stats.rejected += 1;
            return None;
        };

        let next_bitmap = pool.get(next);
        let future = scope.future.score(next_bitmap);
        let parent_hyp = &self[parent];
        let ctx = ExtensionContext {
            source_len: scope.options.source_len(),
            prev_end: last_end,
            option,
            history: &parent_hyp.context,
            completes: next_bitmap.is_complete(),
        };
        let score = parent_score + scope.features.incremental_score(&ctx);
        if score.is_nan() || score == f32::NEG_INFINITY || future == f32::NEG_INFINITY {
            self.stats.rejected += 1;
            return None;
        }
        let context = extend_context(&parent_hyp.context, &option.target, self.context_order);
        let words_covered = next_bitmap.words_covered();

        Some(self.alloc(Hypothesis {
            prev: Some(parent),
            option: Some(option_id),
            coverage: next,
            words_covered,
            last_end: Some(span.end),
            context,
            score,
            future,
            arcs: Vec::new(),
        }))
    }

    /// Merge two hypotheses with the same recombination key.
    ///
    /// Both ids carry a reference owned by the caller; the returned winner
    /// keeps one of them. The higher estimated total wins and ties keep
    /// `existing`. With arcs enabled the loser and its own arcs move to the
    /// winner's arc list, otherwise the loser is released.
    pub fn recombine(&mut self, existing: HypId, incoming: HypId) -> HypId {
        debug_assert!(self[existing].same_state(&self[incoming]));
        self.stats.recombined += 1;
        let (winner, loser) =
            if self[incoming].estimated_total() > self[existing].estimated_total() {
                (incoming, existing)
            } else {
                (existing, incoming)
            };
        trace!(?winner, ?loser, "recombined");

        if self.keep_arcs {
            let inherited = std::mem::take(&mut self.hyp_mut(loser).arcs);
            let arcs = &mut self.hyp_mut(winner).arcs;
            arcs.push(loser);
            arcs.extend(inherited);
        } else {
            self.release(loser);
        }
        winner
    }

    /// Keep the `n` best arcs of `id`, releasing the rest.
    pub fn cleanup_arcs(&mut self, id: HypId, n: usize) {
        if self[id].arcs.len() <= n {
            return;
        }
        let mut arcs = std::mem::take(&mut self.hyp_mut(id).arcs);
        arcs.sort_by(|a, b| {
            self[*b]
                .score
                .total_cmp(&self[*a].score)
                .then_with(|| a.cmp(b))
        });
        let dropped = arcs.split_off(n);
        self.hyp_mut(id).arcs = arcs;
        for arc in dropped {
            self.release(arc);
        }
    }

    /// Nodes from the first extension to `leaf`, root excluded.
    pub fn path(&self, leaf: HypId) -> Vec<HypId> {
        let mut nodes = Vec::new();
        let mut cursor = Some(leaf);
        while let Some(id) = cursor {
            let hyp = &self[id];
            if hyp.option.is_none() {
                break;
            }
            nodes.push(id);
            cursor = hyp.prev;
        }
        nodes.reverse();
        nodes
    }

    #[cfg(test)]
    pub(crate) fn synthetic(
        &mut self,
        prev: Option<HypId>,
        coverage: BitmapId,
        last_end: Option<usize>,
        score: f32,
    ) -> HypId {
        let words_covered = prev.map_or(0, |p| self[p].words_covered + 1);
        self.alloc(Hypothesis {
            prev,
            option: None,
            coverage,
            words_covered,
            last_end,
            context: Vec::new(),
            score,
            future: 0.0,
            arcs: Vec::new(),
        })
    }
}

impl Index<HypId> for HypothesisGraph {
    type Output = Hypothesis;

    fn index(&self, id: HypId) -> &Hypothesis {
        match self.get(id) {
            Some(hyp) => hyp,
            None => panic!("hypothesis {id:?} was reclaimed"),
        }
    }
}

fn extend_context(parent: &[String], target: &[String], order: usize) -> Vec<String> {
    if order == 0 {
        return Vec::new();
    }
    let total = parent.len() + target.len();
    let skip = total.saturating_sub(order);
    parent
        .iter()
        .chain(target)
        .skip(skip)
        .cloned()
        .collect()
}
