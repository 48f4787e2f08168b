use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::coverage::BitmapId;
use crate::settings::SearchSettings;

use super::hypothesis::{HypId, HypothesisGraph, RecombinationKey};

/// Histogram/beam stack for one coverage-count bucket.
///
/// Holds one reference on every hypothesis it contains. Pruning is lazy:
/// the stack may grow to twice its nominal size before it is cut back.
pub struct HistogramStack {
    max_size: usize,
    beam_width: f32,
    diversity: usize,
    entries: HashMap<RecombinationKey, HypId>,
    best_score: f32,
    /// Anything scoring below this is refused on insertion.
    worst_score: f32,
}

impl HistogramStack {
    pub fn new(max_size: usize, beam_width: f32, diversity: usize) -> Self {
        Self {
            max_size: max_size.max(1),
            beam_width,
            diversity,
            entries: HashMap::new(),
            best_score: f32::NEG_INFINITY,
            worst_score: f32::NEG_INFINITY,
        }
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self::new(
            settings.stack_size,
            settings.beam_width,
            settings.stack_diversity,
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn best_score(&self) -> f32 {
        self.best_score
    }

    /// Insertion threshold: anything scoring below it is refused.
    pub fn worst_score(&self) -> f32 {
        self.worst_score
    }

    /// Insert `id`, taking over the caller's reference.
    ///
    /// Returns `true` when `id` ends up in the stack, either as a new entry
    /// or as the winner of a recombination.
    pub fn add_prune(&mut self, graph: &mut HypothesisGraph, id: HypId) -> bool {
        let total = graph[id].estimated_total();
        if total.is_nan() || total == f32::NEG_INFINITY || total < self.worst_score {
            trace!(?id, total, worst = self.worst_score, "discarded");
            graph.discard(id);
            return false;
        }

        let inserted = match self.entries.entry(graph[id].recombination_key()) {
            Entry::Occupied(mut slot) => {
                let winner = graph.recombine(*slot.get(), id);
                slot.insert(winner);
                winner == id
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        };

        if total > self.best_score {
            self.best_score = total;
            self.worst_score = self.worst_score.max(total - self.beam_width);
        }
        if self.entries.len() > 2 * self.max_size {
            self.prune_to_size(graph, self.max_size);
        }
        inserted
    }

    /// Apply the beam, then keep the `n` best (plus any hypotheses reserved
    /// by stack diversity). Dropped hypotheses are released.
    pub fn prune_to_size(&mut self, graph: &mut HypothesisGraph, n: usize) {
        let threshold = self.best_score - self.beam_width;
        let mut candidates = Vec::with_capacity(self.entries.len());
        for (key, id) in self.entries.drain() {
            if graph[id].estimated_total() < threshold {
                trace!(?id, "beam pruned");
                graph.prune(id);
            } else {
                candidates.push((key, id));
            }
        }

        let (reserved, mut rest) = if self.diversity > 0 {
            self.reserve_per_coverage(graph, candidates)
        } else {
            (Vec::new(), candidates)
        };

        let room = n.saturating_sub(reserved.len());
        let cut = rest.len() > room;
        if cut {
            if room > 0 {
                rest.select_nth_unstable_by(room - 1, |a, b| graph[a.1].rank(&graph[b.1]));
            }
            for (_, id) in rest.drain(room..) {
                trace!(?id, "histogram pruned");
                graph.prune(id);
            }
        }

        self.entries = reserved.into_iter().chain(rest).collect();
        if cut && self.diversity == 0 {
            let lowest = self
                .entries
                .values()
                .map(|&id| graph[id].estimated_total())
                .fold(f32::INFINITY, f32::min);
            if lowest.is_finite() {
                self.worst_score = self.worst_score.max(lowest);
            }
        }
    }

    /// Split off the `diversity` best hypotheses of every coverage bitmap.
    fn reserve_per_coverage(
        &self,
        graph: &HypothesisGraph,
        candidates: Vec<(RecombinationKey, HypId)>,
    ) -> (
        Vec<(RecombinationKey, HypId)>,
        Vec<(RecombinationKey, HypId)>,
    ) {
        let mut groups: BTreeMap<BitmapId, Vec<(RecombinationKey, HypId)>> = BTreeMap::new();
        for entry in candidates {
            groups.entry(entry.0.coverage).or_default().push(entry);
        }
        let mut reserved = Vec::new();
        let mut rest = Vec::new();
        for (_, mut group) in groups {
            group.sort_by(|a, b| graph[a.1].rank(&graph[b.1]));
            let keep = group.len().min(self.diversity);
            rest.extend(group.drain(keep..));
            reserved.extend(group);
        }
        (reserved, rest)
    }

    /// Contained hypotheses, best first.
    pub fn sorted(&self, graph: &HypothesisGraph) -> Vec<HypId> {
        let mut ids: Vec<HypId> = self.entries.values().copied().collect();
        ids.sort_by(|a, b| graph[*a].rank(&graph[*b]));
        ids
    }

    /// Empty the stack, handing its references to the caller, best first.
    pub fn take_sorted(&mut self, graph: &HypothesisGraph) -> Vec<HypId> {
        let ids = self.sorted(graph);
        self.entries.clear();
        ids
    }

    /// Drop every reference the stack holds.
    pub fn release_all(&mut self, graph: &mut HypothesisGraph) {
        for (_, id) in self.entries.drain() {
            graph.release(id);
        }
    }

    pub fn cleanup_arcs(&self, graph: &mut HypothesisGraph, n: usize) {
        for &id in self.entries.values() {
            graph.cleanup_arcs(id, n);
        }
    }
}
