use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::options::{OptionTable, Span};

use super::hypothesis::{HypId, HypothesisGraph};
use super::stats::SearchStats;
use super::SearchOutcome;

/// One applied phrase pair of a translation, in target order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub source: Span,
    pub target: Vec<String>,
    /// Position of the first target word in the full translation.
    pub target_start: usize,
    /// Phrase-internal `(source offset, target offset)` pairs.
    pub alignment: Vec<(usize, usize)>,
}

/// A complete translation and its model score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationPath {
    pub segments: Vec<Segment>,
    pub score: f32,
}

impl TranslationPath {
    pub fn target_tokens(&self) -> Vec<String> {
        self.segments
            .iter()
            .flat_map(|s| s.target.iter().cloned())
            .collect()
    }

    pub fn target_text(&self) -> String {
        self.target_tokens().join(" ")
    }

    /// Sentence-level `(source position, target position)` pairs.
    pub fn word_alignment(&self) -> Vec<(usize, usize)> {
        self.segments
            .iter()
            .flat_map(|s| {
                s.alignment
                    .iter()
                    .map(move |&(src, tgt)| (s.source.start + src, s.target_start + tgt))
            })
            .collect()
    }
}

/// Result of a successful decode.
///
/// Owns the hypothesis arena, so alternatives can be enumerated for as long
/// as the derivation lives.
pub struct Derivation {
    graph: HypothesisGraph,
    options: Arc<OptionTable>,
    /// Complete hypotheses, best first.
    finals: Vec<HypId>,
    interrupted: bool,
    distinct: bool,
}

impl Derivation {
    pub(crate) fn new(outcome: SearchOutcome, options: Arc<OptionTable>, distinct: bool) -> Self {
        Self {
            graph: outcome.graph,
            options,
            finals: outcome.finals,
            interrupted: outcome.interrupted,
            distinct,
        }
    }

    fn best_id(&self) -> HypId {
        self.finals[0]
    }

    pub fn score(&self) -> f32 {
        self.graph[self.best_id()].score()
    }

    pub fn best(&self) -> TranslationPath {
        let nodes = self.graph.path(self.best_id());
        self.translation(&nodes, self.score())
    }

    pub fn target_tokens(&self) -> Vec<String> {
        self.best().target_tokens()
    }

    pub fn target_text(&self) -> String {
        self.best().target_text()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.best().segments
    }

    pub fn word_alignment(&self) -> Vec<(usize, usize)> {
        self.best().word_alignment()
    }

    /// True when the search stopped on its budget and this is the best
    /// complete translation found until then.
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn stats(&self) -> &SearchStats {
        self.graph.stats()
    }

    /// Number of complete hypotheses left in the final stack.
    pub fn complete_hypotheses(&self) -> usize {
        self.finals.len()
    }

    /// Translations in non-increasing score order, starting with the best.
    ///
    /// Alternatives come from the other complete hypotheses and, when n-best
    /// output was enabled, from recombination arcs. Each call starts a fresh
    /// enumeration.
    pub fn alternatives(&self) -> Alternatives<'_> {
        Alternatives::new(self)
    }

    pub(crate) fn graph(&self) -> &HypothesisGraph {
        &self.graph
    }

    pub(crate) fn options(&self) -> &OptionTable {
        &self.options
    }

    /// `nodes` runs from the first extension to the leaf.
    fn translation(&self, nodes: &[HypId], score: f32) -> TranslationPath {
        let mut segments = Vec::with_capacity(nodes.len());
        let mut target_start = 0;
        for &id in nodes {
            let Some(option_id) = self.graph[id].option() else {
                continue;
            };
            let option = self.options.get(option_id);
            segments.push(Segment {
                source: option.span,
                target: option.target.clone(),
                target_start,
                alignment: option.alignment.clone(),
            });
            target_start += option.target.len();
        }
        TranslationPath { segments, score }
    }
}

impl std::fmt::Debug for Derivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derivation")
            .field("score", &self.score())
            .field("complete", &self.finals.len())
            .field("interrupted", &self.interrupted)
            .finish()
    }
}

/// A path through the arc graph, stored leaf first.
struct TrellisPath {
    nodes: Vec<HypId>,
    score: f32,
    /// Only nodes at or after this index may still be swapped for an arc;
    /// earlier swaps are generated by the path this one deviated from.
    deviate_from: usize,
    seq: usize,
}

impl PartialEq for TrellisPath {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TrellisPath {}

impl PartialOrd for TrellisPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TrellisPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Lazy n-best enumeration over a [`Derivation`].
pub struct Alternatives<'a> {
    derivation: &'a Derivation,
    queue: BinaryHeap<TrellisPath>,
    seen: HashSet<String>,
    seq: usize,
}

impl<'a> Alternatives<'a> {
    fn new(derivation: &'a Derivation) -> Self {
        let mut alternatives = Self {
            derivation,
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
            seq: 0,
        };
        for &leaf in &derivation.finals {
            let nodes = alternatives.ancestry(leaf);
            let score = derivation.graph[leaf].score();
            alternatives.push(nodes, score, 0);
        }
        alternatives
    }

    fn graph(&self) -> &'a HypothesisGraph {
        &self.derivation.graph
    }

    /// `id` and its ancestors, leaf first, root excluded.
    fn ancestry(&self, id: HypId) -> Vec<HypId> {
        let mut nodes = self.graph().path(id);
        nodes.reverse();
        nodes
    }

    fn push(&mut self, nodes: Vec<HypId>, score: f32, deviate_from: usize) {
        self.queue.push(TrellisPath {
            nodes,
            score,
            deviate_from,
            seq: self.seq,
        });
        self.seq += 1;
    }

    /// Queue every path that differs from `path` by swapping one node for
    /// one of its arcs.
    fn push_deviations(&mut self, path: &TrellisPath) {
        let graph = self.graph();
        for (i, &node) in path.nodes.iter().enumerate().skip(path.deviate_from) {
            for &arc in graph[node].arcs() {
                let mut nodes = path.nodes[..i].to_vec();
                nodes.extend(self.ancestry(arc));
                let score = path.score - graph[node].score() + graph[arc].score();
                self.push(nodes, score, i + 1);
            }
        }
    }

    /// Next path as hypothesis ids from the first extension to the leaf,
    /// with its score.
    pub(crate) fn next_nodes(&mut self) -> Option<(Vec<HypId>, f32)> {
        loop {
            let path = self.queue.pop()?;
            self.push_deviations(&path);
            let mut nodes = path.nodes;
            nodes.reverse();
            if self.derivation.distinct {
                let text = self.derivation.translation(&nodes, path.score).target_text();
                if !self.seen.insert(text) {
                    continue;
                }
            }
            return Some((nodes, path.score));
        }
    }
}

impl Iterator for Alternatives<'_> {
    type Item = TranslationPath;

    fn next(&mut self) -> Option<TranslationPath> {
        let (nodes, score) = self.next_nodes()?;
        Some(self.derivation.translation(&nodes, score))
    }
}
