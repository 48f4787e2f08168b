use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::coverage::BitmapId;
use crate::options::OptionId;
use crate::search::hypothesis::HypId;

use super::frontier::CubeFrontier;

/// All ways of reaching one bitmap from one predecessor bitmap with one span:
/// the predecessor's hypotheses crossed with the span's options.
pub struct BackwardsEdge {
    hyps: Rc<[HypId]>,
    options: Vec<OptionId>,
    /// Future cost of the target bitmap, the same for every cell.
    future: f32,
    frontier: CubeFrontier,
}

impl BackwardsEdge {
    /// `hyp_scores` and `option_scores` must be sorted best first and line up
    /// with `hyps` and `options`.
    pub fn new(
        hyps: Rc<[HypId]>,
        hyp_scores: Vec<f32>,
        options: Vec<OptionId>,
        option_scores: Vec<f32>,
        future: f32,
    ) -> Self {
        Self {
            hyps,
            options,
            future,
            frontier: CubeFrontier::new(hyp_scores, option_scores),
        }
    }

    fn head_score(&self) -> Option<f32> {
        self.frontier.peek().map(|c| c.score + self.future)
    }
}

/// A (hypothesis, option) pair taken from a container, with the estimate it
/// was ranked by.
#[derive(Debug, Clone, Copy)]
pub struct Pop {
    pub parent: HypId,
    pub option: OptionId,
    pub estimate: f32,
}

#[derive(Debug, Clone, Copy)]
struct EdgeHead {
    score: f32,
    edge: usize,
    /// Secondary order; the edge index when deterministic, otherwise 0.
    tie: usize,
}

impl PartialEq for EdgeHead {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EdgeHead {}

impl PartialOrd for EdgeHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeHead {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.tie.cmp(&self.tie))
    }
}

/// Incoming edges of one coverage bitmap, merged lazily by estimate.
pub struct BitmapContainer {
    bitmap: BitmapId,
    edges: Vec<BackwardsEdge>,
    heap: BinaryHeap<EdgeHead>,
    insertions: usize,
    deterministic: bool,
}

impl BitmapContainer {
    pub fn new(bitmap: BitmapId, deterministic: bool) -> Self {
        Self {
            bitmap,
            edges: Vec::new(),
            heap: BinaryHeap::new(),
            insertions: 0,
            deterministic,
        }
    }

    pub fn bitmap(&self) -> BitmapId {
        self.bitmap
    }

    pub fn add_edge(&mut self, edge: BackwardsEdge) {
        self.edges.push(edge);
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Queue the best cell of every edge. Call once, after the last edge
    /// has been added.
    pub fn initialize_edges(&mut self) {
        for edge in 0..self.edges.len() {
            self.push_head(edge);
        }
    }

    fn push_head(&mut self, edge: usize) {
        if let Some(score) = self.edges[edge].head_score() {
            let tie = if self.deterministic { edge } else { 0 };
            self.heap.push(EdgeHead { score, edge, tie });
        }
    }

    /// Best remaining pair over all edges.
    pub fn pop_best(&mut self) -> Option<Pop> {
        let head = self.heap.pop()?;
        let edge = &mut self.edges[head.edge];
        let cursor = edge.frontier.pop()?;
        let pop = Pop {
            parent: edge.hyps[cursor.row],
            option: edge.options[cursor.col],
            estimate: head.score,
        };
        self.push_head(head.edge);
        Some(pop)
    }

    pub fn top_score(&self) -> Option<f32> {
        self.heap.peek().map(|h| h.score)
    }

    /// Count a pop that became a stack entry.
    pub fn record_insertion(&mut self) {
        self.insertions += 1;
    }

    pub fn insertions(&self) -> usize {
        self.insertions
    }

    pub fn materialized(&self) -> usize {
        self.edges.iter().map(|e| e.frontier.materialized()).sum()
    }
}
