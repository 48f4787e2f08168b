use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// A cell of the grid: `row` indexes the hypotheses, `col` the options.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
    pub score: f32,
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cursor {}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor {
    /// Max-heap order: higher score first, then the smaller `(row, col)`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| (other.row, other.col).cmp(&(self.row, self.col)))
    }
}

/// Lazy k-best enumeration of `rows[i] + cols[j]` over two lists sorted in
/// non-increasing order.
///
/// Popping `(i, j)` schedules `(i + 1, j)` and `(i, j + 1)`; the seen-set
/// keeps a cell from being scheduled twice. Pops come out in non-increasing
/// score, and at most two cells are scored per pop.
pub struct CubeFrontier {
    rows: Vec<f32>,
    cols: Vec<f32>,
    heap: BinaryHeap<Cursor>,
    seen: HashSet<(usize, usize)>,
    materialized: usize,
}

impl CubeFrontier {
    pub fn new(rows: Vec<f32>, cols: Vec<f32>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0] >= w[1]));
        debug_assert!(cols.windows(2).all(|w| w[0] >= w[1]));
        let mut frontier = Self {
            rows,
            cols,
            heap: BinaryHeap::new(),
            seen: HashSet::new(),
            materialized: 0,
        };
        frontier.schedule(0, 0);
        frontier
    }

    fn schedule(&mut self, row: usize, col: usize) {
        if row >= self.rows.len() || col >= self.cols.len() || !self.seen.insert((row, col)) {
            return;
        }
        self.materialized += 1;
        self.heap.push(Cursor {
            row,
            col,
            score: self.rows[row] + self.cols[col],
        });
    }

    pub fn peek(&self) -> Option<&Cursor> {
        self.heap.peek()
    }

    pub fn pop(&mut self) -> Option<Cursor> {
        let cursor = self.heap.pop()?;
        self.schedule(cursor.row + 1, cursor.col);
        self.schedule(cursor.row, cursor.col + 1);
        Some(cursor)
    }

    /// Cells scored so far.
    pub fn materialized(&self) -> usize {
        self.materialized
    }
}
