use tracing::debug;

use crate::coverage::CoverageBitmap;
use crate::options::{OptionTable, Span};

/// Best standalone score for every contiguous source span.
///
/// `estimate[i][j]` is the best of translating `[i, j]` with one option or
/// splitting it at some `k` into two independently estimated halves. Spans
/// that no combination of options covers hold `-inf`.
pub struct FutureCostTable {
    len: usize,
    /// Row-major upper triangle; index via `offset`.
    cells: Vec<f32>,
}

impl FutureCostTable {
    pub fn build(options: &OptionTable) -> Self {
        let len = options.source_len();
        let mut table = Self {
            len,
            cells: vec![f32::NEG_INFINITY; len * len],
        };

        for width in 1..=len {
            for start in 0..=len - width {
                let end = start + width - 1;
                let mut best = options
                    .best_score(Span::new(start, end))
                    .unwrap_or(f32::NEG_INFINITY);
                for split in start..end {
                    let combined = table.get(start, split) + table.get(split + 1, end);
                    if combined > best {
                        best = combined;
                    }
                }
                let at = table.offset(start, end);
                table.cells[at] = best;
            }
        }

        debug!(len, full = table.full_sentence(), "future cost table built");
        table
    }

    fn offset(&self, start: usize, end: usize) -> usize {
        start * self.len + end
    }

    pub fn source_len(&self) -> usize {
        self.len
    }

    /// Estimate for `[start, end]`.
    pub fn get(&self, start: usize, end: usize) -> f32 {
        if start > end || end >= self.len {
            return f32::NEG_INFINITY;
        }
        self.cells[self.offset(start, end)]
    }

    /// Sum of the estimates of every maximal uncovered run of `bitmap`.
    pub fn score(&self, bitmap: &CoverageBitmap) -> f32 {
        bitmap
            .gaps()
            .fold(0.0, |acc, gap| acc + self.get(gap.start, gap.end))
    }

    /// Future cost of `bitmap` as if `extra` were also covered.
    ///
    /// Equals `score` of the transitioned bitmap exactly: the runs are summed
    /// in the same left-to-right order.
    pub fn score_with(&self, bitmap: &CoverageBitmap, extra: Span) -> f32 {
        let mut total = 0.0;
        for gap in bitmap.gaps() {
            if gap.end < extra.start || gap.start > extra.end {
                total += self.get(gap.start, gap.end);
                continue;
            }
            if gap.start < extra.start {
                total += self.get(gap.start, extra.start - 1);
            }
            if gap.end > extra.end {
                total += self.get(extra.end + 1, gap.end);
            }
        }
        total
    }

    /// Estimate of translating the whole sentence; `0` for an empty sentence.
    pub fn full_sentence(&self) -> f32 {
        if self.len == 0 {
            0.0
        } else {
            self.get(0, self.len - 1)
        }
    }

    /// Rows of the table for diagnostics; `None` where no estimate exists.
    pub fn rows(&self) -> Vec<Vec<Option<f32>>> {
        (0..self.len)
            .map(|start| {
                (start..self.len)
                    .map(|end| Some(self.get(start, end)).filter(|v| v.is_finite()))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::BitmapPool;
    use crate::feature::{FeatureSet, PhrasePairScore};
    use crate::options::TranslationOption;
    use crate::settings::OptionSettings;

    fn table(len: usize, spans: &[(usize, usize, f32)]) -> OptionTable {
        let options = spans.iter().map(|&(s, e, score)| {
            TranslationOption::new(Span::new(s, e), vec![format!("t{s}{e}")], score)
        });
        OptionTable::build(
            len,
            options,
            &OptionSettings {
                max_per_span: 0,
                threshold: f32::INFINITY,
            },
            10,
            &FeatureSet::new().with(PhrasePairScore::new(1.0)),
        )
        .unwrap()
    }

    #[test]
    fn test_direct_and_split() {
        let options = table(3, &[(0, 0, -1.0), (1, 1, -1.0), (2, 2, -1.0), (0, 1, -1.5)]);
        let fc = FutureCostTable::build(&options);
        assert_eq!(fc.get(0, 0), -1.0);
        assert_eq!(fc.get(0, 1), -1.5);
        assert_eq!(fc.get(1, 2), -2.0);
        assert_eq!(fc.get(0, 2), -2.5);
        assert_eq!(fc.full_sentence(), -2.5);
    }

    #[test]
    fn test_split_beats_bad_direct() {
        let options = table(2, &[(0, 0, -1.0), (1, 1, -1.0), (0, 1, -5.0)]);
        let fc = FutureCostTable::build(&options);
        assert_eq!(fc.get(0, 1), -2.0);
    }

    #[test]
    fn test_uncoverable_is_negative_infinity() {
        let options = table(3, &[(0, 0, -1.0), (2, 2, -1.0)]);
        let fc = FutureCostTable::build(&options);
        assert_eq!(fc.get(1, 1), f32::NEG_INFINITY);
        assert_eq!(fc.get(0, 2), f32::NEG_INFINITY);
        assert_eq!(fc.full_sentence(), f32::NEG_INFINITY);
        assert_eq!(fc.get(2, 2), -1.0);
    }

    #[test]
    fn test_score_sums_gaps() {
        let options = table(4, &[(0, 0, -1.0), (1, 1, -2.0), (2, 2, -3.0), (3, 3, -4.0)]);
        let fc = FutureCostTable::build(&options);
        let mut pool = BitmapPool::new(4);
        let covered = pool.transition(pool.empty(), Span::new(1, 2)).unwrap();
        assert_eq!(fc.score(pool.get(covered)), -5.0);
        assert_eq!(fc.score(pool.get(pool.empty())), -10.0);
    }

    #[test]
    fn test_score_with_matches_transition() {
        let options = table(
            5,
            &[
                (0, 0, -1.0),
                (1, 1, -0.5),
                (2, 2, -0.25),
                (3, 3, -2.0),
                (4, 4, -0.75),
                (1, 3, -1.0),
            ],
        );
        let fc = FutureCostTable::build(&options);
        let mut pool = BitmapPool::new(5);
        let base = pool.transition(pool.empty(), Span::new(0, 0)).unwrap();
        for span in [Span::new(2, 2), Span::new(4, 4), Span::new(1, 3)] {
            let next = pool.transition(base, span).unwrap();
            assert_eq!(fc.score_with(pool.get(base), span), fc.score(pool.get(next)));
        }
    }

    #[test]
    fn test_empty_sentence() {
        let options = table(0, &[]);
        let fc = FutureCostTable::build(&options);
        assert_eq!(fc.full_sentence(), 0.0);
        assert!(fc.rows().is_empty());
    }
}
