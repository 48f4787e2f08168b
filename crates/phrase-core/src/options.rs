//! Translation options and the per-sentence option table.
//!
//! Options arrive from an external phrase-table layer. They are validated
//! once here, at the boundary; the search assumes every option it sees has an
//! in-range span and a consistent alignment.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::feature::FeatureSet;
use crate::settings::OptionSettings;

/// An inclusive source span `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

// A span covers at least one word, so it has no empty state.
#[allow(clippy::len_without_is_empty)]
impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of source words in the span.
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

/// A candidate target phrase for one source span.
///
/// `alignment` holds phrase-internal `(source offset, target offset)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOption {
    pub span: Span,
    pub target: Vec<String>,
    pub alignment: Vec<(usize, usize)>,
    /// Intrinsic score from the phrase table (log domain).
    pub score: f32,
    future_score: f32,
}

impl TranslationOption {
    pub fn new(span: Span, target: Vec<String>, score: f32) -> Self {
        Self {
            span,
            target,
            alignment: Vec::new(),
            score,
            future_score: score,
        }
    }

    pub fn with_alignment(mut self, alignment: Vec<(usize, usize)>) -> Self {
        self.alignment = alignment;
        self
    }

    /// Standalone score used for sorting, future-cost estimation and cube
    /// pruning: the sum of every feature's estimate for this option.
    pub fn future_score(&self) -> f32 {
        self.future_score
    }

    pub fn target_text(&self) -> String {
        self.target.join(" ")
    }
}

/// Handle to an option inside an [`OptionTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionId(u32);

impl OptionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptionError {
    #[error("option span {span} is reversed")]
    ReversedSpan { span: Span },

    #[error("option span {span} is outside a sentence of {len} words")]
    SpanOutOfRange { span: Span, len: usize },

    #[error("option score for span {span} is NaN")]
    NanScore { span: Span },

    #[error("option score for span {span} is +inf")]
    InfiniteScore { span: Span },

    #[error("alignment point {source_pos}-{target_pos} lies outside the phrase pair at {span}")]
    AlignmentOutOfRange {
        span: Span,
        source_pos: usize,
        target_pos: usize,
    },

    #[error("duplicate alignment point {source_pos}-{target_pos} at {span}")]
    DuplicateAlignment {
        span: Span,
        source_pos: usize,
        target_pos: usize,
    },
}

/// The sorted, pruned option lists of one sentence.
///
/// Options of a span are stored contiguously in `options`, best first, so a
/// span's list is a slice and an [`OptionId`] is a flat index.
pub struct OptionTable {
    source_len: usize,
    options: Vec<TranslationOption>,
    /// span → range into `options`
    by_span: BTreeMap<Span, Range<u32>>,
    /// ends_by_start[i] = ascending ends `j` such that `[i,j]` has options
    ends_by_start: Vec<Vec<usize>>,
}

impl OptionTable {
    /// Validate, score, sort and prune the options for a sentence.
    ///
    /// Options longer than `max_phrase_length` or whose standalone score is
    /// `-inf` are dropped silently; malformed options are an error.
    pub fn build(
        source_len: usize,
        options: impl IntoIterator<Item = TranslationOption>,
        settings: &OptionSettings,
        max_phrase_length: usize,
        features: &FeatureSet,
    ) -> Result<Self, OptionError> {
        let mut grouped: BTreeMap<Span, Vec<TranslationOption>> = BTreeMap::new();
        let mut ingested = 0usize;
        for mut option in options {
            validate(&option, source_len)?;
            ingested += 1;
            if option.span.len() > max_phrase_length {
                continue;
            }
            option.future_score = features.estimate(&option);
            if option.future_score == f32::NEG_INFINITY || option.future_score.is_nan() {
                continue;
            }
            grouped.entry(option.span).or_default().push(option);
        }

        let mut flat = Vec::with_capacity(ingested);
        let mut by_span = BTreeMap::new();
        let mut ends_by_start = vec![Vec::new(); source_len];
        for (span, mut list) in grouped {
            // Stable sort: equal scores and texts keep ingestion order.
            list.sort_by(|a, b| {
                b.future_score
                    .total_cmp(&a.future_score)
                    .then_with(|| a.target.cmp(&b.target))
            });
            let best = list[0].future_score;
            list.retain(|o| o.future_score >= best - settings.threshold);
            if settings.max_per_span > 0 {
                list.truncate(settings.max_per_span);
            }
            let start = flat.len() as u32;
            flat.extend(list);
            by_span.insert(span, start..flat.len() as u32);
            ends_by_start[span.start].push(span.end);
        }

        debug!(
            source_len,
            ingested,
            kept = flat.len(),
            spans = by_span.len(),
            "option table built"
        );
        Ok(Self {
            source_len,
            options: flat,
            by_span,
            ends_by_start,
        })
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Total number of options kept after pruning.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn get(&self, id: OptionId) -> &TranslationOption {
        &self.options[id.index()]
    }

    /// Options for exactly `span`, best first. Empty when none survived.
    pub fn options_for(&self, span: Span) -> &[TranslationOption] {
        match self.by_span.get(&span) {
            Some(range) => &self.options[range.start as usize..range.end as usize],
            None => &[],
        }
    }

    /// Handles of the options for `span`, in the same order as `options_for`.
    pub fn ids_for(&self, span: Span) -> impl Iterator<Item = OptionId> + '_ {
        self.by_span
            .get(&span)
            .into_iter()
            .flat_map(|range| range.clone().map(OptionId))
    }

    /// Best standalone score of any option for exactly `span`.
    pub fn best_score(&self, span: Span) -> Option<f32> {
        self.options_for(span).first().map(|o| o.future_score)
    }

    /// Ends `j` (ascending) such that `[start, j]` has at least one option.
    pub fn ends_from(&self, start: usize) -> &[usize] {
        self.ends_by_start
            .get(start)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All spans with at least one option, in `(start, end)` order.
    pub fn spans(&self) -> impl Iterator<Item = Span> + '_ {
        self.by_span.keys().copied()
    }
}

fn validate(option: &TranslationOption, source_len: usize) -> Result<(), OptionError> {
    let span = option.span;
    if span.start > span.end {
        return Err(OptionError::ReversedSpan { span });
    }
    if span.end >= source_len {
        return Err(OptionError::SpanOutOfRange {
            span,
            len: source_len,
        });
    }
    if option.score.is_nan() {
        return Err(OptionError::NanScore { span });
    }
    // +inf would make the span threshold `best - threshold` NaN.
    if option.score == f32::INFINITY {
        return Err(OptionError::InfiniteScore { span });
    }
    let mut seen = HashSet::new();
    for &(source_pos, target_pos) in &option.alignment {
        if source_pos >= span.len() || target_pos >= option.target.len() {
            return Err(OptionError::AlignmentOutOfRange {
                span,
                source_pos,
                target_pos,
            });
        }
        if !seen.insert((source_pos, target_pos)) {
            return Err(OptionError::DuplicateAlignment {
                span,
                source_pos,
                target_pos,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{FeatureSet, PhrasePairScore, WordPenalty};

    fn opt(start: usize, end: usize, target: &str, score: f32) -> TranslationOption {
        TranslationOption::new(
            Span::new(start, end),
            target.split_whitespace().map(str::to_string).collect(),
            score,
        )
    }

    fn settings(max_per_span: usize, threshold: f32) -> OptionSettings {
        OptionSettings {
            max_per_span,
            threshold,
        }
    }

    fn phrase_only() -> FeatureSet {
        FeatureSet::new().with(PhrasePairScore::new(1.0))
    }

    #[test]
    fn test_sorted_best_first() {
        let table = OptionTable::build(
            2,
            vec![
                opt(0, 0, "x", -3.0),
                opt(0, 0, "y", -1.0),
                opt(0, 0, "z", -2.0),
            ],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .unwrap();

        let texts: Vec<String> = table
            .options_for(Span::new(0, 0))
            .iter()
            .map(|o| o.target_text())
            .collect();
        assert_eq!(texts, vec!["y", "z", "x"]);
        assert_eq!(table.best_score(Span::new(0, 0)), Some(-1.0));
    }

    #[test]
    fn test_ties_ordered_by_target() {
        let table = OptionTable::build(
            1,
            vec![opt(0, 0, "b", -1.0), opt(0, 0, "a", -1.0)],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .unwrap();
        assert_eq!(table.options_for(Span::new(0, 0))[0].target_text(), "a");
    }

    #[test]
    fn test_max_per_span() {
        let table = OptionTable::build(
            1,
            (0..10).map(|i| opt(0, 0, &format!("w{i}"), -(i as f32))),
            &settings(3, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .unwrap();
        assert_eq!(table.options_for(Span::new(0, 0)).len(), 3);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_threshold_relative_to_span_best() {
        let table = OptionTable::build(
            2,
            vec![
                opt(0, 0, "a", -1.0),
                opt(0, 0, "b", -2.5),
                opt(0, 0, "c", -4.0),
                opt(1, 1, "d", -10.0),
            ],
            &settings(0, 2.0),
            10,
            &phrase_only(),
        )
        .unwrap();
        assert_eq!(table.options_for(Span::new(0, 0)).len(), 2);
        // The threshold is per span, so a uniformly bad span keeps its best.
        assert_eq!(table.options_for(Span::new(1, 1)).len(), 1);
    }

    #[test]
    fn test_empty_span_is_empty_slice() {
        let table = OptionTable::build(
            3,
            vec![opt(0, 0, "a", -1.0)],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .unwrap();
        assert!(table.options_for(Span::new(1, 2)).is_empty());
        assert_eq!(table.ids_for(Span::new(1, 2)).count(), 0);
        assert!(table.ends_from(1).is_empty());
        assert!(table.ends_from(99).is_empty());
    }

    #[test]
    fn test_ends_from_and_ids() {
        let table = OptionTable::build(
            3,
            vec![
                opt(0, 1, "ab", -1.5),
                opt(0, 0, "a", -1.0),
                opt(0, 2, "abc", -4.0),
                opt(1, 1, "b", -1.0),
            ],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .unwrap();
        assert_eq!(table.ends_from(0), &[0, 1, 2]);
        assert_eq!(table.ends_from(1), &[1]);
        let ids: Vec<OptionId> = table.ids_for(Span::new(0, 1)).collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(table.get(ids[0]).target_text(), "ab");
    }

    #[test]
    fn test_max_phrase_length_drops_long_spans() {
        let table = OptionTable::build(
            3,
            vec![opt(0, 2, "abc", -1.0), opt(0, 0, "a", -1.0)],
            &settings(0, f32::INFINITY),
            2,
            &phrase_only(),
        )
        .unwrap();
        assert!(table.options_for(Span::new(0, 2)).is_empty());
        assert_eq!(table.ends_from(0), &[0]);
    }

    #[test]
    fn test_future_score_includes_feature_estimates() {
        let features = FeatureSet::new()
            .with(PhrasePairScore::new(1.0))
            .with(WordPenalty::new(0.5));
        let table = OptionTable::build(
            1,
            vec![opt(0, 0, "x y", -1.0)],
            &settings(0, f32::INFINITY),
            10,
            &features,
        )
        .unwrap();
        let o = &table.options_for(Span::new(0, 0))[0];
        assert_eq!(o.score, -1.0);
        assert_eq!(o.future_score(), -2.0);
    }

    #[test]
    fn test_negative_infinity_options_dropped() {
        let table = OptionTable::build(
            1,
            vec![opt(0, 0, "x", f32::NEG_INFINITY)],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_error_out_of_range() {
        let err = OptionTable::build(
            2,
            vec![opt(1, 2, "x", -1.0)],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .err()
        .unwrap();
        assert_eq!(
            err,
            OptionError::SpanOutOfRange {
                span: Span::new(1, 2),
                len: 2
            }
        );
        assert!(err.to_string().contains("[1,2]"));
    }

    #[test]
    fn test_error_reversed_span() {
        let err = OptionTable::build(
            3,
            vec![opt(2, 1, "x", -1.0)],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, OptionError::ReversedSpan { .. }));
    }

    #[test]
    fn test_error_nan_score() {
        let err = OptionTable::build(
            1,
            vec![opt(0, 0, "x", f32::NAN)],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, OptionError::NanScore { .. }));
    }

    #[test]
    fn test_error_infinite_score() {
        let err = OptionTable::build(
            2,
            vec![opt(0, 0, "x", -1.0), opt(0, 0, "y", f32::INFINITY)],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .err()
        .unwrap();
        assert_eq!(err, OptionError::InfiniteScore { span: Span::new(0, 0) });
        assert_eq!(err.to_string(), "option score for span [0,0] is +inf");
    }

    #[test]
    fn test_error_alignment() {
        let bad = opt(0, 1, "x", -1.0).with_alignment(vec![(0, 0), (2, 0)]);
        let err = OptionTable::build(
            2,
            vec![bad],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            OptionError::AlignmentOutOfRange { source_pos: 2, .. }
        ));

        let dup = opt(0, 1, "x y", -1.0).with_alignment(vec![(0, 0), (1, 1), (0, 0)]);
        let err = OptionTable::build(
            2,
            vec![dup],
            &settings(0, f32::INFINITY),
            10,
            &phrase_only(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, OptionError::DuplicateAlignment { .. }));
    }

    #[test]
    fn test_span_helpers() {
        let span = Span::new(2, 4);
        assert_eq!(span.len(), 3);
        assert!(span.contains(3));
        assert!(!span.contains(5));
        assert_eq!(span.to_string(), "[2,4]");
    }
}
