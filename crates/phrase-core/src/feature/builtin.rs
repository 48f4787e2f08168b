use crate::options::TranslationOption;

use super::{ExtensionContext, FeatureScorer};

/// Reordering distance of a span starting at `start` after a span ending at
/// `prev_end`. Monotone continuation is `0`; the root measures from position 0.
pub fn distortion_distance(prev_end: Option<usize>, start: usize) -> usize {
    let expected = prev_end.map_or(0, |end| end + 1);
    expected.abs_diff(start)
}

/// Weighted intrinsic score of the phrase pair.
pub struct PhrasePairScore {
    weight: f32,
}

impl PhrasePairScore {
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl FeatureScorer for PhrasePairScore {
    fn name(&self) -> &str {
        "phrase"
    }

    fn estimate(&self, option: &TranslationOption) -> f32 {
        self.weight * option.score
    }

    fn incremental_score(&self, ctx: &ExtensionContext<'_>) -> f32 {
        self.weight * ctx.option.score
    }
}

/// Linear distortion: `-weight * distance`.
pub struct DistortionPenalty {
    weight: f32,
}

impl DistortionPenalty {
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl FeatureScorer for DistortionPenalty {
    fn name(&self) -> &str {
        "distortion"
    }

    fn incremental_score(&self, ctx: &ExtensionContext<'_>) -> f32 {
        -self.weight * ctx.distortion() as f32
    }
}

/// `-weight` per produced target word.
pub struct WordPenalty {
    weight: f32,
}

impl WordPenalty {
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl FeatureScorer for WordPenalty {
    fn name(&self) -> &str {
        "word_penalty"
    }

    fn estimate(&self, option: &TranslationOption) -> f32 {
        -self.weight * option.target.len() as f32
    }

    fn incremental_score(&self, ctx: &ExtensionContext<'_>) -> f32 {
        self.estimate(ctx.option)
    }
}
