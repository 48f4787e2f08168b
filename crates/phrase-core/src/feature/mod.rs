//! Scoring-function plugins.
//!
//! A [`FeatureScorer`] scores one hypothesis extension. The decoder holds an
//! ordered [`FeatureSet`]; the total of an extension is the sum of every
//! scorer's weighted contribution, added in registration order.

mod builtin;
mod ngram;

pub use builtin::{distortion_distance, DistortionPenalty, PhrasePairScore, WordPenalty};
pub use ngram::{LanguageModelError, NgramModel};

use crate::options::TranslationOption;
use crate::settings::WeightSettings;

/// Sentence-start marker in target context windows.
pub const BOS: &str = "<s>";
/// Sentence-end marker scored when a hypothesis completes the sentence.
pub const EOS: &str = "</s>";

/// Everything a scorer may look at when a hypothesis is extended.
pub struct ExtensionContext<'a> {
    pub source_len: usize,
    /// End of the previously translated span; `None` at the root.
    pub prev_end: Option<usize>,
    pub option: &'a TranslationOption,
    /// Trailing target words of the parent, oldest first. Starts with
    /// [`BOS`] at the root when any scorer needs context.
    pub history: &'a [String],
    /// True when the extension covers the last untranslated word.
    pub completes: bool,
}

impl ExtensionContext<'_> {
    pub fn distortion(&self) -> usize {
        distortion_distance(self.prev_end, self.option.span.start)
    }
}

pub trait FeatureScorer: Send + Sync {
    fn name(&self) -> &str;

    /// Context-free estimate for the option alone, used for option sorting
    /// and future cost. Defaults to `0`.
    fn estimate(&self, _option: &TranslationOption) -> f32 {
        0.0
    }

    /// Weighted score of applying `ctx.option` to the parent hypothesis.
    fn incremental_score(&self, ctx: &ExtensionContext<'_>) -> f32;

    /// Number of trailing target words this scorer reads from `history`.
    /// Hypotheses that differ only before this window recombine.
    fn context_order(&self) -> usize {
        0
    }
}

/// Ordered registry of scorers.
#[derive(Default)]
pub struct FeatureSet {
    scorers: Vec<Box<dyn FeatureScorer>>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in phrase, distortion and word-penalty scorers, weighted
    /// from settings. A language model is added separately with [`push`].
    ///
    /// [`push`]: FeatureSet::push
    pub fn from_weights(weights: &WeightSettings) -> Self {
        Self::new()
            .with(PhrasePairScore::new(weights.phrase))
            .with(DistortionPenalty::new(weights.distortion))
            .with(WordPenalty::new(weights.word_penalty))
    }

    pub fn push(&mut self, scorer: impl FeatureScorer + 'static) {
        self.scorers.push(Box::new(scorer));
    }

    pub fn with(mut self, scorer: impl FeatureScorer + 'static) -> Self {
        self.push(scorer);
        self
    }

    pub fn len(&self) -> usize {
        self.scorers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scorers.iter().map(|s| s.name())
    }

    pub fn estimate(&self, option: &TranslationOption) -> f32 {
        self.scorers
            .iter()
            .fold(0.0, |acc, s| acc + s.estimate(option))
    }

    pub fn incremental_score(&self, ctx: &ExtensionContext<'_>) -> f32 {
        self.scorers
            .iter()
            .fold(0.0, |acc, s| acc + s.incremental_score(ctx))
    }

    /// Per-scorer contributions, in registration order.
    pub fn breakdown(&self, ctx: &ExtensionContext<'_>) -> Vec<(String, f32)> {
        self.scorers
            .iter()
            .map(|s| (s.name().to_string(), s.incremental_score(ctx)))
            .collect()
    }

    /// Longest target context any scorer reads.
    pub fn context_order(&self) -> usize {
        self.scorers
            .iter()
            .map(|s| s.context_order())
            .max()
            .unwrap_or(0)
    }
}
