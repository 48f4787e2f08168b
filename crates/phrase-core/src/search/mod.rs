//! Hypothesis search over one sentence.
//!
//! [`Decoder::prepare`] turns raw options into a [`Sentence`] (sorted option
//! table plus future-cost estimates); [`Decoder::decode`] runs either the
//! histogram/beam search or cube pruning, depending on settings, and returns
//! a [`Derivation`].

mod cube;
mod derivation;
mod explain;
pub(crate) mod hypothesis;
mod normal;
mod stack;
mod stats;

#[cfg(test)]
pub(crate) mod testutil;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, debug_span};

use crate::feature::FeatureSet;
use crate::future_cost::FutureCostTable;
use crate::options::{OptionError, OptionTable, TranslationOption};
use crate::settings::{SearchAlgorithm, SearchSettings, Settings};

pub use derivation::{Alternatives, Derivation, Segment, TranslationPath};
pub use explain::{
    explain, format_text, ExplainOption, ExplainPath, ExplainResult, ExplainSegment,
};
pub use stats::SearchStats;

use hypothesis::{HypId, HypothesisGraph};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("no hypothesis covers the whole sentence")]
    NoCompleteHypothesis,
    #[error("search aborted after {hypotheses} hypotheses without a complete translation")]
    Aborted { hypotheses: usize },
}

/// A source sentence ready for decoding.
///
/// Option scores and future costs depend on the feature set of the decoder
/// that prepared it; decode it with that same decoder.
pub struct Sentence {
    tokens: Vec<String>,
    options: Arc<OptionTable>,
    future: FutureCostTable,
}

impl Sentence {
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn options(&self) -> &OptionTable {
        &self.options
    }

    pub fn future_costs(&self) -> &FutureCostTable {
        &self.future
    }
}

/// Read-only context shared by every expansion of one decode.
pub(crate) struct ScoringScope<'a> {
    pub options: &'a OptionTable,
    pub future: &'a FutureCostTable,
    pub features: &'a FeatureSet,
    pub distortion_limit: Option<usize>,
}

/// Per-sentence wall-clock and node-count limits.
pub(crate) struct Budget {
    deadline: Option<Instant>,
    max_hypotheses: Option<usize>,
}

impl Budget {
    pub fn new(settings: &SearchSettings) -> Self {
        Self {
            deadline: (settings.timeout_ms > 0)
                .then(|| Instant::now() + Duration::from_millis(settings.timeout_ms)),
            max_hypotheses: (settings.max_hypotheses > 0).then_some(settings.max_hypotheses),
        }
    }

    pub fn exhausted(&self, stats: &SearchStats) -> bool {
        if self
            .max_hypotheses
            .is_some_and(|max| stats.created >= max)
        {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// What a search strategy hands back: the arena and the complete
/// hypotheses, best first, each carrying one reference.
pub(crate) struct SearchOutcome {
    pub graph: HypothesisGraph,
    pub finals: Vec<HypId>,
    pub interrupted: bool,
}

pub struct Decoder {
    settings: Settings,
    features: FeatureSet,
}

impl Decoder {
    pub fn new(settings: Settings, features: FeatureSet) -> Self {
        Self { settings, features }
    }

    /// Decoder with the phrase, distortion and word-penalty features
    /// weighted from `settings.weights`.
    pub fn with_default_features(settings: Settings) -> Self {
        let features = FeatureSet::from_weights(&settings.weights);
        Self::new(settings, features)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Validate and sort `options` for `tokens` and build the future-cost
    /// table.
    pub fn prepare(
        &self,
        tokens: Vec<String>,
        options: impl IntoIterator<Item = TranslationOption>,
    ) -> Result<Sentence, OptionError> {
        let table = OptionTable::build(
            tokens.len(),
            options,
            &self.settings.options,
            self.settings.search.max_phrase_length,
            &self.features,
        )?;
        let future = FutureCostTable::build(&table);
        Ok(Sentence {
            tokens,
            options: Arc::new(table),
            future,
        })
    }

    pub(crate) fn scope<'a>(&'a self, sentence: &'a Sentence) -> ScoringScope<'a> {
        ScoringScope {
            options: &sentence.options,
            future: &sentence.future,
            features: &self.features,
            distortion_limit: self.settings.search.distortion_limit(),
        }
    }

    pub fn decode(&self, sentence: &Sentence) -> Result<Derivation, DecodeFailure> {
        let algorithm = self.settings.search.algorithm;
        let _span = debug_span!("decode", len = sentence.len(), ?algorithm).entered();

        if sentence.future.full_sentence() == f32::NEG_INFINITY {
            debug!("no combination of options covers the sentence");
            return Err(DecodeFailure::NoCompleteHypothesis);
        }

        let scope = self.scope(sentence);
        let budget = Budget::new(&self.settings.search);
        let outcome = match algorithm {
            SearchAlgorithm::Normal => normal::search(&self.settings, &scope, &budget),
            SearchAlgorithm::Cube => cube::search(&self.settings, &scope, &budget),
        };

        let stats = outcome.graph.stats();
        debug!(
            created = stats.created,
            recombined = stats.recombined,
            pruned = stats.pruned,
            discarded = stats.discarded,
            early_discarded = stats.early_discarded,
            complete = outcome.finals.len(),
            interrupted = outcome.interrupted,
            "search finished"
        );

        if outcome.finals.is_empty() {
            return Err(if outcome.interrupted {
                DecodeFailure::Aborted {
                    hypotheses: stats.created,
                }
            } else {
                DecodeFailure::NoCompleteHypothesis
            });
        }
        Ok(Derivation::new(
            outcome,
            Arc::clone(&sentence.options),
            self.settings.nbest.distinct,
        ))
    }
}
