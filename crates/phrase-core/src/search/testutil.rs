//! Shared fixtures for search tests.

use crate::feature::FeatureSet;
use crate::options::{OptionId, Span, TranslationOption};
use crate::settings::Settings;

use super::{Decoder, ScoringScope, Sentence};

/// Source tokens plus raw options, before `Decoder::prepare`.
#[derive(Debug, Clone)]
pub struct ToySentence {
    pub tokens: Vec<String>,
    pub options: Vec<TranslationOption>,
}

impl ToySentence {
    pub fn new(source: &str) -> Self {
        Self {
            tokens: source.split_whitespace().map(str::to_string).collect(),
            options: Vec::new(),
        }
    }

    /// Add an option for `[start, end]`; `target` is split on whitespace.
    pub fn option(mut self, start: usize, end: usize, target: &str, score: f32) -> Self {
        let target = target.split_whitespace().map(str::to_string).collect();
        self.options
            .push(TranslationOption::new(Span::new(start, end), target, score));
        self
    }
}

/// "a b c" with one option per word and a cheaper phrase for "a b".
pub fn abc_sentence() -> ToySentence {
    ToySentence::new("a b c")
        .option(0, 0, "A", -1.0)
        .option(1, 1, "B", -1.0)
        .option(2, 2, "C", -1.0)
        .option(0, 1, "AB", -1.5)
}

/// "a b c" where nothing translates "c".
pub fn gap_sentence() -> ToySentence {
    ToySentence::new("a b c")
        .option(0, 0, "A", -1.0)
        .option(1, 1, "B", -1.0)
}

/// Monotone sentence of `len` words with two options per word.
pub fn chain_sentence(len: usize) -> ToySentence {
    let source: Vec<String> = (0..len).map(|i| format!("w{i}")).collect();
    let mut toy = ToySentence::new(&source.join(" "));
    for i in 0..len {
        toy = toy
            .option(i, i, &format!("T{i}"), -1.0)
            .option(i, i, &format!("U{i}"), -1.25);
        if i + 1 < len {
            toy = toy.option(i, i + 1, &format!("T{i}_{}", i + 1), -2.1);
        }
    }
    toy
}

/// Default settings with n-best off, then `tweak` applied.
pub fn settings(tweak: impl FnOnce(&mut Settings)) -> Settings {
    let mut settings = Settings::default();
    tweak(&mut settings);
    settings
}

pub struct Fixture {
    pub decoder: Decoder,
    pub sentence: Sentence,
}

impl Fixture {
    pub fn new(toy: ToySentence, tweak: impl FnOnce(&mut Settings)) -> Self {
        Self::with_decoder(toy, Decoder::with_default_features(settings(tweak)))
    }

    pub fn with_features(
        toy: ToySentence,
        features: FeatureSet,
        tweak: impl FnOnce(&mut Settings),
    ) -> Self {
        Self::with_decoder(toy, Decoder::new(settings(tweak), features))
    }

    fn with_decoder(toy: ToySentence, decoder: Decoder) -> Self {
        let sentence = decoder.prepare(toy.tokens, toy.options).unwrap();
        Self { decoder, sentence }
    }

    pub fn scope(&self) -> ScoringScope<'_> {
        self.decoder.scope(&self.sentence)
    }

    /// Handle of the first option whose target text is `text`.
    pub fn option_id(&self, text: &str) -> OptionId {
        let table = self.sentence.options();
        table
            .spans()
            .flat_map(|span| table.ids_for(span))
            .find(|&id| table.get(id).target_text() == text)
            .unwrap_or_else(|| panic!("no option {text:?}"))
    }
}
