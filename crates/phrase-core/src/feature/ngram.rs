use std::collections::HashMap;

use crate::options::TranslationOption;

use super::{ExtensionContext, FeatureScorer, EOS};

/// Log probability used for words the model has never seen.
const DEFAULT_UNK: f32 = -100.0;

#[derive(Debug, thiserror::Error)]
pub enum LanguageModelError {
    #[error("line {line}: expected `ngram<TAB>logprob[<TAB>backoff]`")]
    Malformed { line: usize },
    #[error("line {line}: invalid number {value:?}")]
    InvalidNumber { line: usize, value: String },
    #[error("line {line}: {words}-gram exceeds model order {order}")]
    OrderExceeded {
        line: usize,
        words: usize,
        order: usize,
    },
}

/// Small in-memory back-off n-gram model.
///
/// Entries are keyed by their space-joined words. A missing n-gram backs off
/// to its suffix, adding the back-off weight of its history.
pub struct NgramModel {
    order: usize,
    weight: f32,
    unk: f32,
    entries: HashMap<String, (f32, f32)>,
}

impl NgramModel {
    pub fn new(order: usize, weight: f32) -> Self {
        Self {
            order: order.max(1),
            weight,
            unk: DEFAULT_UNK,
            entries: HashMap::new(),
        }
    }

    /// Parse `ngram<TAB>logprob[<TAB>backoff]` lines. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn parse(text: &str, order: usize, weight: f32) -> Result<Self, LanguageModelError> {
        let mut model = Self::new(order, weight);
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let raw = raw.trim_end();
            if raw.trim().is_empty() || raw.starts_with('#') {
                continue;
            }
            let mut fields = raw.split('\t');
            let (Some(ngram), Some(prob)) = (fields.next(), fields.next()) else {
                return Err(LanguageModelError::Malformed { line });
            };
            let number = |value: &str| {
                value
                    .trim()
                    .parse::<f32>()
                    .map_err(|_| LanguageModelError::InvalidNumber {
                        line,
                        value: value.to_string(),
                    })
            };
            let prob = number(prob)?;
            let backoff = fields.next().map(number).transpose()?.unwrap_or(0.0);
            if fields.next().is_some() {
                return Err(LanguageModelError::Malformed { line });
            }
            let words: Vec<&str> = ngram.split_whitespace().collect();
            if words.is_empty() {
                return Err(LanguageModelError::Malformed { line });
            }
            if words.len() > model.order {
                return Err(LanguageModelError::OrderExceeded {
                    line,
                    words: words.len(),
                    order: model.order,
                });
            }
            model.insert(&words, prob, backoff);
        }
        Ok(model)
    }

    pub fn with_unk(mut self, unk: f32) -> Self {
        self.unk = unk;
        self
    }

    pub fn insert(&mut self, words: &[&str], log_prob: f32, backoff: f32) {
        self.entries.insert(words.join(" "), (log_prob, backoff));
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unweighted `log P(word | context)`; only the last `order - 1`
    /// context words are used.
    pub fn log_prob<S: AsRef<str>>(&self, context: &[S], word: &str) -> f32 {
        let keep = context.len().min(self.order - 1);
        let mut context = &context[context.len() - keep..];
        let mut backoff = 0.0;
        loop {
            let key = join_with(context, word);
            if let Some(&(prob, _)) = self.entries.get(&key) {
                return backoff + prob;
            }
            let Some((last, rest)) = context.split_last() else {
                return backoff + self.unk;
            };
            if let Some(&(_, bo)) = self.entries.get(&join_with(rest, last.as_ref())) {
                backoff += bo;
            }
            context = &context[1..];
        }
    }

    /// Unweighted score of `words` following `history`.
    fn sequence_score(&self, history: &[String], words: &[String], end: bool) -> f32 {
        let mut window: Vec<&str> = history.iter().map(String::as_str).collect();
        let mut total = 0.0;
        for word in words.iter().map(String::as_str).chain(end.then_some(EOS)) {
            total += self.log_prob(window.as_slice(), word);
            window.push(word);
            if window.len() >= self.order {
                window.remove(0);
            }
        }
        total
    }
}

fn join_with<S: AsRef<str>>(context: &[S], word: &str) -> String {
    let mut key = String::new();
    for w in context {
        key.push_str(w.as_ref());
        key.push(' ');
    }
    key.push_str(word);
    key
}

impl FeatureScorer for NgramModel {
    fn name(&self) -> &str {
        "lm"
    }

    /// Scores the phrase with in-phrase context only; the first words see a
    /// shorter history than they will during search.
    fn estimate(&self, option: &TranslationOption) -> f32 {
        self.weight * self.sequence_score(&[], &option.target, false)
    }

    fn incremental_score(&self, ctx: &ExtensionContext<'_>) -> f32 {
        self.weight * self.sequence_score(ctx.history, &ctx.option.target, ctx.completes)
    }

    fn context_order(&self) -> usize {
        self.order - 1
    }
}

impl std::fmt::Debug for NgramModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NgramModel")
            .field("order", &self.order)
            .field("weight", &self.weight)
            .field("entries", &self.entries.len())
            .finish()
    }
}
