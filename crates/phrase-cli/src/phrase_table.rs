//! Plain-text phrase table.
//!
//! One pair per line: `source ||| target ||| score [||| alignment]`, where
//! `alignment` is a space-separated list of `i-j` points (source offset,
//! target offset). Blank lines and `#` comments are skipped. An empty target
//! deletes the source words.

use std::collections::HashMap;

use phrase_core::{Span, TranslationOption};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("line {line}: expected `source ||| target ||| score [||| alignment]`")]
    Malformed { line: usize },
    #[error("line {line}: empty source phrase")]
    EmptySource { line: usize },
    #[error("line {line}: invalid score {value:?}")]
    InvalidScore { line: usize, value: String },
    #[error("line {line}: invalid alignment point {value:?}")]
    InvalidAlignment { line: usize, value: String },
}

#[derive(Debug, Clone)]
struct Entry {
    target: Vec<String>,
    score: f32,
    alignment: Vec<(usize, usize)>,
}

#[derive(Debug, Default)]
pub struct PhraseTable {
    entries: HashMap<Vec<String>, Vec<Entry>>,
    max_source_len: usize,
    pairs: usize,
}

impl PhraseTable {
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut table = Self::default();
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let raw = raw.trim();
            if raw.is_empty() || raw.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = raw.split("|||").map(str::trim).collect();
            if !(3..=4).contains(&fields.len()) {
                return Err(TableError::Malformed { line });
            }
            let source = words(fields[0]);
            if source.is_empty() {
                return Err(TableError::EmptySource { line });
            }
            let score = fields[2]
                .parse::<f32>()
                .map_err(|_| TableError::InvalidScore {
                    line,
                    value: fields[2].to_string(),
                })?;
            let alignment = match fields.get(3) {
                Some(points) => parse_alignment(points, line)?,
                None => Vec::new(),
            };
            table.max_source_len = table.max_source_len.max(source.len());
            table.pairs += 1;
            table.entries.entry(source).or_default().push(Entry {
                target: words(fields[1]),
                score,
                alignment,
            });
        }
        Ok(table)
    }

    /// Number of phrase pairs.
    pub fn len(&self) -> usize {
        self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    /// Every pair whose source matches a contiguous run of `tokens`, as
    /// options over that span. Alignment is passed through unchecked; the
    /// decoder validates it.
    pub fn options_for_sentence(&self, tokens: &[String]) -> Vec<TranslationOption> {
        let mut options = Vec::new();
        for start in 0..tokens.len() {
            let longest = self.max_source_len.min(tokens.len() - start);
            for len in 1..=longest {
                let Some(entries) = self.entries.get(&tokens[start..start + len]) else {
                    continue;
                };
                let span = Span::new(start, start + len - 1);
                options.extend(entries.iter().map(|e| {
                    TranslationOption::new(span, e.target.clone(), e.score)
                        .with_alignment(e.alignment.clone())
                }));
            }
        }
        options
    }
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

fn parse_alignment(points: &str, line: usize) -> Result<Vec<(usize, usize)>, TableError> {
    points
        .split_whitespace()
        .map(|point| {
            let invalid = || TableError::InvalidAlignment {
                line,
                value: point.to_string(),
            };
            let (src, tgt) = point.split_once('-').ok_or_else(invalid)?;
            Ok((
                src.parse().map_err(|_| invalid())?,
                tgt.parse().map_err(|_| invalid())?,
            ))
        })
        .collect()
}
