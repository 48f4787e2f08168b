use std::fs;
use std::io::{self, BufWriter, Read, Write};

use serde::Serialize;

use phrase_core::batch::{decode_batch, DecodeResult};
use phrase_core::search::{explain, format_text, SearchStats};
use phrase_core::Sentence;

use super::{load_model, Model, ModelArgs};
use crate::ToolError;

/// One decoded sentence in `--json` output.
#[derive(Debug, Serialize)]
pub struct DecodeRecord {
    pub line: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<TranslationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub interrupted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SearchStats>,
}

#[derive(Debug, Serialize)]
pub struct TranslationRecord {
    pub target: String,
    pub score: f32,
    pub alignment: Vec<(usize, usize)>,
}

/// Tokenize and attach options to every input line.
pub fn prepare_sentences(model: &Model, lines: &[&str]) -> Result<Vec<Sentence>, ToolError> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            let options = model.table.options_for_sentence(&tokens);
            model
                .decoder
                .prepare(tokens, options)
                .map_err(|source| ToolError::Option { line: i + 1, source })
        })
        .collect()
}

/// Up to `n` translations of one sentence as a record.
pub fn record(line: usize, result: &DecodeResult, n: usize, with_stats: bool) -> DecodeRecord {
    match result {
        Ok(derivation) => DecodeRecord {
            line,
            translations: derivation
                .alternatives()
                .take(n.max(1))
                .map(|path| TranslationRecord {
                    target: path.target_text(),
                    score: path.score,
                    alignment: path.word_alignment(),
                })
                .collect(),
            error: None,
            interrupted: derivation.interrupted(),
            stats: with_stats.then(|| derivation.stats().clone()),
        },
        Err(failure) => DecodeRecord {
            line,
            translations: Vec::new(),
            error: Some(failure.to_string()),
            interrupted: false,
            stats: None,
        },
    }
}

/// Plain-text lines: the best translation, or `line ||| target ||| score`
/// per alternative when `n > 1`. Failed sentences print an empty line.
pub fn text_lines(record: &DecodeRecord, n: usize) -> Vec<String> {
    if n <= 1 {
        let best = record
            .translations
            .first()
            .map(|t| t.target.clone())
            .unwrap_or_default();
        return vec![best];
    }
    record
        .translations
        .iter()
        .map(|t| format!("{} ||| {} ||| {:.4}", record.line - 1, t.target, t.score))
        .collect()
}

fn read_input(input: Option<&str>) -> Result<String, ToolError> {
    match input {
        Some(path) => fs::read_to_string(path).map_err(|e| ToolError::io(path, e)),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| ToolError::io("<stdin>", e))?;
            Ok(text)
        }
    }
}

pub fn decode_cmd(args: &ModelArgs, input: Option<&str>, n: usize, threads: usize, json: bool) {
    let model = die!(
        load_model(args, |s| {
            if n > 1 {
                s.nbest.enabled = true;
            }
        }),
        "Error: {}"
    );
    let text = die!(read_input(input), "Error: {}");
    let lines: Vec<&str> = text.lines().collect();
    let sentences = die!(prepare_sentences(&model, &lines), "Error: {}");
    let results = die!(
        decode_batch(&model.decoder, &sentences, threads),
        "Error starting decoder threads: {}"
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut failed = 0;
    for (i, result) in results.iter().enumerate() {
        let record = record(i + 1, result, n, json);
        if let Some(error) = &record.error {
            eprintln!("line {}: {error}", i + 1);
            failed += 1;
        }
        if json {
            let line = die!(serde_json::to_string(&record), "Error: {}");
            die!(writeln!(out, "{line}"), "Error writing output: {}");
        } else {
            for line in text_lines(&record, n) {
                die!(writeln!(out, "{line}"), "Error writing output: {}");
            }
        }
    }
    die!(out.flush(), "Error writing output: {}");
    if failed > 0 {
        eprintln!("{failed} of {} sentences failed", results.len());
    }
}

pub fn explain_cmd(args: &ModelArgs, sentence: &str, n: usize, json: bool) {
    let model = die!(
        load_model(args, |s| s.nbest.enabled = true),
        "Error: {}"
    );
    let sentences = die!(prepare_sentences(&model, &[sentence]), "Error: {}");
    let result = explain(&model.decoder, &sentences[0], n);
    if json {
        let out = die!(serde_json::to_string_pretty(&result), "Error: {}");
        println!("{out}");
    } else {
        print!("{}", format_text(&result));
    }
}
