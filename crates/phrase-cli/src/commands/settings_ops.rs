use std::fs;

use phrase_core::settings::{default_toml, parse_settings_toml, SearchAlgorithm, Settings};
use tracing::info;

/// Write the embedded default settings to `output`, or to stdout.
pub fn settings_export(output: Option<&str>) {
    match output {
        Some(path) => {
            die!(fs::write(path, default_toml()), "Error writing {path}: {}");
            info!(path, "default settings written");
        }
        None => print!("{}", default_toml()),
    }
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let settings = die!(parse_settings_toml(&content), "Error: {}");
    println!("OK: {file}");
    for line in summary(&settings) {
        println!("  {line}");
    }
    for note in inert_settings(&settings) {
        eprintln!("note: {note}");
    }
}

fn algorithm_name(algorithm: SearchAlgorithm) -> &'static str {
    match algorithm {
        SearchAlgorithm::Normal => "normal",
        SearchAlgorithm::Cube => "cube",
    }
}

/// One line per section with the values that shape the search.
pub fn summary(s: &Settings) -> Vec<String> {
    let distortion = s
        .search
        .distortion_limit()
        .map_or_else(|| "none".to_string(), |limit| limit.to_string());
    let early = s
        .search
        .early_discarding()
        .map_or_else(|| "off".to_string(), |threshold| threshold.to_string());
    vec![
        format!(
            "search: algorithm={} stack_size={} beam_width={} distortion_limit={} early_discarding={}",
            algorithm_name(s.search.algorithm),
            s.search.stack_size,
            s.search.beam_width,
            distortion,
            early
        ),
        format!(
            "cube: pop_limit={} diversity={} deterministic={}",
            s.cube.pop_limit, s.cube.diversity, s.cube.deterministic
        ),
        format!(
            "nbest: enabled={} size={} distinct={}",
            s.nbest.enabled, s.nbest.size, s.nbest.distinct
        ),
        format!(
            "options: max_per_span={} threshold={}",
            s.options.max_per_span, s.options.threshold
        ),
        format!(
            "weights: phrase={} distortion={} word_penalty={} lm={}",
            s.weights.phrase, s.weights.distortion, s.weights.word_penalty, s.weights.lm
        ),
    ]
}

/// Settings that parse but have no effect in combination with the others.
pub fn inert_settings(s: &Settings) -> Vec<String> {
    let mut notes = Vec::new();
    match s.search.algorithm {
        SearchAlgorithm::Cube if s.search.early_discarding().is_some() => {
            notes.push("search.early_discarding_threshold is ignored by cube pruning".to_string());
        }
        SearchAlgorithm::Normal if s.cube.diversity > 0 => {
            notes.push("cube.diversity only applies to cube pruning".to_string());
        }
        _ => {}
    }
    if s.nbest.distinct && !s.nbest.enabled {
        notes.push("nbest.distinct has no effect while nbest.enabled = false".to_string());
    }
    notes
}
