use serde::Serialize;

use crate::feature::ExtensionContext;
use crate::options::Span;

use super::hypothesis::HypId;
use super::stats::SearchStats;
use super::{Decoder, Derivation, Sentence};

/// Full diagnostic result for a single sentence.
#[derive(Debug, Serialize)]
pub struct ExplainResult {
    pub source: Vec<String>,
    /// `future_costs[i][k]` is the estimate for `[i, i + k]`.
    pub future_costs: Vec<Vec<Option<f32>>>,
    pub options: Vec<ExplainOption>,
    pub paths: Vec<ExplainPath>,
    pub stats: Option<SearchStats>,
    pub interrupted: bool,
    pub failure: Option<String>,
}

/// A translation option as the search saw it.
#[derive(Debug, Serialize)]
pub struct ExplainOption {
    pub span: Span,
    pub target: String,
    pub score: f32,
    pub future_score: f32,
}

/// A complete translation with per-segment feature scores.
#[derive(Debug, Serialize)]
pub struct ExplainPath {
    pub target: String,
    pub score: f32,
    pub segments: Vec<ExplainSegment>,
}

#[derive(Debug, Serialize)]
pub struct ExplainSegment {
    pub source: Span,
    pub source_text: String,
    pub target: String,
    /// Contribution of each feature, in registration order.
    pub features: Vec<(String, f32)>,
    /// Sum of `features`.
    pub score: f32,
    /// Future cost of what was left uncovered after this segment.
    pub future_score: f32,
}

/// Decode `sentence` and capture the option table, future costs and the
/// `n` best translations with their feature breakdown.
pub fn explain(decoder: &Decoder, sentence: &Sentence, n: usize) -> ExplainResult {
    let table = sentence.options();
    let options = table
        .spans()
        .flat_map(|span| table.options_for(span))
        .map(|o| ExplainOption {
            span: o.span,
            target: o.target_text(),
            score: o.score,
            future_score: o.future_score(),
        })
        .collect();

    let mut result = ExplainResult {
        source: sentence.tokens().to_vec(),
        future_costs: sentence.future_costs().rows(),
        options,
        paths: Vec::new(),
        stats: None,
        interrupted: false,
        failure: None,
    };

    match decoder.decode(sentence) {
        Ok(derivation) => {
            let mut alternatives = derivation.alternatives();
            while result.paths.len() < n {
                let Some((nodes, score)) = alternatives.next_nodes() else {
                    break;
                };
                result
                    .paths
                    .push(explain_path(decoder, sentence, &derivation, &nodes, score));
            }
            result.stats = Some(derivation.stats().clone());
            result.interrupted = derivation.interrupted();
        }
        Err(failure) => result.failure = Some(failure.to_string()),
    }
    result
}

fn explain_path(
    decoder: &Decoder,
    sentence: &Sentence,
    derivation: &Derivation,
    nodes: &[HypId],
    score: f32,
) -> ExplainPath {
    let graph = derivation.graph();
    let table = derivation.options();
    let mut segments = Vec::with_capacity(nodes.len());
    for (k, &id) in nodes.iter().enumerate() {
        let hyp = &graph[id];
        // After a deviation the stored parent may differ from the node the
        // path actually came through; both share the recombination state.
        let prev = match k {
            0 => hyp.prev(),
            _ => Some(nodes[k - 1]),
        };
        let (Some(option_id), Some(prev)) = (hyp.option(), prev) else {
            continue;
        };
        let option = table.get(option_id);
        let parent = &graph[prev];
        let ctx = ExtensionContext {
            source_len: sentence.len(),
            prev_end: parent.last_end(),
            option,
            history: parent.context(),
            completes: hyp.words_covered() == sentence.len(),
        };
        let features = decoder.features().breakdown(&ctx);
        segments.push(ExplainSegment {
            source: option.span,
            source_text: sentence.tokens()[option.span.start..=option.span.end].join(" "),
            target: option.target_text(),
            score: features.iter().map(|(_, s)| s).sum(),
            features,
            future_score: hyp.future_score(),
        });
    }
    ExplainPath {
        target: segments
            .iter()
            .map(|s| s.target.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        score,
        segments,
    }
}

fn fmt_score(score: Option<f32>) -> String {
    match score {
        Some(s) => format!("{s:.3}"),
        None => "-inf".to_string(),
    }
}

/// Format an ExplainResult as human-readable text.
pub fn format_text(result: &ExplainResult) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== Source \"{}\" ({} words, {} options) ===\n",
        result.source.join(" "),
        result.source.len(),
        result.options.len(),
    ));
    for option in &result.options {
        out.push_str(&format!(
            "  {:<8} {:<24} score={:<9.3} future={:.3}\n",
            option.span.to_string(),
            option.target,
            option.score,
            option.future_score,
        ));
    }

    out.push_str("\n=== Future costs ===\n");
    for (start, row) in result.future_costs.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|c| fmt_score(*c)).collect();
        out.push_str(&format!("  from {:<3} {}\n", start, cells.join(" ")));
    }

    if let Some(failure) = &result.failure {
        out.push_str(&format!("\nDecoding failed: {failure}\n"));
        return out;
    }

    out.push_str(&format!("\n=== Paths ({}) ===\n", result.paths.len()));
    for (i, path) in result.paths.iter().enumerate() {
        out.push_str(&format!(
            "\n  #{:<2} {}  (score={:.3})\n",
            i + 1,
            path.target,
            path.score
        ));
        for (j, seg) in path.segments.iter().enumerate() {
            let features: Vec<String> = seg
                .features
                .iter()
                .map(|(name, s)| format!("{name}={s:.3}"))
                .collect();
            out.push_str(&format!(
                "    seg[{}]: {:<8} {} -> {}  {}  future={:.3}\n",
                j,
                seg.source.to_string(),
                seg.source_text,
                seg.target,
                features.join(" "),
                seg.future_score,
            ));
        }
    }

    if let Some(stats) = &result.stats {
        out.push_str(&format!(
            "\n=== Search ===\n  created={} recombined={} pruned={} discarded={} early_discarded={} rejected={} stacks={:?}{}\n",
            stats.created,
            stats.recombined,
            stats.pruned,
            stats.discarded,
            stats.early_discarded,
            stats.rejected,
            stats.stack_sizes,
            if result.interrupted { " (interrupted)" } else { "" },
        ));
    }
    out
}
