/// Unwrap a result or print the error and exit with status 1.
macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            std::process::exit(1);
        })
    };
}

pub mod decode_ops;
pub mod settings_ops;

use std::fs;

use phrase_core::feature::{FeatureSet, NgramModel};
use phrase_core::settings::{parse_settings_toml, SearchAlgorithm, Settings};
use phrase_core::Decoder;
use tracing::info;

use crate::{PhraseTable, ToolError};

/// Model files shared by `decode` and `explain`.
#[derive(Debug, clap::Args)]
pub struct ModelArgs {
    /// Phrase table (`source ||| target ||| score [||| alignment]`)
    pub table: String,
    /// Settings TOML (defaults to the embedded settings)
    #[arg(long)]
    pub settings: Option<String>,
    /// N-gram language model (`ngram<TAB>logprob[<TAB>backoff]`)
    #[arg(long)]
    pub lm: Option<String>,
    /// Language model order
    #[arg(long, default_value = "3")]
    pub lm_order: usize,
    /// Use cube pruning regardless of the settings file
    #[arg(long)]
    pub cube: bool,
}

pub struct Model {
    pub decoder: Decoder,
    pub table: PhraseTable,
}

fn read(path: &str) -> Result<String, ToolError> {
    fs::read_to_string(path).map_err(|e| ToolError::io(path, e))
}

/// Load settings, phrase table and optional language model.
///
/// `tweak` runs on the settings before the decoder is built.
pub fn load_model(
    args: &ModelArgs,
    tweak: impl FnOnce(&mut Settings),
) -> Result<Model, ToolError> {
    let mut settings = match &args.settings {
        Some(path) => parse_settings_toml(&read(path)?)?,
        None => Settings::default(),
    };
    if args.cube {
        settings.search.algorithm = SearchAlgorithm::Cube;
    }
    tweak(&mut settings);

    let table = PhraseTable::parse(&read(&args.table)?)?;
    info!(pairs = table.len(), path = %args.table, "phrase table loaded");

    let mut features = FeatureSet::from_weights(&settings.weights);
    if let Some(path) = &args.lm {
        let model = NgramModel::parse(&read(path)?, args.lm_order, settings.weights.lm)?;
        info!(ngrams = model.len(), order = model.order(), "language model loaded");
        features.push(model);
    }

    Ok(Model {
        decoder: Decoder::new(settings, features),
        table,
    })
}
