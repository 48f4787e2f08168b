pub mod commands;
pub mod phrase_table;

use phrase_core::feature::LanguageModelError;
use phrase_core::settings::SettingsError;
use phrase_core::OptionError;

pub use phrase_table::{PhraseTable, TableError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("phrase table: {0}")]
    Table(#[from] TableError),
    #[error("settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("language model: {0}")]
    LanguageModel(#[from] LanguageModelError),
    #[error("sentence {line}: {source}")]
    Option {
        line: usize,
        #[source]
        source: OptionError,
    },
}

impl ToolError {
    pub fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}
