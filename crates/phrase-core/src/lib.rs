pub mod batch;
pub mod coverage;
pub mod feature;
pub mod future_cost;
pub mod options;
pub mod search;
pub mod settings;

pub use options::{OptionError, OptionTable, Span, TranslationOption};
pub use search::{DecodeFailure, Decoder, Derivation, Sentence};
pub use settings::Settings;
