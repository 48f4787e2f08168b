//! Decoder settings loaded from TOML.
//!
//! - `Settings::default()` parses the embedded `default_settings.toml`
//! - `parse_settings_toml(content)` parses and validates a custom file
//!
//! Settings are plain values handed to [`crate::Decoder`]; there is no
//! process-wide instance, so concurrent decoders may run with different
//! configurations.

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub search: SearchSettings,
    pub cube: CubeSettings,
    pub nbest: NBestSettings,
    pub options: OptionSettings,
    pub weights: WeightSettings,
}

impl Default for Settings {
    fn default() -> Self {
        parse_settings_toml(DEFAULT_SETTINGS_TOML).expect("embedded settings TOML must be valid")
    }
}

/// Stack-management strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchAlgorithm {
    /// One histogram/beam stack per coverage count.
    Normal,
    /// Cube pruning over bitmap containers.
    Cube,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub algorithm: SearchAlgorithm,
    pub stack_size: usize,
    pub beam_width: f32,
    pub distortion_limit: i32,
    pub max_phrase_length: usize,
    #[serde(default)]
    pub stack_diversity: usize,
    #[serde(default = "early_discarding_off")]
    pub early_discarding_threshold: f32,
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_hypotheses: usize,
}

fn early_discarding_off() -> f32 {
    f32::NEG_INFINITY
}

impl SearchSettings {
    /// The reordering limit, or `None` when reordering is unbounded (`-1`).
    pub fn distortion_limit(&self) -> Option<usize> {
        usize::try_from(self.distortion_limit).ok()
    }

    /// Margin below a stack's worst score under which expansions are not
    /// built, or `None` when early discarding is off.
    pub fn early_discarding(&self) -> Option<f32> {
        (self.early_discarding_threshold > f32::NEG_INFINITY)
            .then_some(self.early_discarding_threshold)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CubeSettings {
    pub pop_limit: usize,
    #[serde(default)]
    pub diversity: usize,
    pub deterministic: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NBestSettings {
    pub enabled: bool,
    pub size: usize,
    #[serde(default)]
    pub distinct: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionSettings {
    pub max_per_span: usize,
    pub threshold: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightSettings {
    pub phrase: f32,
    pub distortion: f32,
    pub word_penalty: f32,
    pub lm: f32,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! invalid {
        ($field:expr, $reason:expr) => {
            return Err(SettingsError::InvalidValue {
                field: $field.to_string(),
                reason: $reason.to_string(),
            })
        };
    }
    macro_rules! check_positive_usize {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                invalid!(
                    concat!(stringify!($section), ".", stringify!($field)),
                    "must be positive"
                );
            }
        };
    }
    macro_rules! check_margin {
        ($section:ident . $field:ident) => {
            // NaN fails the comparison as well; +inf is allowed and disables the cut.
            if !(s.$section.$field >= 0.0) {
                invalid!(
                    concat!(stringify!($section), ".", stringify!($field)),
                    "must be non-negative"
                );
            }
        };
    }
    macro_rules! check_finite {
        ($section:ident . $field:ident) => {
            if !s.$section.$field.is_finite() {
                invalid!(
                    concat!(stringify!($section), ".", stringify!($field)),
                    "must be finite"
                );
            }
        };
    }

    check_positive_usize!(search.stack_size);
    check_positive_usize!(search.max_phrase_length);
    check_margin!(search.beam_width);
    if s.search.early_discarding_threshold.is_nan() {
        invalid!("search.early_discarding_threshold", "must not be NaN");
    }
    if s.search.distortion_limit < -1 {
        invalid!("search.distortion_limit", "must be -1 (unbounded) or non-negative");
    }

    check_positive_usize!(cube.pop_limit);
    check_positive_usize!(nbest.size);
    check_margin!(options.threshold);

    check_finite!(weights.phrase);
    check_finite!(weights.distortion);
    check_finite!(weights.word_penalty);
    check_finite!(weights.lm);

    Ok(())
}
