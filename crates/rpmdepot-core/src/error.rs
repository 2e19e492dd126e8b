//! Core error types shared across rpmdepot crates.

use thiserror::Error;

/// Errors raised while reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("missing required configuration key {0}")]
    MissingKey(&'static str),
}
