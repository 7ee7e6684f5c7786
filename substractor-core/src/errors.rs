//! errors.rs - Custom error types for the substractor-core library.
//!
//! Matching operations are total and never surface these errors; they are
//! returned only by the explicit compilation entry points, configuration
//! loading, and the rule engine.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

/// All error types produced by `substractor-core`.
///
/// Marked `#[non_exhaustive]` so new variants can be added without breaking
/// downstream matches.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SubstractorError {
    #[error("Failed to compile pattern '{0}': {1}")]
    PatternCompilation(String, regex::Error),

    #[error("Pattern length ({0}) exceeds maximum allowed ({1})")]
    PatternLengthExceeded(usize, usize),

    #[error("Invalid extraction configuration: {0}")]
    Config(String),

    #[error("Extraction rule '{0}' not found")]
    UnknownRule(String),

    #[error("An unexpected I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("A critical system error occurred: {0}")]
    AnyhowWrapper(#[from] anyhow::Error),
}
