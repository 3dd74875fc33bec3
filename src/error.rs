//! Error types for Chalk Analyzer
//!
//! The analysis core never fails; these errors only come from the boundary layer
//! (payload parsing, validation, configuration and encoding).

use thiserror::Error;

/// Errors that can occur around an analysis call
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Failed to parse session payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Invalid threshold configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
