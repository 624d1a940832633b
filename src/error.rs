//! Error types for score loading, analysis and transformation
//!
//! Structural failures are fatal and carry enough context (position, selector,
//! path) for the caller to report them. Nothing in the crate downgrades one of
//! these into a partial result.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for every fallible operation in the crate
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Input could not be structurally decoded (not well-formed XML, wrong root, no parts)
    #[error("malformed score: {reason}{}", position.as_ref().map(|p| format!(" (at {})", p)).unwrap_or_default())]
    MalformedScore {
        reason: String,
        position: Option<String>,
    },

    /// Analysis requested on a score without usable pitched content
    #[error("insufficient data for analysis: {0}")]
    InsufficientData(String),

    /// Strict instrument change matched no part
    #[error("no part matches selector {selector}")]
    PartNotFound { selector: String },

    /// Replacement instrument is unusable (e.g. blank name)
    #[error("invalid instrument: {0}")]
    InvalidInstrument(String),

    /// Persistence failure
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// MIDI encoding failed
    #[error("midi write error: {0}")]
    Midi(String),

    /// Settings could not be loaded or are out of range
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScoreError {
    /// Shorthand for a malformed-score error without a known position
    pub fn malformed(reason: impl Into<String>) -> Self {
        ScoreError::MalformedScore {
            reason: reason.into(),
            position: None,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoreError>;
