//! Top-level error types.
//!
//! Only the fatal case from spec §7 ("input unavailable") is represented as
//! a `Result::Err` anywhere in this crate: every other failure mode
//! (frame-level corruption, message-level decode failure, book-level
//! inconsistency) is recoverable by construction and is reported through
//! `tracing::warn!` instead, per the taxonomy in spec §7.

use std::fmt;
use std::path::PathBuf;

/// Errors that can stop the engine from starting.
#[derive(Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// The configured input source could not be opened.
    InputUnavailable {
        path: PathBuf,
        message: String,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InputUnavailable { path, message } => {
                write!(f, "cannot open input source {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for EngineError {}
