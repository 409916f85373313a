//! Error types for agstat
//!
//! The windowing engine itself never fails: every "cannot compute" case is an
//! `Option`. Errors come from the plumbing around it (file access, parsing,
//! pricing fetches and user input) and all of them funnel into
//! [`AgstatError`].
//!
//! # Example
//!
//! ```
//! use agstat_core::error::{AgstatError, Result};
//!
//! fn read_log() -> Result<String> {
//!     // io::Error converts into AgstatError::Io
//!     Ok(std::fs::read_to_string("does-not-exist.jsonl")?)
//! }
//!
//! assert!(matches!(read_log(), Err(AgstatError::Io(_))));
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ModelName;

/// Main error type for agstat operations
#[derive(Error, Debug)]
pub enum AgstatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// None of the candidate data directories for a provider exist
    #[error("No {provider} data directory found")]
    NoDataDirectory {
        /// Provider name, e.g. "Claude" or "Codex"
        provider: &'static str,
    },

    #[error("Unknown model: {0}")]
    UnknownModel(ModelName),

    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Token limit was neither a positive integer nor `max`
    #[error("Invalid token limit: {0}")]
    InvalidTokenLimit(String),

    #[error("Invalid session duration: {0}")]
    InvalidSessionDuration(String),

    /// Parse error with file context
    #[error("Parse error in {file}: {error}")]
    Parse { file: PathBuf, error: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, AgstatError>;
