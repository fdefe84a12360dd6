//! Error types for LeadScout.
//!
//! Library crates use [`LeadScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LeadScout operations.
///
/// Per-lead lookup failures are not errors: they surface as row outcomes.
/// Anything returned as `Err` from a run is fatal to that run.
#[derive(Debug, thiserror::Error)]
pub enum LeadScoutError {
    /// Configuration loading or validation error (including missing credentials).
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a provider.
    #[error("network error: {0}")]
    Network(String),

    /// Provider response or input parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Checkpoint or final dataset write failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Profile scraper provider error.
    #[error("scraper error: {0}")]
    Scraper(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input data validation error (missing columns, empty header, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadScoutError>;

impl LeadScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LeadScoutError::config("batch_size must be at least 1");
        assert_eq!(err.to_string(), "config error: batch_size must be at least 1");

        let err = LeadScoutError::validation("missing column 'Person - Name'");
        assert!(err.to_string().contains("Person - Name"));

        let err = LeadScoutError::Storage("disk full".into());
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn io_error_keeps_path() {
        let err = LeadScoutError::io(
            "/tmp/leads.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("leads.csv"));
        assert!(msg.contains("gone"));
    }
}
