//! Error types for Sheetwright.
//!
//! Library crates use [`SheetwrightError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all Sheetwright operations.
#[derive(Debug, thiserror::Error)]
pub enum SheetwrightError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Caller-supplied input is malformed (source reference, row window, layout).
    #[error("bad input: {message}")]
    BadInput { message: String },

    /// A worksheet, column or other addressed resource does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// An upstream service could not be reached or answered with a server error.
    #[error("upstream gateway error: {0}")]
    UpstreamGateway(String),

    /// Network/HTTP transport error.
    #[error("network error: {0}")]
    Network(String),

    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    /// The upstream service refused the request (bad request, auth, rate limit).
    #[error("upstream rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Generation backend error that is not a rejection or timeout.
    #[error("generation error: {0}")]
    Generation(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Output validation error (schema mismatch, wrong cardinality, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SheetwrightError>;

/// Coarse classification surfaced to callers of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadInput,
    UpstreamGateway,
    Config,
    /// Everything that is only ever reported per row.
    Row,
}

impl SheetwrightError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a bad-input error from any displayable message.
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput {
            message: msg.into(),
        }
    }

    /// Create a not-found error from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify the error for run-level reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::BadInput { .. } => ErrorKind::BadInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UpstreamGateway(_) | Self::Network(_) => ErrorKind::UpstreamGateway,
            _ => ErrorKind::Row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SheetwrightError::config("unknown task type 'bogus'");
        assert_eq!(err.to_string(), "config error: unknown task type 'bogus'");

        let err = SheetwrightError::timeout("generation", Duration::from_secs(300));
        assert_eq!(err.to_string(), "generation timed out after 300s");

        let err = SheetwrightError::Rejected {
            status: 429,
            message: "rate limited".into(),
        };
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn kinds_separate_fatal_from_row_errors() {
        assert_eq!(SheetwrightError::not_found("sheet 4").kind(), ErrorKind::NotFound);
        assert_eq!(SheetwrightError::bad_input("url").kind(), ErrorKind::BadInput);
        assert_eq!(
            SheetwrightError::UpstreamGateway("502".into()).kind(),
            ErrorKind::UpstreamGateway
        );
        assert_eq!(SheetwrightError::config("x").kind(), ErrorKind::Config);
        assert_eq!(SheetwrightError::validation("3 reviews expected").kind(), ErrorKind::Row);
        assert_eq!(
            SheetwrightError::timeout("generation", Duration::from_secs(1)).kind(),
            ErrorKind::Row
        );
    }
}
