//! Error types for tldr.
//!
//! Library crates use [`TldrError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all tldr operations.
#[derive(Debug, thiserror::Error)]
pub enum TldrError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while downloading the page archive.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The downloaded payload is not a readable zip archive.
    #[error("archive error: {0}")]
    Archive(String),

    /// Database transaction or query failure.
    #[error("store error: {0}")]
    Store(String),

    /// A stored page blob could not be decompressed or decoded.
    #[error("corrupt page {partition}/{command}: {reason}")]
    Corrupt {
        partition: String,
        command: String,
        reason: String,
    },

    /// The requested page is in neither the platform nor the common partition.
    #[error("{command} documentation is not available")]
    NotFound { command: String },

    /// The page cache has never been populated.
    #[error("the database is empty")]
    EmptyDatabase,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid user input (flags, platform names, ...).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TldrError>;

impl TldrError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Whether this is an expected lookup outcome rather than a fault.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::EmptyDatabase)
    }
}
