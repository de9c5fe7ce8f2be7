//! Error types for preview bookkeeping.

use thiserror::Error;

/// Errors that can occur while managing the preview cache.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// A chunk list property held something other than frame numbers.
    #[error("invalid chunk list entry '{0}'")]
    InvalidChunkList(String),

    /// The stored render date is not RFC 3339.
    #[error("invalid preview date '{value}': {source}")]
    InvalidDate {
        value: String,
        source: chrono::ParseError,
    },

    /// Cache directory could not be prepared.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for preview operations.
pub type PreviewResult<T> = std::result::Result<T, PreviewError>;
