//! Error types for autodj-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for autodj-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Output stream could not be started
    #[error("Playback error: {0}")]
    Playback(String),

    /// Track could not be located locally or downloaded
    #[error("Track not resolved: {0}")]
    Resolve(String),

    /// Download tool failed or timed out
    #[error("Download error: {0}")]
    Download(String),

    /// Fallback refill request failed
    #[error("Refill error: {0}")]
    Refill(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Outbound HTTP errors
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<autodj_common::Error> for Error {
    fn from(err: autodj_common::Error) -> Self {
        match err {
            autodj_common::Error::Database(e) => Error::Database(e),
            autodj_common::Error::Io(e) => Error::Io(e),
            autodj_common::Error::Config(msg) => Error::Config(msg),
            autodj_common::Error::NotFound(msg) => Error::Resolve(msg),
        }
    }
}

/// Convenience Result type using autodj-player Error
pub type Result<T> = std::result::Result<T, Error>;
