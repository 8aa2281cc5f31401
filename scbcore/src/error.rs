//! Error types for the polling engine

/// Result type alias for polling engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while polling a source
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Upstream fetch failed (network, 5xx, decode)
    #[error("fetch from '{source_label}' failed: {message}")]
    Fetch { source_label: String, message: String },

    /// The dispatcher raised instead of absorbing a client failure
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// Cooperative shutdown observed mid-cycle
    #[error("polling cancelled")]
    Cancelled,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch error for the given source label
    pub fn fetch(source: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            source_label: source.into(),
            message: message.to_string(),
        }
    }

    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
