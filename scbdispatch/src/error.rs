//! Error types for scrobble clients

/// Result type alias for scrobble client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by downstream scrobble clients
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A client rejected or failed an operation
    #[error("client '{id}' failed: {message}")]
    Client { id: String, message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a client error for the given client id
    pub fn client(id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Client {
            id: id.into(),
            message: message.to_string(),
        }
    }
}
