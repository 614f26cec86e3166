//! Error types for the shard cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading through the cache.
///
/// The type is `Clone` because a single load outcome is handed to every
/// caller that was coalesced onto it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caller passed an unusable argument (e.g. an empty key)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Loader reported that the key does not exist
    #[error("Key not found: {key}")]
    NotFound { key: String },

    /// Loader failed for any other reason
    #[error("Upstream load failed: {0}")]
    Upstream(String),

    /// Remote fetch from the owning peer failed
    #[error("Peer {peer} unavailable: {reason}")]
    PeerUnavailable { peer: String, reason: String },

    // =========================================================================
    // Setup Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Request does not match `<base_path><namespace>/<key>`
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Request names a namespace that was never registered
    #[error("No such namespace: {0}")]
    UnknownNamespace(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a loader-side "key does not exist" error
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound { key: key.into() }
    }

    /// Shorthand for a generic loader failure
    pub fn upstream(reason: impl std::fmt::Display) -> Self {
        Error::Upstream(reason.to_string())
    }

    /// HTTP status a transport should answer with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidArgument(_) | Error::MalformedRequest(_) => 400,
            Error::NotFound { .. } | Error::UnknownNamespace(_) => 404,
            _ => 500,
        }
    }
}
