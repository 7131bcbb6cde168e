//! Global error types for the Pulse client.
//!
//! All error categories across the client are unified into a single
//! `PulseError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using PulseError.
pub type PulseResult<T> = Result<T, PulseError>;

/// Unified error type covering all error categories in the Pulse client.
#[derive(Error, Debug)]
pub enum PulseError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Network errors --
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// A request or response timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Socket connection error.
    #[error("socket error: {0}")]
    Socket(String),

    /// Socket disconnected unexpectedly.
    #[error("socket disconnected")]
    SocketDisconnected,

    /// Server returned an error response.
    #[error("server error (code {code}): {message}")]
    ServerError {
        /// Application-level status code from the response envelope.
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for PulseError {
    fn from(e: serde_json::Error) -> Self {
        PulseError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PulseError {
    fn from(e: toml::de::Error) -> Self {
        PulseError::Config(e.to_string())
    }
}
