//! Global error types for padsock.
//!
//! All error categories across the workspace are unified into a single
//! `PadError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using PadError.
pub type PadResult<T> = Result<T, PadError>;

/// Unified error type covering all error categories in padsock.
#[derive(Error, Debug)]
pub enum PadError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Network errors --
    /// HTTP request failed (authorization pre-check).
    #[error("http error: {0}")]
    Http(String),

    /// WebSocket connection or send error.
    #[error("socket error: {0}")]
    Socket(String),

    /// The socket was closed while an operation needed it.
    #[error("socket disconnected")]
    SocketDisconnected,

    /// The server rejected the bearer token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    // -- Wire errors --
    /// An inbound or outbound frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// An event name was empty or reserved for lifecycle notifications.
    #[error("invalid event name: {0}")]
    InvalidEvent(String),

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

impl PadError {
    /// Whether the failure is worth retrying with backoff.
    ///
    /// Authorization and configuration problems are terminal for the session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PadError::Http(_) | PadError::Socket(_) | PadError::SocketDisconnected | PadError::Io(_)
        )
    }
}

impl From<serde_json::Error> for PadError {
    fn from(e: serde_json::Error) -> Self {
        PadError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PadError {
    fn from(e: toml::de::Error) -> Self {
        PadError::Config(e.to_string())
    }
}
