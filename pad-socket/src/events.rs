//! Event names and connection state types.
//!
//! Event names form a closed set of reserved lifecycle notifications raised
//! by the client itself, plus an open set of application names that travel
//! over the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of an event that callbacks can subscribe to.
///
/// The lifecycle variants are synthetic: the client raises them and the
/// remote peer never sends them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketEventType {
    /// The first successful connection of this client (`connect`).
    Connect,
    /// A later successful connection after a drop (`reconnect`).
    Reconnect,
    /// The physical connection closed (`disconnect`).
    Disconnect,
    /// A transport or authorization error was observed (`error`).
    Error,
    /// A scheduled reconnect attempt is starting (`reconnect_attempt`).
    ReconnectAttempt,
    /// The attempt ceiling was exceeded (`reconnect_failed`).
    ReconnectFailed,
    /// Application event carried over the wire.
    App(String),
}

impl SocketEventType {
    /// Map a wire or caller-supplied name to an event type.
    pub fn from_name(s: &str) -> Self {
        match s {
            "connect" => Self::Connect,
            "reconnect" => Self::Reconnect,
            "disconnect" => Self::Disconnect,
            "error" => Self::Error,
            "reconnect_attempt" => Self::ReconnectAttempt,
            "reconnect_failed" => Self::ReconnectFailed,
            other => Self::App(other.to_string()),
        }
    }

    /// The name as it appears to subscribers.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connect => "connect",
            Self::Reconnect => "reconnect",
            Self::Disconnect => "disconnect",
            Self::Error => "error",
            Self::ReconnectAttempt => "reconnect_attempt",
            Self::ReconnectFailed => "reconnect_failed",
            Self::App(s) => s.as_str(),
        }
    }

    /// Whether this name is reserved for client-generated lifecycle events.
    pub fn is_synthetic(&self) -> bool {
        !matches!(self, Self::App(_))
    }

    /// All reserved lifecycle names.
    pub fn synthetic_names() -> &'static [&'static str] {
        &[
            "connect",
            "reconnect",
            "disconnect",
            "error",
            "reconnect_attempt",
            "reconnect_failed",
        ]
    }
}

impl From<&str> for SocketEventType {
    fn from(s: &str) -> Self {
        Self::from_name(s)
    }
}

impl From<String> for SocketEventType {
    fn from(s: String) -> Self {
        Self::from_name(&s)
    }
}

impl std::fmt::Display for SocketEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of the physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Not connected and not trying to connect.
    Disconnected,
    /// An attempt (pre-check and socket open) is in flight.
    Connecting,
    /// Connected and exchanging frames.
    Connected,
    /// Connection lost, a reconnect is scheduled.
    Reconnecting,
    /// Terminal until the caller forces a reconnect.
    Failed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Read-only snapshot of a client's connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// Consecutive reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
    /// Most recent connection-level failure, if any.
    pub last_error: Option<String>,
    /// When the current connection was opened.
    pub connected_at: Option<DateTime<Utc>>,
    /// Messages accepted by `emit` but not yet written to a link.
    pub queued_messages: usize,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            reconnect_attempts: 0,
            last_error: None,
            connected_at: None,
            queued_messages: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parsing() {
        assert_eq!(SocketEventType::from_name("connect"), SocketEventType::Connect);
        assert_eq!(
            SocketEventType::from_name("reconnect_failed"),
            SocketEventType::ReconnectFailed
        );
        assert_eq!(
            SocketEventType::from_name("settings"),
            SocketEventType::App("settings".into())
        );
    }

    #[test]
    fn test_synthetic_names_roundtrip() {
        for name in SocketEventType::synthetic_names() {
            let event = SocketEventType::from_name(name);
            assert!(event.is_synthetic(), "{name} should be reserved");
            assert_eq!(event.as_str(), *name);
        }
        assert!(!SocketEventType::from("load").is_synthetic());
    }

    #[test]
    fn test_connection_status_display() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
        assert_eq!(ConnectionStatus::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_default_state() {
        let state = ConnectionState::default();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert_eq!(state.reconnect_attempts, 0);
        assert!(!state.is_connected());
    }

    #[test]
    fn test_state_serializes_lowercase_status() {
        let json = serde_json::to_value(ConnectionState::default()).unwrap();
        assert_eq!(json["status"], "disconnected");
    }
}
