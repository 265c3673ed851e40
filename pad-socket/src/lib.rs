//! Pad Socket - resilient WebSocket client for Etherpad servers.
//!
//! This crate provides the connection manager that handles:
//! - A single physical connection per client, opened lazily or on demand
//! - Automatic reconnection with bounded exponential backoff and jitter
//! - Token pre-check for the admin socket, with credential reset on rejection
//! - Ordered queueing of messages emitted while offline
//! - Name-keyed callback dispatch with per-callback panic isolation

pub mod auth;
pub mod backoff;
pub mod client;
pub mod codec;
pub mod endpoint;
pub mod events;
mod manager;
pub mod queue;
pub mod registry;
pub mod transport;

// Re-export key types
pub use auth::{AuthStatus, Authorizer, HttpAuthorizer, MemorySession, SessionStore};
pub use backoff::{BackoffScheduler, ReconnectConfig, ScheduleOutcome};
pub use client::{SocketClient, SocketClientBuilder};
pub use codec::Frame;
pub use endpoint::{Endpoint, Route};
pub use events::{ConnectionState, ConnectionStatus, SocketEventType};
pub use queue::{FlushOutcome, OutboundQueue, QueuedMessage};
pub use registry::{Callback, EventRegistry, SubscriptionId};
pub use transport::{Connector, FrameSink, FrameStream, Link, TransportEvent, WebSocketConnector};
