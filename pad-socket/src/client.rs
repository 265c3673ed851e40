//! Caller-facing socket handle.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, Instrument};
use uuid::Uuid;

use pad_core::config::AppConfig;
use pad_core::error::{PadError, PadResult};

use crate::auth::{Authorizer, HttpAuthorizer, MemorySession, SessionStore};
use crate::backoff::ReconnectConfig;
use crate::endpoint::Endpoint;
use crate::events::{ConnectionState, ConnectionStatus, SocketEventType};
use crate::manager::{Command, ManagerParts, SocketManager};
use crate::queue::QueuedMessage;
use crate::registry::{EventRegistry, SubscriptionId};
use crate::transport::{Connector, WebSocketConnector};

/// Handle to one resilient socket connection.
///
/// Cheap to clone; all clones drive the same connection. The connection is
/// torn down by [`SocketClient::shutdown`] or once every clone is dropped.
#[derive(Clone)]
pub struct SocketClient {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    registry: Arc<EventRegistry>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl SocketClient {
    pub fn builder(endpoint: Endpoint) -> SocketClientBuilder {
        SocketClientBuilder::new(endpoint)
    }

    /// Identifier used in this client's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Start connecting. No-op while connecting, connected or reconnecting.
    pub fn connect(&self) -> PadResult<()> {
        self.send(Command::Connect)
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Queued messages stay queued until the next `connect`.
    pub fn disconnect(&self) -> PadResult<()> {
        self.send(Command::Disconnect)
    }

    /// Drop the current link (if any) and try again immediately with a
    /// fresh backoff. Also the way out of the `failed` state.
    pub fn force_reconnect(&self) -> PadResult<()> {
        self.send(Command::ForceReconnect)
    }

    /// Send an application event, queueing it until the link is open.
    ///
    /// Messages are delivered in call order. Reserved lifecycle names are
    /// rejected.
    pub fn emit(&self, event: &str, payload: Option<Value>) -> PadResult<()> {
        if event.is_empty() {
            return Err(PadError::InvalidEvent("event name is empty".into()));
        }
        if SocketEventType::from_name(event).is_synthetic() {
            return Err(PadError::InvalidEvent(format!(
                "{event} is reserved for lifecycle notifications"
            )));
        }
        self.send(Command::Emit(QueuedMessage::new(event, payload)))
    }

    /// Subscribe to every future dispatch of `event`.
    pub fn on<F>(&self, event: impl Into<SocketEventType>, callback: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.registry.on(event, callback)
    }

    /// Subscribe to the next dispatch of `event` only.
    pub fn once<F>(&self, event: impl Into<SocketEventType>, callback: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.registry.once(event, callback)
    }

    /// Remove subscriptions; see [`EventRegistry::off`].
    pub fn off(&self, event: Option<&SocketEventType>, id: Option<SubscriptionId>) -> usize {
        self.registry.off(event, id)
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// Snapshot of the current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Wait until the published status equals `status`.
    ///
    /// Short-lived states can be skipped by the watch channel; subscribe to
    /// lifecycle events when every transition matters.
    pub async fn wait_for_status(&self, status: ConnectionStatus) -> PadResult<ConnectionState> {
        self.wait_for_state(|state| state.status == status).await
    }

    /// Wait until the published state satisfies `predicate`.
    pub async fn wait_for_state<F>(&self, predicate: F) -> PadResult<ConnectionState>
    where
        F: FnMut(&ConnectionState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(predicate)
            .await
            .map_err(|_| PadError::Internal("socket driver stopped".into()))?;
        Ok(state.clone())
    }

    /// Stop the driver. Other clones become inert.
    pub fn shutdown(&self) {
        // Already stopped is fine.
        let _ = self.commands.send(Command::Shutdown);
    }

    fn send(&self, command: Command) -> PadResult<()> {
        self.commands
            .send(command)
            .map_err(|_| PadError::Internal("socket driver stopped".into()))
    }
}

impl std::fmt::Debug for SocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketClient")
            .field("id", &self.id)
            .field("state", &*self.state_rx.borrow())
            .finish()
    }
}

/// Builder for [`SocketClient`].
pub struct SocketClientBuilder {
    endpoint: Endpoint,
    reconnect: ReconnectConfig,
    connector: Option<Arc<dyn Connector>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    session: Option<Arc<dyn SessionStore>>,
    auto_connect: bool,
}

impl SocketClientBuilder {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            reconnect: ReconnectConfig::default(),
            connector: None,
            authorizer: None,
            session: None,
            auto_connect: true,
        }
    }

    /// Builder for the endpoint, backoff and pre-check described by `config`.
    ///
    /// `session` supplies the bearer token and receives reload requests.
    pub fn from_config(config: &AppConfig, session: Arc<dyn SessionStore>) -> PadResult<Self> {
        let endpoint = Endpoint::from_config(&config.server)?;
        let authorizer: Option<Arc<dyn Authorizer>> =
            if endpoint.requires_token() && config.server.validate_token {
                Some(Arc::new(HttpAuthorizer::new(
                    endpoint.clone(),
                    config.server.validate_path.clone(),
                )?))
            } else {
                None
            };

        let mut builder = Self::new(endpoint)
            .with_reconnect_config(ReconnectConfig::from(&config.reconnect))
            .with_session(session);
        builder.authorizer = authorizer;
        Ok(builder)
    }

    pub fn with_reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Replace the `tokio-tungstenite` connector.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Run `authorizer` before every connection attempt on the token route.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn with_session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Whether `build` starts connecting right away. Defaults to `true`.
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Spawn the connection driver and return its handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> PadResult<SocketClient> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PadError::Internal(format!("no tokio runtime: {e}")))?;

        let id = Uuid::new_v4();
        let registry = Arc::new(EventRegistry::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());

        let parts = ManagerParts {
            endpoint: self.endpoint,
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(WebSocketConnector::new())),
            authorizer: self.authorizer,
            session: self
                .session
                .unwrap_or_else(|| Arc::new(MemorySession::anonymous())),
            registry: Arc::clone(&registry),
            reconnect: self.reconnect,
        };
        let manager = SocketManager::new(parts, state_tx, command_rx);
        runtime.spawn(
            manager
                .run()
                .instrument(tracing::info_span!("socket", client = %id)),
        );
        debug!(client = %id, "socket client created");

        let client = SocketClient {
            id,
            commands: command_tx,
            registry,
            state_rx,
        };
        if self.auto_connect {
            client.connect()?;
        }
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> SocketClient {
        let endpoint = Endpoint::channel("http://127.0.0.1:9", "pad").unwrap();
        SocketClient::builder(endpoint)
            .with_auto_connect(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let endpoint = Endpoint::channel("http://127.0.0.1:9", "pad").unwrap();
        let result = SocketClient::builder(endpoint).build();
        assert!(matches!(result, Err(PadError::Internal(_))));
    }

    #[tokio::test]
    async fn test_emit_rejects_reserved_and_empty_names() {
        let client = offline_client();
        for name in SocketEventType::synthetic_names() {
            assert!(matches!(
                client.emit(name, None),
                Err(PadError::InvalidEvent(_))
            ));
        }
        assert!(matches!(client.emit("", None), Err(PadError::InvalidEvent(_))));
        assert!(client.emit("load", None).is_ok());
    }

    #[tokio::test]
    async fn test_initial_state_is_disconnected() {
        let client = offline_client();
        let state = client.connection_state();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert_eq!(state.reconnect_attempts, 0);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_commands_fail_after_shutdown() {
        let client = offline_client();
        client.shutdown();
        // The driver drops its receiver when it exits.
        let mut rx = client.state_receiver();
        while rx.changed().await.is_ok() {}
        assert!(client.connect().is_err());
    }
}
