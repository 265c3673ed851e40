//! Connection manager.
//!
//! One driver task per client owns the physical link, the outbound queue,
//! the backoff timer and the connection state. Callers reach it only through
//! the command channel, and every input (caller command, attempt result,
//! transport event, timer expiry) is handled to completion before the next
//! one is looked at.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use pad_core::constants;
use pad_core::error::PadError;

use crate::auth::{AuthStatus, Authorizer, SessionStore};
use crate::backoff::{BackoffScheduler, ReconnectConfig, ScheduleOutcome};
use crate::codec;
use crate::endpoint::Endpoint;
use crate::events::{ConnectionState, ConnectionStatus, SocketEventType};
use crate::queue::{OutboundQueue, QueuedMessage};
use crate::registry::EventRegistry;
use crate::transport::{Connector, Link, TransportEvent};

/// Upper bound for a graceful close before the link is simply dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests from caller handles to the driver.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    ForceReconnect,
    Emit(QueuedMessage),
    Shutdown,
}

/// Result of one connection attempt (pre-check plus socket open).
enum AttemptOutcome {
    Opened(Link),
    Unauthorized(String),
    Failed(PadError),
}

/// Next input for the driver loop.
enum Step {
    Command(Option<Command>),
    Attempt(Result<AttemptOutcome, JoinError>),
    Transport(TransportEvent),
    TimerFired(u32),
}

/// Collaborators handed to the driver by the client builder.
pub(crate) struct ManagerParts {
    pub endpoint: Endpoint,
    pub connector: Arc<dyn Connector>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
    pub session: Arc<dyn SessionStore>,
    pub registry: Arc<EventRegistry>,
    pub reconnect: ReconnectConfig,
}

/// State machine behind a [`SocketClient`](crate::client::SocketClient).
pub(crate) struct SocketManager {
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    authorizer: Option<Arc<dyn Authorizer>>,
    session: Arc<dyn SessionStore>,
    registry: Arc<EventRegistry>,
    queue: OutboundQueue,
    backoff: BackoffScheduler,
    /// Local copy of the published state.
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// The one physical connection. Replaced only by this driver.
    link: Option<Link>,
    /// In-flight connection attempt.
    attempt: Option<JoinHandle<AttemptOutcome>>,
    /// Set by `disconnect()`; suppresses automatic reconnection.
    manual_close: bool,
    /// Distinguishes `connect` from `reconnect` notifications.
    has_connected_once: bool,
}

impl SocketManager {
    pub(crate) fn new(
        parts: ManagerParts,
        state_tx: watch::Sender<ConnectionState>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            endpoint: parts.endpoint,
            connector: parts.connector,
            authorizer: parts.authorizer,
            session: parts.session,
            registry: parts.registry,
            queue: OutboundQueue::new(),
            backoff: BackoffScheduler::new(parts.reconnect),
            state: ConnectionState::default(),
            state_tx,
            commands,
            link: None,
            attempt: None,
            manual_close: false,
            has_connected_once: false,
        }
    }

    /// Drive the connection until shutdown or until every handle is gone.
    pub(crate) async fn run(mut self) {
        debug!("socket driver started");
        loop {
            // Caller commands win ties so call order is kept against attempt results.
            let step = tokio::select! {
                biased;
                command = self.commands.recv() => Step::Command(command),
                outcome = wait_attempt(&mut self.attempt) => Step::Attempt(outcome),
                event = wait_link(&mut self.link) => Step::Transport(event),
                attempt = self.backoff.fired() => Step::TimerFired(attempt),
            };

            match step {
                Step::Command(None) | Step::Command(Some(Command::Shutdown)) => break,
                Step::Command(Some(command)) => self.handle_command(command).await,
                Step::Attempt(outcome) => {
                    self.attempt = None;
                    self.handle_attempt(outcome).await;
                }
                Step::Transport(event) => self.handle_transport(event),
                Step::TimerFired(attempt) => self.handle_timer(attempt),
            }
        }

        self.handle_disconnect().await;
        if !self.queue.is_empty() {
            warn!("dropping {} unsent message(s) on shutdown", self.queue.len());
        }
        debug!("socket driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.handle_connect(),
            Command::Disconnect => self.handle_disconnect().await,
            Command::ForceReconnect => self.handle_force_reconnect().await,
            Command::Emit(message) => self.handle_emit(message).await,
            Command::Shutdown => {}
        }
    }

    fn handle_connect(&mut self) {
        match self.state.status {
            ConnectionStatus::Connecting
            | ConnectionStatus::Connected
            | ConnectionStatus::Reconnecting => {
                debug!("connect ignored while {}", self.state.status);
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Failed => {
                self.manual_close = false;
                self.backoff.reset();
                self.start_attempt();
            }
        }
    }

    async fn handle_disconnect(&mut self) {
        self.manual_close = true;
        self.backoff.reset();
        self.abort_attempt();

        let had_link = self.close_link().await;
        self.set_status(ConnectionStatus::Disconnected);
        if had_link {
            info!("socket disconnected by caller");
            self.dispatch(
                SocketEventType::Disconnect,
                Some(json!(constants::CLIENT_DISCONNECT_REASON)),
            );
        }
    }

    async fn handle_force_reconnect(&mut self) {
        self.manual_close = false;
        self.backoff.reset();
        if self.attempt.is_some() {
            debug!("force reconnect: attempt already in flight");
            self.publish();
            return;
        }

        let had_link = self.close_link().await;
        info!("forcing reconnect");
        self.start_attempt();
        if had_link {
            self.dispatch(
                SocketEventType::Disconnect,
                Some(json!(constants::FORCED_RECONNECT_REASON)),
            );
        }
    }

    async fn handle_emit(&mut self, message: QueuedMessage) {
        let event = message.event.clone();
        self.queue.enqueue(message);

        match self.state.status {
            ConnectionStatus::Connected => {
                self.flush_queue().await;
                self.publish();
            }
            ConnectionStatus::Disconnected if !self.manual_close => {
                debug!("queued {event}, opening connection");
                self.start_attempt();
            }
            status => {
                debug!("queued {event} while {status}");
                self.publish();
            }
        }
    }

    async fn handle_attempt(&mut self, outcome: Result<AttemptOutcome, JoinError>) {
        match outcome {
            Ok(AttemptOutcome::Opened(link)) => self.handle_open(link).await,
            Ok(AttemptOutcome::Unauthorized(reason)) => self.handle_unauthorized(reason),
            Ok(AttemptOutcome::Failed(e)) => self.handle_attempt_failed(e),
            Err(e) => {
                error!("connection attempt task failed: {e}");
                self.handle_attempt_failed(PadError::Internal(e.to_string()));
            }
        }
    }

    /// Flush first, then announce, so a `connect` handler sees a drained queue.
    async fn handle_open(&mut self, link: Link) {
        self.link = Some(link);
        self.flush_queue().await;

        let attempts = self.backoff.attempts();
        self.backoff.reset();
        self.state.last_error = None;
        self.state.connected_at = Some(Utc::now());
        self.set_status(ConnectionStatus::Connected);

        if self.has_connected_once {
            info!("reconnected after {attempts} attempt(s)");
            self.dispatch(SocketEventType::Reconnect, Some(json!(attempts)));
        } else {
            self.has_connected_once = true;
            info!("connected");
            self.dispatch(SocketEventType::Connect, None);
        }
    }

    fn handle_unauthorized(&mut self, reason: String) {
        warn!("authorization failed ({reason}); clearing credentials and requesting reload");
        self.session.clear_credentials();
        self.session.request_reload();

        self.backoff.reset();
        let message = PadError::AuthFailed(reason).to_string();
        self.state.last_error = Some(message.clone());
        self.set_status(ConnectionStatus::Failed);
        self.dispatch(SocketEventType::Error, Some(json!(message)));
    }

    /// Same path as an unexpected close, preceded by an `error` carrying the cause.
    fn handle_attempt_failed(&mut self, err: PadError) {
        warn!("connection attempt failed: {err}");
        let message = err.to_string();
        self.state.last_error = Some(message.clone());
        let outcome = self.schedule_reconnect();
        self.dispatch(SocketEventType::Error, Some(json!(message)));
        self.dispatch(
            SocketEventType::Disconnect,
            Some(json!(constants::CONNECT_ERROR_REASON)),
        );
        self.announce_exhaustion(outcome);
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.handle_frame(&text),
            TransportEvent::Error(message) => {
                warn!("transport error: {message}");
                self.dispatch(SocketEventType::Error, Some(json!(message)));
            }
            TransportEvent::Closed { code, reason } => self.handle_closed(code, reason),
        }
    }

    fn handle_frame(&mut self, text: &str) {
        let frame = match codec::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping malformed frame: {e}");
                return;
            }
        };

        let event = SocketEventType::from_name(&frame.event);
        if event.is_synthetic() {
            warn!("dropping inbound frame using reserved event name {event}");
            return;
        }
        self.registry.dispatch(&event, frame.payload.as_ref());
    }

    fn handle_closed(&mut self, code: Option<u16>, reason: String) {
        self.link = None;
        self.state.connected_at = None;
        info!("socket closed (code {code:?}): {reason}");

        if self.manual_close {
            self.set_status(ConnectionStatus::Disconnected);
            self.dispatch(SocketEventType::Disconnect, Some(json!(reason)));
            return;
        }

        self.state.last_error = Some(format!("connection closed: {reason}"));
        let outcome = self.schedule_reconnect();
        self.dispatch(SocketEventType::Disconnect, Some(json!(reason)));
        self.announce_exhaustion(outcome);
    }

    fn handle_timer(&mut self, attempt: u32) {
        if self.manual_close {
            return;
        }
        info!("reconnect attempt {attempt} starting");
        self.start_attempt();
        self.dispatch(SocketEventType::ReconnectAttempt, Some(json!(attempt)));
    }

    fn start_attempt(&mut self) {
        self.abort_attempt();
        self.set_status(ConnectionStatus::Connecting);
        self.attempt = Some(tokio::spawn(attempt_connection(
            self.endpoint.clone(),
            Arc::clone(&self.connector),
            self.authorizer.clone(),
            Arc::clone(&self.session),
        )));
    }

    fn abort_attempt(&mut self) {
        if let Some(handle) = self.attempt.take() {
            handle.abort();
            debug!("in-flight connection attempt cancelled");
        }
    }

    fn schedule_reconnect(&mut self) -> ScheduleOutcome {
        let outcome = self.backoff.schedule();
        match outcome {
            ScheduleOutcome::Scheduled { .. } => self.set_status(ConnectionStatus::Reconnecting),
            ScheduleOutcome::AlreadyPending => {}
            ScheduleOutcome::Exhausted { .. } => self.set_status(ConnectionStatus::Failed),
        }
        outcome
    }

    fn announce_exhaustion(&self, outcome: ScheduleOutcome) {
        if let ScheduleOutcome::Exhausted { attempts } = outcome {
            self.dispatch(SocketEventType::ReconnectFailed, Some(json!(attempts)));
        }
    }

    async fn flush_queue(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        let outcome = self.queue.flush(link.sink.as_mut()).await;
        if !outcome.is_complete() {
            warn!("{} message(s) left queued after a failed send", outcome.remaining);
        }
    }

    /// Close and discard the current link. Returns whether one was open.
    async fn close_link(&mut self) -> bool {
        let Some(mut link) = self.link.take() else {
            return false;
        };
        self.state.connected_at = None;
        match tokio::time::timeout(CLOSE_TIMEOUT, link.sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("error while closing link: {e}"),
            Err(_) => debug!("link close timed out"),
        }
        true
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.state.status != status {
            info!("socket state: {} -> {}", self.state.status, status);
            self.state.status = status;
        }
        self.publish();
    }

    fn publish(&mut self) {
        self.state.reconnect_attempts = self.backoff.attempts();
        self.state.queued_messages = self.queue.len();
        self.state_tx.send_replace(self.state.clone());
    }

    fn dispatch(&self, event: SocketEventType, payload: Option<Value>) {
        self.registry.dispatch(&event, payload.as_ref());
    }
}

async fn wait_attempt(
    attempt: &mut Option<JoinHandle<AttemptOutcome>>,
) -> Result<AttemptOutcome, JoinError> {
    match attempt {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn wait_link(link: &mut Option<Link>) -> TransportEvent {
    match link {
        Some(link) => link.stream.next_event().await,
        None => std::future::pending().await,
    }
}

async fn attempt_connection(
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    authorizer: Option<Arc<dyn Authorizer>>,
    session: Arc<dyn SessionStore>,
) -> AttemptOutcome {
    let token = if endpoint.requires_token() {
        match session.token().filter(|t| !t.is_empty()) {
            Some(token) => Some(token),
            None => return AttemptOutcome::Unauthorized("no bearer token available".into()),
        }
    } else {
        None
    };

    if let (Some(authorizer), Some(token)) = (&authorizer, &token) {
        match authorizer.validate(token).await {
            Ok(AuthStatus::Valid) => debug!("token accepted"),
            Ok(AuthStatus::Unauthorized) => {
                return AttemptOutcome::Unauthorized("token rejected by server".into());
            }
            Err(e) => return AttemptOutcome::Failed(e),
        }
    }

    let url = match endpoint.socket_url(token.as_deref()) {
        Ok(url) => url,
        Err(e) => return AttemptOutcome::Failed(e),
    };
    debug!("opening socket at {}", url.path());

    match connector.open(url.as_str()).await {
        Ok(link) => AttemptOutcome::Opened(link),
        Err(e) => AttemptOutcome::Failed(e),
    }
}
