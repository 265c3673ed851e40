//! Shared test utilities for client integration tests.
//!
//! `MockConnector` hands out in-memory links; the test drives the server side
//! through the matching `RemoteEnd`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use pad_core::error::{PadError, PadResult};
use pad_socket::{
    AuthStatus, Authorizer, Connector, FrameSink, FrameStream, Link, ReconnectConfig,
    SocketClient, TransportEvent,
};

/// How long helpers wait before declaring a test stuck (virtual time).
const WAIT: Duration = Duration::from_secs(600);

/// Ordered log shared by mock sinks and test callbacks.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Backoff without jitter: 1s, 2s, 4s ... capped at 30s.
pub fn reconnect_config(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        max_attempts,
        jitter: Duration::ZERO,
    }
}

/// Server side of one mock link.
pub struct RemoteEnd {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: mpsc::UnboundedReceiver<String>,
    closed_by_client: Arc<AtomicBool>,
}

impl RemoteEnd {
    /// Deliver a text frame to the client.
    pub fn push(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    /// Report a transport error to the client.
    pub fn fail(&self, message: &str) {
        let _ = self.events.send(TransportEvent::Error(message.to_string()));
    }

    /// Close the link from the server side.
    pub fn close(&self, reason: &str) {
        let _ = self.events.send(TransportEvent::Closed {
            code: Some(1006),
            reason: reason.to_string(),
        });
    }

    /// Next frame the client sent on this link.
    pub async fn next_sent(&mut self) -> String {
        tokio::time::timeout(WAIT, self.sent.recv())
            .await
            .expect("timed out waiting for a sent frame")
            .expect("link dropped before a frame was sent")
    }

    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }
}

struct MockSink {
    sent: mpsc::UnboundedSender<String>,
    journal: Journal,
    fail_sends: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> PadResult<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PadError::Socket("send refused".into()));
        }
        self.journal.lock().unwrap().push(format!("sent {text}"));
        self.sent
            .send(text)
            .map_err(|_| PadError::SocketDisconnected)
    }

    async fn close(&mut self) -> PadResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockStream {
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next_event(&mut self) -> TransportEvent {
        self.events
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::Closed {
                code: None,
                reason: "transport close".into(),
            })
    }
}

/// Scripted connector. Accepts by default.
pub struct MockConnector {
    opens: AtomicUsize,
    refuse_all: AtomicBool,
    refuse_next: AtomicUsize,
    fail_sends: Arc<AtomicBool>,
    urls: Mutex<Vec<String>>,
    journal: Journal,
    remotes: mpsc::UnboundedSender<RemoteEnd>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<RemoteEnd>) {
        let (remotes, remotes_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            opens: AtomicUsize::new(0),
            refuse_all: AtomicBool::new(false),
            refuse_next: AtomicUsize::new(0),
            fail_sends: Arc::new(AtomicBool::new(false)),
            urls: Mutex::new(Vec::new()),
            journal: Arc::new(Mutex::new(Vec::new())),
            remotes,
        });
        (connector, remotes_rx)
    }

    /// Number of `open` calls so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    pub fn set_refuse_all(&self, refuse: bool) {
        self.refuse_all.store(refuse, Ordering::SeqCst);
    }

    /// Refuse the next `count` opens, then accept again.
    pub fn refuse_next(&self, count: usize) {
        self.refuse_next.store(count, Ordering::SeqCst);
    }

    /// Make every sink on every link fail its sends.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> PadResult<Link> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let scripted_refusal = self
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_refusal || self.refuse_all.load(Ordering::SeqCst) {
            return Err(PadError::Socket("connection refused".into()));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let _ = self.remotes.send(RemoteEnd {
            events: events_tx,
            sent: sent_rx,
            closed_by_client: Arc::clone(&closed),
        });

        Ok(Link::new(
            Box::new(MockSink {
                sent: sent_tx,
                journal: Arc::clone(&self.journal),
                fail_sends: Arc::clone(&self.fail_sends),
                closed,
            }),
            Box::new(MockStream { events: events_rx }),
        ))
    }
}

/// Authorizer returning a fixed verdict.
pub struct MockAuthorizer {
    verdict: AuthStatus,
    calls: AtomicUsize,
}

impl MockAuthorizer {
    pub fn new(verdict: AuthStatus) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authorizer for MockAuthorizer {
    async fn validate(&self, _token: &str) -> PadResult<AuthStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict)
    }
}

pub type Recorded = (String, Option<Value>);

/// Forward every dispatch of `names` into a channel, in dispatch order.
pub fn record(client: &SocketClient, names: &[&str]) -> mpsc::UnboundedReceiver<Recorded> {
    let (tx, rx) = mpsc::unbounded_channel();
    for name in names {
        let tx = tx.clone();
        let event = name.to_string();
        client.on(*name, move |payload| {
            let _ = tx.send((event.clone(), payload.cloned()));
        });
    }
    rx
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Recorded>) -> Recorded {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("recorder closed")
}

pub async fn next_remote(remotes: &mut mpsc::UnboundedReceiver<RemoteEnd>) -> RemoteEnd {
    tokio::time::timeout(WAIT, remotes.recv())
        .await
        .expect("timed out waiting for a link")
        .expect("connector dropped")
}

/// Let the driver run to idle, advancing virtual time by `secs`.
pub async fn settle(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
