//! Outbound queue for messages emitted while the link is not open.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, warn};

use crate::codec;
use crate::transport::FrameSink;

/// A not-yet-sent outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub event: String,
    /// `None` means the frame is sent without a `data` field.
    pub payload: Option<Value>,
}

impl QueuedMessage {
    pub fn new(event: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Result of a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    pub sent: usize,
    /// Messages still queued because a send failed.
    pub remaining: usize,
}

impl FlushOutcome {
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// FIFO buffer of outbound messages.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    messages: VecDeque<QueuedMessage>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the tail.
    pub fn enqueue(&mut self, message: QueuedMessage) {
        self.messages.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Snapshot of the queued messages, head first.
    pub fn pending(&self) -> Vec<QueuedMessage> {
        self.messages.iter().cloned().collect()
    }

    /// Send queued messages in FIFO order.
    ///
    /// Stops at the first send failure and puts the failed message back at
    /// the head, so later messages never overtake it. A message that cannot
    /// be encoded at all is dropped with a warning instead of blocking the
    /// queue forever.
    pub async fn flush(&mut self, sink: &mut dyn FrameSink) -> FlushOutcome {
        let mut sent = 0;
        while let Some(message) = self.messages.pop_front() {
            let text = match codec::encode(&message.event, message.payload.as_ref()) {
                Ok(text) => text,
                Err(e) => {
                    warn!("dropping unencodable message {}: {e}", message.event);
                    continue;
                }
            };
            if let Err(e) = sink.send_text(text).await {
                warn!("failed to send queued {}, re-queueing: {e}", message.event);
                self.messages.push_front(message);
                break;
            }
            sent += 1;
        }

        if sent > 0 {
            debug!("flushed {sent} queued message(s), {} remaining", self.messages.len());
        }
        FlushOutcome {
            sent,
            remaining: self.messages.len(),
        }
    }
}
