//! Physical connection seam.
//!
//! The connection manager only talks to the [`Connector`], [`FrameSink`]
//! and [`FrameStream`] traits. [`WebSocketConnector`] is the production
//! implementation on top of `tokio-tungstenite`; tests plug in scripted
//! in-memory links.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest};
use tracing::{debug, warn};

use pad_core::constants;
use pad_core::error::{PadError, PadResult};

/// Concrete WebSocket stream type.
type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Message(String),
    /// The transport reported an error. A `Closed` normally follows.
    Error(String),
    /// The link is gone.
    Closed {
        /// WebSocket close code when the peer sent one.
        code: Option<u16>,
        reason: String,
    },
}

/// Write half of an open link.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> PadResult<()>;

    /// Close the link. Best effort; the link is discarded afterwards.
    async fn close(&mut self) -> PadResult<()>;
}

/// Read half of an open link.
#[async_trait]
pub trait FrameStream: Send {
    /// Wait for the next transport event.
    ///
    /// After `Closed` has been returned the stream is not polled again.
    async fn next_event(&mut self) -> TransportEvent;
}

/// An open physical connection.
pub struct Link {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

impl Link {
    pub fn new(sink: Box<dyn FrameSink>, stream: Box<dyn FrameStream>) -> Self {
        Self { sink, stream }
    }
}

/// Opens physical connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> PadResult<Link>;
}

/// `tokio-tungstenite` backed connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> PadResult<Link> {
        let request = url
            .into_client_request()
            .map_err(|e| PadError::Socket(format!("invalid socket url {url}: {e}")))?;

        let (ws_stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| PadError::Socket(format!("websocket handshake failed: {e}")))?;
        debug!("websocket handshake complete (status {})", response.status());

        let (sink, stream) = ws_stream.split();
        Ok(Link::new(
            Box::new(WsSink { sink }),
            Box::new(WsEvents {
                stream,
                finished: false,
            }),
        ))
    }
}

struct WsSink {
    sink: SplitSink<WsStream, tungstenite::Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> PadResult<()> {
        self.sink
            .send(tungstenite::Message::Text(text))
            .await
            .map_err(|e| PadError::Socket(format!("send failed: {e}")))
    }

    async fn close(&mut self) -> PadResult<()> {
        self.sink
            .close()
            .await
            .map_err(|e| PadError::Socket(format!("close failed: {e}")))
    }
}

struct WsEvents {
    stream: SplitStream<WsStream>,
    finished: bool,
}

#[async_trait]
impl FrameStream for WsEvents {
    async fn next_event(&mut self) -> TransportEvent {
        if self.finished {
            return closed(None, constants::TRANSPORT_CLOSE_REASON);
        }
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return TransportEvent::Message(text);
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    warn!("ignoring binary frame of {} bytes", data.len());
                }
                // Pongs are queued by tungstenite itself when a ping is read.
                Some(Ok(tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_)))
                | Some(Ok(tungstenite::Message::Frame(_))) => {}
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    self.finished = true;
                    return match frame {
                        Some(frame) => closed(Some(frame.code.into()), &frame.reason),
                        None => closed(None, constants::TRANSPORT_CLOSE_REASON),
                    };
                }
                Some(Err(e)) => {
                    // tungstenite yields nothing useful after an error.
                    self.finished = true;
                    return TransportEvent::Error(e.to_string());
                }
                None => {
                    self.finished = true;
                    return closed(None, constants::TRANSPORT_CLOSE_REASON);
                }
            }
        }
    }
}

fn closed(code: Option<u16>, reason: &str) -> TransportEvent {
    TransportEvent::Closed {
        code,
        reason: reason.to_string(),
    }
}
