//! # Subscription Session
//!
//! One websocket connection to a node, from handshake to close.
//!
//! ```text
//! Connecting ──→ Subscribed ──→ Streaming ──→ Closing ──→ Closed
//!      │              │             │                        ↑
//!      └──────────────┴─────────────┴──────→ Failed ─────────┘
//! ```
//!
//! Two tasks share the connection. The read task owns the read half and
//! processes frames strictly in arrival order. The session itself owns the
//! write half and waits on either the read task finishing or the one-shot
//! shutdown signal; only it ever writes (subscribe request, close frame).

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::ProbeConfig;
use crate::decoder::{decode_notification, Notification};
use crate::domain::{BlockResult, ProbeError, ProbeResult};

/// Correlation id of the one subscribe request a session sends.
pub const SUBSCRIPTION_ID: u64 = 1;

/// Event filter for committed blocks.
pub const NEW_BLOCK_QUERY: &str = "tm.event='NewBlock'";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What a session reports to its sink, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    /// Node acknowledged the subscription.
    Subscribed,
    /// A block arrived and all of its transactions hashed cleanly.
    Block(BlockResult),
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Subscribed,
    Streaming,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Subscribed)
                | (Connecting, Failed)
                | (Subscribed, Streaming)
                | (Subscribed, Closing)
                | (Subscribed, Closed)
                | (Subscribed, Failed)
                | (Streaming, Closing)
                | (Streaming, Closed)
                | (Streaming, Failed)
                | (Closing, Closed)
                | (Closing, Failed)
                | (Failed, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Shutdown requested and the node closed its side within the timeout.
    ShutdownAcknowledged,
    /// Shutdown requested; the node did not close in time, or the close frame
    /// could not be written.
    ShutdownUnacknowledged,
    /// The node ended the stream on its own.
    PeerClosed,
}

impl SessionOutcome {
    /// True when the session ended because the operator asked it to.
    pub fn is_clean(self) -> bool {
        !matches!(self, SessionOutcome::PeerClosed)
    }
}

/// JSON-RPC request for the websocket endpoint.
#[derive(Debug, Serialize)]
struct WsRequest<T: Serialize> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

fn subscribe_request() -> ProbeResult<Message> {
    let request = WsRequest {
        jsonrpc: "2.0",
        method: "subscribe",
        params: (NEW_BLOCK_QUERY,),
        id: SUBSCRIPTION_ID,
    };
    let text = serde_json::to_string(&request).map_err(ProbeError::EncodeRequest)?;
    Ok(Message::Text(text.into()))
}

/// Shared view of the session state. Transitions are checked and logged.
#[derive(Debug, Clone)]
struct StateHandle(Arc<watch::Sender<SessionState>>);

impl StateHandle {
    fn new() -> Self {
        Self(Arc::new(watch::channel(SessionState::Connecting).0))
    }

    fn current(&self) -> SessionState {
        *self.0.borrow()
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    fn advance(&self, next: SessionState) -> bool {
        self.0.send_if_modified(|state| {
            if state.can_transition_to(next) {
                debug!(from = ?*state, to = ?next, "session state");
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Record a failure and release: `Failed → Closed`.
    fn fail(&self) {
        self.advance(SessionState::Failed);
        self.advance(SessionState::Closed);
    }
}

/// A single subscription to `NewBlock` events.
pub struct Session {
    config: ProbeConfig,
    state: StateHandle,
    events: mpsc::Sender<ProbeEvent>,
}

impl Session {
    /// Create a session that reports to `events`.
    pub fn new(config: ProbeConfig, events: mpsc::Sender<ProbeEvent>) -> Self {
        Self {
            config,
            state: StateHandle::new(),
            events,
        }
    }

    /// Watch state transitions.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.0.subscribe()
    }

    /// Connect, subscribe and stream until the node closes, a frame fails to
    /// decode, or `shutdown` fires.
    ///
    /// A dropped `shutdown` sender is not a shutdown request; the session then
    /// runs until the stream ends.
    pub async fn run(self, shutdown: oneshot::Receiver<()>) -> ProbeResult<SessionOutcome> {
        let result = self.run_inner(shutdown).await;
        match &result {
            Ok(outcome) => {
                self.state.advance(SessionState::Closed);
                debug!(?outcome, "session closed");
            }
            Err(e) if e.is_decode_error() => {
                error!("undecodable frame, closing session: {}", e);
                self.state.fail();
            }
            Err(e) => {
                error!("session failed: {}", e);
                self.state.fail();
            }
        }
        result
    }

    async fn run_inner(&self, mut shutdown: oneshot::Receiver<()>) -> ProbeResult<SessionOutcome> {
        let url = self.config.endpoint_url();
        info!("connecting to {}", url);

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|source| ProbeError::Connect { url, source })?;

        let (mut write, read) = ws_stream.split();

        write
            .send(subscribe_request()?)
            .await
            .map_err(ProbeError::Subscribe)?;
        self.state.advance(SessionState::Subscribed);
        info!("sent subscribe request for {}", NEW_BLOCK_QUERY);

        let mut reader = tokio::spawn(read_loop(read, self.state.clone(), self.events.clone()));

        tokio::select! {
            joined = &mut reader => {
                join_reader(joined)?;
                info!("node closed the connection");
                Ok(SessionOutcome::PeerClosed)
            }
            Ok(()) = &mut shutdown => {
                info!("interrupt");
                self.state.advance(SessionState::Closing);
                self.close(&mut write, reader).await
            }
        }
    }

    /// Send a normal-closure frame and give the node `close_timeout` to answer.
    async fn close(
        &self,
        write: &mut SplitSink<WsStream, Message>,
        mut reader: JoinHandle<ProbeResult<()>>,
    ) -> ProbeResult<SessionOutcome> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = write.send(Message::Close(Some(frame))).await {
            warn!("write close: {}", e);
            reader.abort();
            return Ok(SessionOutcome::ShutdownUnacknowledged);
        }

        match tokio::time::timeout(self.config.close_timeout, &mut reader).await {
            Ok(joined) => {
                join_reader(joined)?;
                Ok(SessionOutcome::ShutdownAcknowledged)
            }
            Err(_) => {
                warn!(
                    "node did not acknowledge close within {:?}",
                    self.config.close_timeout
                );
                reader.abort();
                Ok(SessionOutcome::ShutdownUnacknowledged)
            }
        }
    }
}

fn join_reader(joined: Result<ProbeResult<()>, JoinError>) -> ProbeResult<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Ok(()),
    }
}

/// Read frames until the stream ends. Frames arriving after shutdown began
/// are drained, not processed.
async fn read_loop(
    mut read: SplitStream<WsStream>,
    state: StateHandle,
    events: mpsc::Sender<ProbeEvent>,
) -> ProbeResult<()> {
    while let Some(frame) = read.next().await {
        let closing = state.current() == SessionState::Closing;

        let message = match frame {
            Ok(message) => message,
            Err(tungstenite::Error::ConnectionClosed) => break,
            Err(e) if closing => {
                debug!("read after close: {}", e);
                break;
            }
            Err(e) => return Err(ProbeError::Read(e)),
        };

        state.advance(SessionState::Streaming);

        if let Message::Close(frame) = &message {
            debug!(?frame, "close frame received");
            break;
        }
        if closing {
            continue;
        }

        let notification = match &message {
            Message::Text(text) => decode_notification(text.as_str())?,
            Message::Binary(bytes) => decode_notification(bytes)?,
            _ => continue,
        };
        emit(notification, &events).await?;
    }

    Ok(())
}

async fn emit(notification: Notification, events: &mpsc::Sender<ProbeEvent>) -> ProbeResult<()> {
    let event = match notification {
        Notification::Acknowledged => {
            info!("new connection made to node");
            ProbeEvent::Subscribed
        }
        Notification::Block(block) => {
            info!(
                txs = block.tx_count,
                unique = block.hashes.len(),
                "block height: {}",
                block.height
            );
            ProbeEvent::Block(block)
        }
    };
    events.send(event).await.map_err(|_| ProbeError::SinkClosed)
}
