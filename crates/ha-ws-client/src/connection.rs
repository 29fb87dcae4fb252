//! Connection management for the test-protocol client
//!
//! Opens the socket, runs the auth handshake, and owns the state shared
//! between caller tasks and the reader task.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{WsError, WsResult};
use crate::reader;
use crate::types::{auth_frame, EventMessage, ServerMessage};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WriteHalf = SplitSink<WsStream, Message>;
pub(crate) type ReadHalf = SplitStream<WsStream>;

// =============================================================================
// Options
// =============================================================================

/// Connection parameters
///
/// `command_timeout` is the suite-wide default deadline for round trips;
/// individual calls can override it through `send_command_with_timeout` and
/// `recv_event`.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub url: String,
    pub token: String,
    pub connect_timeout: Duration,
    pub auth_timeout: Duration,
    pub command_timeout: Duration,
}

impl ConnectOptions {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            connect_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

// =============================================================================
// Shared Connection State
// =============================================================================

/// What a subscription registry entry was created by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Events,
    Trigger,
}

/// State shared between caller tasks and the reader task
///
/// The pending table and the event queue are the only synchronization points
/// between callers and the reader; nothing here is global.
pub(crate) struct ConnState {
    /// Waiters for in-flight commands, keyed by request id
    pub(crate) pending: DashMap<u64, oneshot::Sender<ServerMessage>>,
    /// Live subscriptions: subscription id -> kind
    pub(crate) subscriptions: DashMap<u64, SubscriptionKind>,
    /// Set once the reader observes EOF or a transport error
    closed: AtomicBool,
}

impl ConnState {
    fn new() -> Self {
        Self {
            pending: DashMap::new(),
            subscriptions: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark the connection closed and fail every in-flight waiter
    ///
    /// Clearing the table drops the one-shot senders, which resolves each
    /// waiter with `ConnectionClosed` on the caller side.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending.clear();
    }
}

// =============================================================================
// Client
// =============================================================================

/// A connected, authenticated test-protocol client
///
/// Exclusively owned by the test session that created it. All operations
/// take `&self`, so commands and event consumption may run concurrently from
/// multiple tasks over the same connection.
pub struct WsClient {
    pub(crate) state: Arc<ConnState>,
    pub(crate) writer: Mutex<WriteHalf>,
    pub(crate) events: Mutex<mpsc::UnboundedReceiver<EventMessage>>,
    pub(crate) next_id: AtomicU64,
    pub(crate) command_timeout: Duration,
    reader_task: JoinHandle<()>,
}

impl WsClient {
    /// Connect and authenticate with default timeouts
    pub async fn connect(url: impl Into<String>, token: impl Into<String>) -> WsResult<Self> {
        Self::connect_with(ConnectOptions::new(url, token)).await
    }

    /// Connect and authenticate with explicit timeouts
    pub async fn connect_with(options: ConnectOptions) -> WsResult<Self> {
        let ConnectOptions {
            url,
            token,
            connect_timeout,
            auth_timeout,
            command_timeout,
        } = options;

        let connected = timeout(connect_timeout, connect_async(&url)).await;
        let (stream, _response) = match connected {
            Ok(Ok(ok)) => ok,
            Ok(Err(source)) => return Err(WsError::Connect { url, source }),
            Err(_) => {
                return Err(WsError::ConnectTimeout {
                    url,
                    timeout: connect_timeout,
                })
            }
        };

        let (mut write, mut read) = stream.split();

        // Fixed 3-step handshake: auth_required -> auth -> auth_ok. No other
        // message is legal before auth_ok.
        match recv_handshake(&mut read, auth_timeout).await? {
            ServerMessage::AuthRequired { ha_version } => {
                debug!(?ha_version, "received auth_required");
            }
            other => {
                return Err(WsError::Auth(format!(
                    "expected auth_required, got {:?}",
                    other
                )))
            }
        }

        write
            .send(Message::Text(auth_frame(&token).to_string()))
            .await
            .map_err(WsError::Send)?;

        match recv_handshake(&mut read, auth_timeout).await? {
            ServerMessage::AuthOk { ha_version } => {
                debug!(url = %url, ?ha_version, "authenticated");
            }
            ServerMessage::AuthInvalid { message } => {
                return Err(WsError::Auth(
                    message.unwrap_or_else(|| "access token rejected".to_string()),
                ))
            }
            other => {
                return Err(WsError::Auth(format!("expected auth_ok, got {:?}", other)))
            }
        }

        let state = Arc::new(ConnState::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(reader::run(read, Arc::clone(&state), event_tx));

        Ok(Self {
            state,
            writer: Mutex::new(write),
            events: Mutex::new(event_rx),
            next_id: AtomicU64::new(1),
            command_timeout,
            reader_task,
        })
    }

    /// Close the connection
    ///
    /// Sends a best-effort Close frame, stops the reader task, and fails any
    /// still-pending waiters with `ConnectionClosed`. Later calls on the
    /// client fail fast with the same error.
    pub async fn close(&self) {
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.send(Message::Close(None)).await;
        }
        self.reader_task.abort();
        self.state.mark_closed();
        debug!("connection closed by client");
    }

    /// Number of in-flight commands
    pub fn pending_requests(&self) -> usize {
        self.state.pending.len()
    }

    /// Number of live subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.state.subscriptions.len()
    }

    /// Whether the connection has been torn down
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }
}

// The write half has no Debug impl, so derive is off the table.
impl fmt::Debug for WsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsClient")
            .field("pending", &self.state.pending.len())
            .field("subscriptions", &self.state.subscriptions.len())
            .field("closed", &self.state.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        // A panicking test must not leak the reader task.
        self.reader_task.abort();
        self.state.mark_closed();
    }
}

/// Read one protocol frame during the handshake, skipping control frames
async fn recv_handshake(read: &mut ReadHalf, deadline: Duration) -> WsResult<ServerMessage> {
    timeout(deadline, async {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    return serde_json::from_str(&text).map_err(|e| {
                        WsError::Auth(format!("undecodable handshake frame: {}", e))
                    });
                }
                Ok(Message::Close(_)) => {
                    return Err(WsError::Auth(
                        "connection closed during handshake".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(WsError::Auth(format!("handshake read failed: {}", e)));
                }
            }
        }
        Err(WsError::Auth(
            "connection closed during handshake".to_string(),
        ))
    })
    .await
    .map_err(|_| WsError::Auth(format!("no handshake frame within {:?}", deadline)))?
}
