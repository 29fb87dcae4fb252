//! Error types for the WebSocket test client

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Result type for client operations
pub type WsResult<T> = Result<T, WsError>;

/// Errors surfaced by the WebSocket test client
///
/// `Timeout` and `ConnectionClosed` are deliberately distinct variants so a
/// test can tell a slow server apart from a dead one.
#[derive(Debug, Error)]
pub enum WsError {
    /// The socket could not be opened
    #[error("websocket connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    /// The socket did not open within the connect deadline
    #[error("websocket connect to {url} timed out after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },

    /// The auth handshake did not reach `auth_ok`
    #[error("authentication failed: {0}")]
    Auth(String),

    /// No matching reply within the deadline; the waiter has been
    /// unregistered, so a late frame is discarded rather than delivered
    #[error("timed out after {0:?} waiting for the server")]
    Timeout(Duration),

    /// The reader observed EOF or a transport error; every pending and
    /// future call on this connection fails with this
    #[error("connection closed")]
    ConnectionClosed,

    /// The server broke the message contract
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A convenience helper received `success: false`; raw dispatch via
    /// `send_command` returns the result as data instead
    #[error("command rejected: {code}: {message}")]
    Command { code: String, message: String },

    /// The outgoing frame could not be written
    #[error("websocket send failed: {0}")]
    Send(#[source] tungstenite::Error),
}
