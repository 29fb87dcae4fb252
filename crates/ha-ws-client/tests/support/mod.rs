//! In-process scripted WebSocket server for exercising the client
//!
//! Binds an ephemeral port, accepts a single connection, optionally performs
//! the server side of the auth handshake, and then hands the socket to a
//! per-test script. Lets every client behavior run without a live server.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Token the mock server accepts
pub const TOKEN: &str = "test-suite-token";

/// Turn on harness logging for `--nocapture` runs
///
/// `RUST_LOG=ha_ws_client=trace cargo test -p ha-ws-client -- --nocapture`
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// One-connection scripted server
pub struct MockServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Start a server that authenticates one client and then runs `script`
    pub async fn start<F, Fut>(script: F) -> Self
    where
        F: FnOnce(ServerSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::start_raw(|mut socket| async move {
            socket.handshake().await;
            script(socket).await;
        })
        .await
    }

    /// Start a server whose script owns the connection from the first frame
    ///
    /// The script is responsible for the handshake (or for misbehaving
    /// during it).
    pub async fn start_raw<F, Fut>(script: F) -> Self
    where
        F: FnOnce(ServerSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("websocket accept");
            script(ServerSocket { ws }).await;
        });

        Self { addr, handle }
    }

    /// Start a server that rejects whatever token the client presents
    pub async fn start_rejecting() -> Self {
        Self::start_raw(|mut socket| async move {
            socket
                .send(json!({"type": "auth_required", "ha_version": "2026.1.1"}))
                .await;
            let auth = socket.recv().await.expect("auth frame");
            assert_eq!(auth["type"], "auth");
            socket
                .send(json!({"type": "auth_invalid", "message": "Invalid access token"}))
                .await;
        })
        .await
    }

    /// WebSocket URL of the mock endpoint
    pub fn url(&self) -> String {
        format!("ws://{}/api/websocket", self.addr)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Server end of the accepted connection
pub struct ServerSocket {
    ws: WebSocketStream<TcpStream>,
}

impl ServerSocket {
    /// Server side of the auth handshake; asserts the suite token
    pub async fn handshake(&mut self) {
        self.send(json!({"type": "auth_required", "ha_version": "2026.1.1"}))
            .await;
        let auth = self.recv().await.expect("auth frame");
        assert_eq!(auth["type"], "auth");
        assert_eq!(auth["access_token"], TOKEN);
        self.send(json!({"type": "auth_ok", "ha_version": "2026.1.1"}))
            .await;
    }

    /// Send one JSON text frame
    pub async fn send(&mut self, frame: Value) {
        self.ws
            .send(Message::Text(frame.to_string()))
            .await
            .expect("server send");
    }

    /// Send a raw text frame, JSON or not
    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .expect("server send");
    }

    /// Receive the next JSON text frame; `None` once the client is gone
    pub async fn recv(&mut self) -> Option<Value> {
        while let Some(frame) = self.ws.next().await {
            match frame.ok()? {
                Message::Text(text) => {
                    return Some(serde_json::from_str(&text).expect("client sent JSON"))
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    }

    /// Answer a command with a successful result
    pub async fn reply_result(&mut self, id: u64, result: Value) {
        self.send(json!({
            "id": id,
            "type": "result",
            "success": true,
            "result": result,
        }))
        .await;
    }

    /// Answer a command with a failure
    pub async fn reply_error(&mut self, id: u64, code: &str, message: &str) {
        self.send(json!({
            "id": id,
            "type": "result",
            "success": false,
            "error": {"code": code, "message": message},
        }))
        .await;
    }

    /// Push an event tagged with a subscription id
    pub async fn send_event(&mut self, subscription: u64, event_type: &str, data: Value) {
        self.send(json!({
            "id": subscription,
            "type": "event",
            "event": {
                "event_type": event_type,
                "data": data,
                "time_fired": "2026-01-07T12:00:00.000000+00:00",
                "origin": "LOCAL",
                "context": {"id": "01JGWF8Y9NT5B4Q6H0K8RXZ2CD"},
            },
        }))
        .await;
    }

    /// Serve a canned command loop until the client disconnects
    ///
    /// Pings get pongs, subscriptions are acknowledged, the read-only
    /// commands return fixed payloads, and everything else fails with
    /// `unknown_command`.
    pub async fn serve_basic(mut self) {
        while let Some(frame) = self.recv().await {
            let id = frame["id"].as_u64().expect("command id");
            match frame["type"].as_str() {
                Some("ping") => self.send(json!({"id": id, "type": "pong"})).await,
                Some("subscribe_events") | Some("subscribe_trigger") => {
                    self.reply_result(id, Value::Null).await
                }
                Some("unsubscribe_events") => self.reply_result(id, Value::Null).await,
                Some("get_config") => {
                    self.reply_result(
                        id,
                        json!({"location_name": "Test Home", "version": "2026.1.1"}),
                    )
                    .await
                }
                Some("get_states") => self.reply_result(id, json!([])).await,
                Some("get_services") => {
                    self.reply_result(id, json!({"homeassistant": {}})).await
                }
                Some("render_template") => {
                    self.reply_result(
                        id,
                        json!({"result": "rendered", "listeners": {"all": false}}),
                    )
                    .await
                }
                _ => self.reply_error(id, "unknown_command", "Unknown command.").await,
            }
        }
    }
}
