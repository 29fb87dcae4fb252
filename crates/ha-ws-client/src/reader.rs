//! Reader loop: the single task that reads and routes incoming frames

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::connection::{ConnState, ReadHalf};
use crate::types::{EventMessage, ServerMessage};

/// Run the reader loop until the socket closes
///
/// Routing never awaits a consumer: waiters are resolved through one-shot
/// channels and events go onto an unbounded queue, so a slow `recv_event`
/// caller cannot stall a concurrent `send_command`.
pub(crate) async fn run(
    mut read: ReadHalf,
    state: Arc<ConnState>,
    events: mpsc::UnboundedSender<EventMessage>,
) {
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                Ok(message) => route(&state, &events, message),
                Err(e) => warn!(error = %e, "discarding undecodable frame"),
            },
            Ok(Message::Close(_)) => {
                debug!("server closed the connection");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(other) => trace!(?other, "ignoring non-text frame"),
            Err(e) => {
                warn!(error = %e, "socket read failed");
                break;
            }
        }
    }

    // Dropping the pending senders fails every in-flight waiter with
    // `ConnectionClosed`; dropping `events` lets `recv_event` drain what
    // already arrived and then report the closure instead of hanging.
    state.mark_closed();
    debug!("reader loop stopped");
}

/// Route one decoded message; O(1) and non-blocking
fn route(state: &ConnState, events: &mpsc::UnboundedSender<EventMessage>, message: ServerMessage) {
    match message {
        ServerMessage::Result(result) => {
            let id = result.id;
            resolve(state, id, ServerMessage::Result(result));
        }
        ServerMessage::Pong { id } => {
            resolve(state, id, ServerMessage::Pong { id });
        }
        ServerMessage::Event(event) => {
            trace!(id = event.id, event_type = %event.event.event_type, "event enqueued");
            // Fails only when the client side is gone; nothing to do then.
            let _ = events.send(event);
        }
        ServerMessage::AuthRequired { .. }
        | ServerMessage::AuthOk { .. }
        | ServerMessage::AuthInvalid { .. } => {
            warn!("discarding handshake frame received after authentication");
        }
        ServerMessage::Unknown => {
            trace!("discarding frame of unknown type");
        }
    }
}

/// Resolve the pending waiter for `id`, if it is still registered
///
/// An unmatched id means the requester timed out and evicted its waiter, or
/// the server sent a duplicate. Either way the frame is dropped silently.
fn resolve(state: &ConnState, id: u64, message: ServerMessage) {
    match state.pending.remove(&id) {
        Some((_, waiter)) => {
            let _ = waiter.send(message);
        }
        None => trace!(id, "no waiter registered for id, discarding"),
    }
}
