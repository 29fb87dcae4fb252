//! Command dispatch, subscriptions, and event consumption

use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::SinkExt;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use crate::connection::{SubscriptionKind, WsClient};
use crate::error::{WsError, WsResult};
use crate::types::{CommandResult, EventMessage, ServerMessage};

impl WsClient {
    // =========================================================================
    // Command Dispatch
    // =========================================================================

    /// Send a command and await its `result` under the default timeout
    ///
    /// `command` is the frame without an `id`; the client allocates the next
    /// monotonic id and merges it in. The decoded result comes back verbatim:
    /// `success: false` is data for the caller to assert on, not an error.
    pub async fn send_command(&self, command: Value) -> WsResult<CommandResult> {
        self.send_command_with_timeout(command, self.command_timeout)
            .await
    }

    /// Send a command and await its `result` under an explicit timeout
    pub async fn send_command_with_timeout(
        &self,
        command: Value,
        deadline: Duration,
    ) -> WsResult<CommandResult> {
        match self.roundtrip(command, deadline).await? {
            ServerMessage::Result(result) => Ok(result),
            ServerMessage::Pong { id } => Err(WsError::Protocol(format!(
                "pong answered a non-ping command (id {})",
                id
            ))),
            other => Err(WsError::Protocol(format!(
                "unexpected reply to command: {:?}",
                other
            ))),
        }
    }

    /// Round-trip a `ping`, expecting a `pong` correlated by id
    pub async fn ping(&self) -> WsResult<()> {
        match self
            .roundtrip(json!({"type": "ping"}), self.command_timeout)
            .await?
        {
            ServerMessage::Pong { .. } => Ok(()),
            other => Err(WsError::Protocol(format!(
                "unexpected reply to ping: {:?}",
                other
            ))),
        }
    }

    /// Allocate an id, register a waiter, write the frame, await the reply
    ///
    /// On timeout the waiter is removed before returning, so a genuinely late
    /// frame finds no entry and is discarded instead of resurrecting a call
    /// that has already failed.
    async fn roundtrip(&self, mut command: Value, deadline: Duration) -> WsResult<ServerMessage> {
        if self.is_closed() {
            return Err(WsError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match command.as_object_mut() {
            Some(fields) => {
                fields.insert("id".to_string(), json!(id));
            }
            None => {
                return Err(WsError::Protocol(
                    "command frame must be a JSON object".to_string(),
                ))
            }
        }

        let (waiter_tx, waiter_rx) = oneshot::channel();
        self.state.pending.insert(id, waiter_tx);
        trace!(id, "command registered");

        let frame = command.to_string();
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.send(Message::Text(frame)).await {
                self.state.pending.remove(&id);
                return Err(WsError::Send(e));
            }
        }

        match timeout(deadline, waiter_rx).await {
            Ok(Ok(message)) => Ok(message),
            // Sender dropped: the reader failed all pending on connection loss.
            Ok(Err(_)) => Err(WsError::ConnectionClosed),
            Err(_) => {
                self.state.pending.remove(&id);
                debug!(id, ?deadline, "command timed out, waiter evicted");
                Err(WsError::Timeout(deadline))
            }
        }
    }

    // =========================================================================
    // Subscriptions & Event Consumption
    // =========================================================================

    /// Subscribe to events, optionally filtered by event type
    ///
    /// The returned subscription id is the command's own request id: the
    /// server tags every matching event with it, and it is the value
    /// `unsubscribe_events` takes. That id reuse is the wire contract.
    pub async fn subscribe_events(&self, event_type: Option<&str>) -> WsResult<u64> {
        let mut command = json!({"type": "subscribe_events"});
        if let Some(event_type) = event_type {
            command["event_type"] = json!(event_type);
        }
        self.subscribe(command, SubscriptionKind::Events).await
    }

    /// Subscribe to a trigger description
    pub async fn subscribe_trigger(&self, trigger: Value) -> WsResult<u64> {
        let command = json!({"type": "subscribe_trigger", "trigger": trigger});
        self.subscribe(command, SubscriptionKind::Trigger).await
    }

    async fn subscribe(&self, command: Value, kind: SubscriptionKind) -> WsResult<u64> {
        let result = self.send_command(command).await?;
        if !result.success {
            return Err(command_error(result));
        }
        self.state.subscriptions.insert(result.id, kind);
        debug!(id = result.id, ?kind, "subscription registered");
        Ok(result.id)
    }

    /// Cancel a subscription
    ///
    /// Events already in flight may still arrive tagged with the old id;
    /// consumers must tolerate them rather than treat them as errors.
    pub async fn unsubscribe_events(&self, subscription_id: u64) -> WsResult<CommandResult> {
        let result = self
            .send_command(json!({
                "type": "unsubscribe_events",
                "subscription": subscription_id,
            }))
            .await?;
        if result.success {
            self.state.subscriptions.remove(&subscription_id);
            debug!(id = subscription_id, "subscription removed");
        }
        Ok(result)
    }

    /// Pop the oldest queued event, waiting up to `deadline`
    ///
    /// The queue is shared by every subscription on the connection and is
    /// strictly FIFO; callers holding several subscriptions filter on
    /// [`EventMessage::id`] after receiving.
    ///
    /// The deadline covers the wait for the queue lock too, so a caller
    /// parked behind a concurrent `recv_event` still times out on schedule.
    pub async fn recv_event(&self, deadline: Duration) -> WsResult<EventMessage> {
        let received = timeout(deadline, async {
            let mut events = self.events.lock().await;
            events.recv().await
        })
        .await;
        match received {
            Ok(Some(event)) => Ok(event),
            // The queue only ends once the reader dropped its sender.
            Ok(None) => Err(WsError::ConnectionClosed),
            Err(_) => Err(WsError::Timeout(deadline)),
        }
    }

    // =========================================================================
    // Convenience API
    // =========================================================================

    /// `get_states`: every entity state the server holds
    pub async fn get_states(&self) -> WsResult<Value> {
        self.expect_result(json!({"type": "get_states"})).await
    }

    /// `get_config`: the server configuration object
    pub async fn get_config(&self) -> WsResult<Value> {
        self.expect_result(json!({"type": "get_config"})).await
    }

    /// `get_services`: the service registry, domain -> service -> description
    pub async fn get_services(&self) -> WsResult<Value> {
        self.expect_result(json!({"type": "get_services"})).await
    }

    /// `call_service`: invoke `domain.service` with optional service data
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Option<Value>,
    ) -> WsResult<Value> {
        let mut command = json!({
            "type": "call_service",
            "domain": domain,
            "service": service,
        });
        if let Some(data) = data {
            command["service_data"] = data;
        }
        self.expect_result(command).await
    }

    /// `fire_event`: fire an arbitrary event on the server's bus
    pub async fn fire_event(&self, event_type: &str, data: Option<Value>) -> WsResult<Value> {
        let mut command = json!({
            "type": "fire_event",
            "event_type": event_type,
        });
        if let Some(data) = data {
            command["event_data"] = data;
        }
        self.expect_result(command).await
    }

    /// `render_template`: render a template server-side, returning the
    /// rendered result payload
    pub async fn render_template(&self, template: &str) -> WsResult<Value> {
        self.expect_result(json!({
            "type": "render_template",
            "template": template,
        }))
        .await
    }

    /// Dispatch and unwrap the result payload, mapping `success: false` to
    /// [`WsError::Command`]
    ///
    /// Tests that assert on rejections call `send_command` directly instead.
    async fn expect_result(&self, command: Value) -> WsResult<Value> {
        let result = self.send_command(command).await?;
        if result.success {
            Ok(result.into_result())
        } else {
            Err(command_error(result))
        }
    }
}

fn command_error(result: CommandResult) -> WsError {
    let error = result.error.unwrap_or_default();
    WsError::Command {
        code: error.code,
        message: error.message,
    }
}
