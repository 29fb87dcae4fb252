//! Concurrent WebSocket client for the Home Assistant test protocol
//!
//! A single physical connection carries two independent message classes:
//! command results, which answer exactly one prior request, and subscription
//! events, which the server pushes whenever it likes. The two interleave
//! arbitrarily, and test code issues round-trips, awaits specific events,
//! and sometimes does both at once on the same socket.
//!
//! # Architecture
//!
//! ```text
//!  caller tasks                         reader task (one per connection)
//!  ────────────                         ────────────────────────────────
//!  send_command ──┐                     ┌── result/pong ──> pending waiter
//!                 ├─> write half        │
//!  recv_event <───┤                     ├── event ────────> event queue
//!                 │                     │
//!                 └<── oneshot/queue <──┴── anything else > discarded
//! ```
//!
//! The reader task is the only component that reads the socket. It routes
//! each frame by message kind and request id and never awaits a consumer, so
//! a slow `recv_event` caller cannot stall a concurrent `send_command`.
//! Request ids are monotonic per connection starting at 1; the id used to
//! issue `subscribe_events` doubles as the subscription tag on every event
//! the server delivers for it.

pub mod commands;
pub mod connection;
pub mod error;
mod reader;
pub mod types;

pub use connection::{ConnectOptions, WsClient};
pub use error::{WsError, WsResult};
pub use types::{CommandResult, ErrorInfo, EventMessage, EventPayload, ServerMessage};
