//! Conformance Test Suite for Home-Assistant-Compatible Servers
//!
//! This crate bundles everything the live test suites need to drive a
//! system under test over its three public surfaces: the REST API, the
//! WebSocket API (via `ha-ws-client`) and the MQTT ingress.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  System under test                          │
//! │  REST :8123   WebSocket :8123   MQTT :1883  │
//! └──────┬──────────────┬──────────────┬────────┘
//!        │              │              │
//!   ┌────▼─────┐  ┌─────▼──────┐  ┌────▼──────┐
//!   │RestClient│  │  WsClient  │  │ MqttProbe │
//!   └────┬─────┘  └─────┬──────┘  └────┬──────┘
//!        │              │              │
//!        └──────────────┼──────────────┘
//!                ┌──────▼──────┐
//!                │   Session   │
//!                │ tests/*.rs  │
//!                └─────────────┘
//! ```
//!
//! The suites under `tests/` are `#[ignore]`-gated because they need a
//! running server; see each file's header for the environment variables
//! and the `cargo test -- --ignored` invocation.

pub mod config;
pub mod error;
pub mod harness;
pub mod mqtt;
pub mod rest;

pub use config::SuiteConfig;
pub use error::{SuiteError, SuiteResult};
pub use harness::Session;
pub use mqtt::MqttProbe;
pub use rest::{ApiResponse, RestClient};
