//! Shared setup for the live conformance suites

#![allow(dead_code)]

use std::time::{Duration, Instant};

use ha_conformance::harness::{init_logging, Session};
use ha_conformance::SuiteConfig;
use ha_ws_client::{EventMessage, WsClient};

/// Connect a full session once the server answers health checks
pub async fn ready_session() -> Session {
    init_logging();
    let config = SuiteConfig::from_env();
    Session::connect_when_healthy(config, Duration::from_secs(60))
        .await
        .expect("server did not become ready")
}

/// Drain the event queue until `pred` matches or `overall` expires
///
/// A live server interleaves unrelated events (other entities changing
/// state), so tests select their own instead of asserting on the next
/// frame.
pub async fn recv_matching<F>(
    ws: &WsClient,
    overall: Duration,
    mut pred: F,
) -> Option<EventMessage>
where
    F: FnMut(&EventMessage) -> bool,
{
    let deadline = Instant::now() + overall;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match ws.recv_event(remaining).await {
            Ok(event) if pred(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}
