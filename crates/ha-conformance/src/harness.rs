//! Session harness tying the suite helpers together

use std::time::Duration;

use ha_ws_client::{ConnectOptions, WsClient};
use tracing::info;
use ulid::Ulid;

use crate::config::SuiteConfig;
use crate::error::{SuiteError, SuiteResult};
use crate::rest::RestClient;

/// One authenticated session against the system under test
///
/// Bundles the REST and WebSocket clients a conformance test drives.
/// The MQTT probe is separate; only the bridge suite needs it.
pub struct Session {
    pub config: SuiteConfig,
    pub rest: RestClient,
    pub ws: WsClient,
}

impl Session {
    /// Connect both clients using the given configuration
    pub async fn connect(config: SuiteConfig) -> SuiteResult<Self> {
        let rest = RestClient::from_config(&config);
        let options = ConnectOptions::new(config.ws_url(), &config.token)
            .with_command_timeout(config.command_timeout);
        let ws = WsClient::connect_with(options).await?;
        info!(base_url = %config.base_url, "session connected");

        Ok(Self { config, rest, ws })
    }

    /// Wait for the server to answer `GET /api/`, then connect
    pub async fn connect_when_healthy(
        config: SuiteConfig,
        timeout: Duration,
    ) -> SuiteResult<Self> {
        let rest = RestClient::from_config(&config);
        if !rest.wait_for_healthy(timeout).await {
            return Err(SuiteError::Timeout(format!(
                "server at {} did not become healthy within {:?}",
                config.base_url, timeout
            )));
        }
        Self::connect(config).await
    }

    /// Close the WebSocket side of the session
    pub async fn close(&self) {
        self.ws.close().await;
    }
}

/// Generate a collision-free object id for test entities
///
/// Parallel suite runs against one server must not trample each other's
/// entities, so every test creates its own.
pub fn unique_object_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new().to_string().to_lowercase())
}

/// Install the test logger, honoring `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
