//! Configuration for the conformance test environment

use std::env;
use std::time::Duration;

/// Where to find the system under test
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// REST base URL of the system under test
    pub base_url: String,
    /// Long-lived bearer token accepted by the REST and WebSocket APIs
    pub token: String,
    /// MQTT broker host the server is bridged to
    pub mqtt_host: String,
    /// MQTT broker port
    pub mqtt_port: u16,
    /// Default deadline for a single WebSocket command round trip
    pub command_timeout: Duration,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SuiteConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let command_timeout_secs = env::var("SUT_COMMAND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            base_url: env::var("SUT_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8123".to_string()),
            token: env::var("SUT_TOKEN").unwrap_or_default(),
            mqtt_host: env::var("SUT_MQTT_HOST").unwrap_or_else(|_| "localhost".to_string()),
            mqtt_port: env::var("SUT_MQTT_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1883),
            command_timeout: Duration::from_secs(command_timeout_secs),
        }
    }

    /// Derive the WebSocket endpoint from the REST base URL
    pub fn ws_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/api/websocket", ws_base)
    }
}
