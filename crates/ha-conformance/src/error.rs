//! Error types for the conformance suite helpers

use thiserror::Error;

/// Result type for suite operations
pub type SuiteResult<T> = Result<T, SuiteError>;

/// Errors that can occur while driving the system under test
#[derive(Debug, Error)]
pub enum SuiteError {
    /// WebSocket client failure
    #[error(transparent)]
    Ws(#[from] ha_ws_client::WsError),

    /// HTTP request failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT connection lost or refused
    #[error("MQTT connection failed: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),

    /// MQTT client request could not be queued
    #[error("MQTT client error: {0}")]
    MqttClient(#[from] rumqttc::ClientError),

    /// A suite-level deadline expired
    #[error("timed out: {0}")]
    Timeout(String),
}
