//! MQTT publish helper for exercising the server's MQTT bridge

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::config::SuiteConfig;
use crate::error::{SuiteError, SuiteResult};

/// How long to wait for the broker to acknowledge the connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a state publish so the bridge can ingest it before the
/// test reads the resulting state back
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Fire-and-forget publisher for the server's MQTT ingress
///
/// The probe only writes. Assertions are always made over REST or the
/// WebSocket API after the settle delay.
pub struct MqttProbe {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl MqttProbe {
    /// Connect to the broker named in the suite configuration
    pub async fn connect(config: &SuiteConfig) -> SuiteResult<Self> {
        let client_id = format!("ha-conformance-{}", Ulid::new().to_string().to_lowercase());
        let mut options = MqttOptions::new(&client_id, &config.mqtt_host, config.mqtt_port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        loop {
            match tokio::time::timeout(CONNECT_TIMEOUT, eventloop.poll()).await {
                Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => break,
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(SuiteError::MqttConnection(e)),
                Err(_) => return Err(SuiteError::Timeout("waiting for CONNACK".to_string())),
            }
        }
        debug!(client_id = %client_id, "MQTT probe connected");

        // Keep the event loop turning so queued publishes reach the wire.
        let driver = tokio::spawn(async move {
            loop {
                if let Err(e) = eventloop.poll().await {
                    warn!("MQTT event loop stopped: {}", e);
                    break;
                }
            }
        });

        Ok(Self { client, driver })
    }

    /// Publish a retained state payload to `home/{domain}/{object_id}/state`
    ///
    /// Returns after the settle delay, at which point the caller can read
    /// the resulting entity state back over REST or WebSocket.
    pub async fn publish_state(
        &self,
        domain: &str,
        object_id: &str,
        payload: &str,
    ) -> SuiteResult<()> {
        let topic = format!("home/{}/{}/state", domain, object_id);
        self.client
            .publish(&topic, QoS::AtMostOnce, true, payload.as_bytes().to_vec())
            .await?;
        debug!(topic = %topic, payload = %payload, "published state");
        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Publish a non-retained payload to an arbitrary topic
    pub async fn publish(&self, topic: &str, payload: &str) -> SuiteResult<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await?;
        Ok(())
    }

    /// Politely disconnect from the broker
    pub async fn disconnect(self) {
        self.client.disconnect().await.ok();
    }
}

impl Drop for MqttProbe {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
