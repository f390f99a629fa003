//! MQTT session manager
//!
//! Broker connection with optional last will, publish/subscribe gated on
//! an established session, and keepalive/inbound servicing through a
//! periodic poll. Dropped sessions are not reconnected automatically;
//! the caller detects the drop and re-invokes connect.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    core::{
        dispatch::{HandlerSlot, TopicHandler},
        error::{LinkError, LinkResult},
        types::MqttConnectOptions,
    },
    driver::MqttDriver,
};

/// MQTT session manager
pub struct MqttSession<D: MqttDriver> {
    driver: Arc<D>,
    handler: HandlerSlot<TopicHandler>,
}

impl<D: MqttDriver> MqttSession<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            handler: HandlerSlot::new(),
        }
    }

    /// Connect to the broker
    ///
    /// When a will is present it is registered at QoS 0 with the
    /// caller's retain flag. A failure carries the stack's numeric state
    /// code for diagnostics.
    pub async fn connect(&self, options: &MqttConnectOptions) -> LinkResult<()> {
        match self.driver.connect(options).await {
            Ok(()) => {
                info!(
                    client_id = %options.client_id,
                    will = options.will.is_some(),
                    "connected to broker"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    client_id = %options.client_id,
                    code = ?e.state_code(),
                    "broker connection failed"
                );
                Err(LinkError::Stack(e))
            }
        }
    }

    /// Disconnect from the broker
    pub async fn disconnect(&self) -> LinkResult<()> {
        self.driver.disconnect().await.map_err(LinkError::Stack)?;
        info!("disconnected from broker");
        Ok(())
    }

    /// Publish a message; fails without touching the wire when not connected
    pub async fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> LinkResult<()> {
        if !self.driver.is_connected().await {
            return Err(LinkError::NotConnected);
        }
        self.driver
            .publish(topic, payload, retain)
            .await
            .map_err(LinkError::Stack)?;
        debug!(topic, len = payload.len(), "published");
        Ok(())
    }

    /// Serialize a value as JSON and publish it
    pub async fn publish_json<T: serde::Serialize>(
        &self,
        topic: &str,
        value: &T,
        retain: bool,
    ) -> LinkResult<()> {
        let payload = serde_json::to_vec(value).map_err(|e| LinkError::Encode(e.to_string()))?;
        self.publish(topic, &payload, retain).await
    }

    /// Subscribe to a topic filter; no reconnection is attempted
    pub async fn subscribe(&self, topic: &str, qos: u8) -> LinkResult<()> {
        if !self.driver.is_connected().await {
            return Err(LinkError::NotConnected);
        }
        self.driver
            .subscribe(topic, qos)
            .await
            .map_err(LinkError::Stack)?;
        debug!(topic, qos, "subscribed");
        Ok(())
    }

    /// Unsubscribe from a topic filter
    pub async fn unsubscribe(&self, topic: &str) -> LinkResult<()> {
        if !self.driver.is_connected().await {
            return Err(LinkError::NotConnected);
        }
        self.driver
            .unsubscribe(topic)
            .await
            .map_err(LinkError::Stack)?;
        debug!(topic, "unsubscribed");
        Ok(())
    }

    /// Register the inbound message handler, replacing any previous one
    pub async fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        self.handler.register(Arc::new(handler)).await;
    }

    /// Service keepalive and deliver inbound messages
    ///
    /// Payloads are passed through raw, not reformatted. Call
    /// periodically from the application loop.
    pub async fn poll(&self) -> LinkResult<()> {
        let messages = self.driver.poll().await.map_err(LinkError::Stack)?;
        if messages.is_empty() {
            return Ok(());
        }
        let handler = self.handler.get().await;
        for message in messages {
            debug!(topic = %message.topic, len = message.payload.len(), "inbound message");
            if let Some(handler) = &handler {
                handler(&message.topic, &message.payload);
            }
        }
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.driver.is_connected().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::types::{InboundMessage, LastWill},
        driver::MockMqttDriver,
    };
    use std::sync::Mutex;

    fn options() -> MqttConnectOptions {
        MqttConnectOptions::new("unit-under-test")
    }

    #[tokio::test]
    async fn test_connect_without_will() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());

        session.connect(&options()).await.unwrap();
        assert!(session.is_connected().await);
        assert!(
            driver
                .last_connect_options()
                .await
                .unwrap()
                .will
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_connect_passes_will_through() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());

        let mut opts = options();
        opts.will = Some(LastWill {
            topic: "devices/42/status".into(),
            message: "offline".into(),
            retain: true,
        });
        session.connect(&opts).await.unwrap();

        let will = driver.last_connect_options().await.unwrap().will.unwrap();
        assert_eq!(will.topic, "devices/42/status");
        assert_eq!(will.message, "offline");
        assert!(will.retain);
    }

    #[tokio::test]
    async fn test_connect_failure_exposes_state_code() {
        let driver = Arc::new(MockMqttDriver::new());
        driver.set_connect_failure(Some(5)).await;

        let session = MqttSession::new(driver.clone());
        let err = session.connect(&options()).await.unwrap_err();
        match err {
            LinkError::Stack(e) => assert_eq!(e.state_code(), Some(5)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_never_reaches_driver() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());

        let err = session.publish("t", b"payload", false).await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
        assert_eq!(driver.publish_calls().await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe_gated_on_connection() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());

        assert!(session.subscribe("t", 0).await.is_err());
        assert!(session.unsubscribe("t").await.is_err());
        assert_eq!(driver.subscribe_calls().await, 0);
        assert_eq!(driver.unsubscribe_calls().await, 0);

        session.connect(&options()).await.unwrap();
        session.subscribe("commands/#", 1).await.unwrap();
        assert_eq!(
            driver.subscriptions().await,
            vec![("commands/#".to_string(), 1)]
        );
        session.unsubscribe("commands/#").await.unwrap();
        assert_eq!(driver.unsubscribe_calls().await, 1);
    }

    #[tokio::test]
    async fn test_publish_when_connected() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());
        session.connect(&options()).await.unwrap();

        session.publish("tele/state", b"on", true).await.unwrap();
        assert_eq!(
            driver.published().await,
            vec![("tele/state".to_string(), b"on".to_vec(), true)]
        );
    }

    #[tokio::test]
    async fn test_publish_json_serializes_payload() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());
        session.connect(&options()).await.unwrap();

        let status = crate::core::types::StationStatus::idle();
        session
            .publish_json("devices/42/station", &status, true)
            .await
            .unwrap();

        let published = driver.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "devices/42/station");
        assert!(published[0].2);
        let decoded: crate::core::types::StationStatus =
            serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(decoded, status);
    }

    #[tokio::test]
    async fn test_publish_json_gated_on_connection() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());

        let err = session
            .publish_json("t", &crate::core::types::StationStatus::idle(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
        assert_eq!(driver.publish_calls().await, 0);
    }

    #[tokio::test]
    async fn test_dropped_session_is_not_reconnected() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());
        session.connect(&options()).await.unwrap();

        driver.drop_connection().await;
        let err = session.publish("t", b"x", false).await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
        assert_eq!(driver.publish_calls().await, 0);
    }

    #[tokio::test]
    async fn test_poll_dispatches_raw_payload() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());
        session.connect(&options()).await.unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        session
            .set_message_handler(move |topic: &str, payload: &[u8]| {
                sink.lock()
                    .unwrap()
                    .push((topic.to_string(), payload.to_vec()));
            })
            .await;

        driver
            .queue_inbound(InboundMessage {
                topic: "sensors/temp".into(),
                payload: vec![0x00, 0xFF, b'!'],
            })
            .await;
        session.poll().await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "sensors/temp");
        // Binary payload delivered untouched.
        assert_eq!(received[0].1, vec![0x00, 0xFF, b'!']);
    }

    #[tokio::test]
    async fn test_poll_without_handler_discards_quietly() {
        let driver = Arc::new(MockMqttDriver::new());
        let session = MqttSession::new(driver.clone());
        session.connect(&options()).await.unwrap();

        driver
            .queue_inbound(InboundMessage {
                topic: "t".into(),
                payload: b"x".to_vec(),
            })
            .await;
        session.poll().await.unwrap();
    }
}
