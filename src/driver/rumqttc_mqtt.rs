//! MQTT client driver over rumqttc
//!
//! Wraps an AsyncClient plus its event loop, which runs in a spawned
//! task. The task keeps the connected flag current and buffers inbound
//! publishes until the next driver poll.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, MqttOptions, Packet, QoS};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

use crate::{
    core::{
        error::{DriverError, DriverResult},
        types::{InboundMessage, MqttConnectOptions},
    },
    driver::mqtt::MqttDriver,
};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const CONNACK_TIMEOUT: Duration = Duration::from_secs(10);

fn qos_from_u8(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn return_code_as_i32(code: ConnectReturnCode) -> i32 {
    match code {
        ConnectReturnCode::Success => 0,
        ConnectReturnCode::RefusedProtocolVersion => 1,
        ConnectReturnCode::BadClientId => 2,
        ConnectReturnCode::ServiceUnavailable => 3,
        ConnectReturnCode::BadUserNamePassword => 4,
        ConnectReturnCode::NotAuthorized => 5,
    }
}

fn refusal_error(code: ConnectReturnCode) -> DriverError {
    DriverError::Broker {
        code: return_code_as_i32(code),
        message: format!("broker refused connection: {code:?}"),
    }
}

/// MQTT client driver backed by rumqttc
pub struct RumqttcMqtt {
    host: String,
    port: u16,
    client: Mutex<Option<AsyncClient>>,
    connected: Arc<AtomicBool>,
    inbound: Arc<Mutex<Vec<InboundMessage>>>,
}

impl RumqttcMqtt {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            inbound: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MqttDriver for RumqttcMqtt {
    async fn connect(&self, options: &MqttConnectOptions) -> DriverResult<()> {
        let mut mqtt_options =
            MqttOptions::new(options.client_id.clone(), self.host.clone(), self.port);
        mqtt_options.set_keep_alive(KEEP_ALIVE);
        mqtt_options.set_clean_session(options.clean_session);

        if let (Some(username), Some(password)) = (&options.username, &options.password) {
            mqtt_options.set_credentials(username.clone(), password.clone());
        }
        if let Some(will) = &options.will {
            mqtt_options.set_last_will(rumqttc::LastWill::new(
                will.topic.clone(),
                will.message.clone().into_bytes(),
                QoS::AtMostOnce,
                will.retain,
            ));
        }

        let (client, mut event_loop) = AsyncClient::new(mqtt_options, 16);

        let connected = self.connected.clone();
        let inbound = self.inbound.clone();
        let (ack_tx, ack_rx) = oneshot::channel::<Result<(), DriverError>>();

        tokio::spawn(async move {
            let mut ack_tx = Some(ack_tx);
            loop {
                match event_loop.poll().await {
                    // A refused CONNACK surfaces as ConnectionRefused from
                    // poll(), so an incoming ConnAck is always a success.
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected.store(true, Ordering::SeqCst);
                        if let Some(tx) = ack_tx.take() {
                            let _ = tx.send(Ok(()));
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        debug!(topic = %publish.topic, len = publish.payload.len(), "publish received");
                        inbound.lock().await.push(InboundMessage {
                            topic: publish.topic.to_string(),
                            payload: publish.payload.to_vec(),
                        });
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        connected.store(false, Ordering::SeqCst);
                        break;
                    }
                    Ok(_) => {}
                    Err(ConnectionError::ConnectionRefused(code)) => {
                        warn!(?code, "broker refused connection");
                        connected.store(false, Ordering::SeqCst);
                        if let Some(tx) = ack_tx.take() {
                            let _ = tx.send(Err(refusal_error(code)));
                        }
                        break;
                    }
                    Err(e) => {
                        warn!("MQTT event loop error: {e}");
                        connected.store(false, Ordering::SeqCst);
                        if let Some(tx) = ack_tx.take() {
                            let _ = tx.send(Err(DriverError::Unavailable(e.to_string())));
                        }
                        break;
                    }
                }
            }
            debug!("MQTT event loop ended");
        });

        match tokio::time::timeout(CONNACK_TIMEOUT, ack_rx).await {
            Ok(Ok(Ok(()))) => {
                *self.client.lock().await = Some(client);
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(DriverError::Unavailable("event loop terminated".into())),
            Err(_) => Err(DriverError::Unavailable("CONNACK timeout".into())),
        }
    }

    async fn disconnect(&self) -> DriverResult<()> {
        let client = self.client.lock().await.take();
        self.connected.store(false, Ordering::SeqCst);
        if let Some(client) = client {
            client
                .disconnect()
                .await
                .map_err(|e| DriverError::Operation(e.to_string()))?;
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> DriverResult<()> {
        let client = self.client.lock().await;
        let Some(client) = client.as_ref() else {
            return Err(DriverError::Operation("no MQTT session".into()));
        };
        client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))
    }

    async fn subscribe(&self, topic: &str, qos: u8) -> DriverResult<()> {
        let client = self.client.lock().await;
        let Some(client) = client.as_ref() else {
            return Err(DriverError::Operation("no MQTT session".into()));
        };
        client
            .subscribe(topic, qos_from_u8(qos))
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))
    }

    async fn unsubscribe(&self, topic: &str) -> DriverResult<()> {
        let client = self.client.lock().await;
        let Some(client) = client.as_ref() else {
            return Err(DriverError::Operation("no MQTT session".into()));
        };
        client
            .unsubscribe(topic)
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn poll(&self) -> DriverResult<Vec<InboundMessage>> {
        Ok(std::mem::take(&mut *self.inbound.lock().await))
    }
}
