//! MQTT client driver trait definition

use trait_variant::make;

use crate::core::{
    error::DriverResult,
    types::{InboundMessage, MqttConnectOptions},
};

/// Abstraction over an MQTT wire-protocol client
///
/// The driver owns the broker endpoint (host/port are fixed at driver
/// construction) and the wire framing; the session layer above it owns
/// connection policy and message dispatch.
#[make(Send)]
pub trait MqttDriver: Sync + 'static {
    /// Connect to the broker
    ///
    /// A connection failure carries the stack's numeric state code for
    /// diagnostics.
    async fn connect(&self, options: &MqttConnectOptions) -> DriverResult<()>;

    /// Disconnect from the broker
    async fn disconnect(&self) -> DriverResult<()>;

    /// Publish a message (QoS 0)
    async fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> DriverResult<()>;

    /// Subscribe to a topic filter
    async fn subscribe(&self, topic: &str, qos: u8) -> DriverResult<()>;

    /// Unsubscribe from a topic filter
    async fn unsubscribe(&self, topic: &str) -> DriverResult<()>;

    /// Whether a broker session is currently established
    async fn is_connected(&self) -> bool;

    /// Service keepalive and collect inbound messages
    ///
    /// Must be called periodically while connected. Non-blocking: returns
    /// whatever arrived since the previous poll.
    async fn poll(&self) -> DriverResult<Vec<InboundMessage>>;
}
