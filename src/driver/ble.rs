//! BLE peripheral driver trait definition

use tokio::sync::mpsc;
use trait_variant::make;

use crate::core::error::DriverResult;

/// Edge-triggered events delivered by the BLE stack
///
/// Events originate on stack-owned context and cross into the polling
/// world over a bounded channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    /// A central attached to the GATT server
    PeerAttached,
    /// The attached central detached
    PeerDetached,
    /// The peer wrote to the characteristic
    InboundWrite(Vec<u8>),
}

/// Abstraction over a BLE peripheral (GATT server) stack
///
/// Implementations own one GATT service with one characteristic supporting
/// read/write/notify/indicate plus a notification descriptor.
#[make(Send)]
pub trait BleDriver: Sync + 'static {
    /// Initialize the GATT server and begin advertising
    ///
    /// Returns the event channel for connection-state changes and inbound
    /// writes. Calling `start` twice is a driver error.
    async fn start(&self) -> DriverResult<mpsc::Receiver<BleEvent>>;

    /// Restart advertising so a new central can attach
    ///
    /// Used after a peer detaches; the advertisement content is unchanged.
    async fn start_advertising(&self) -> DriverResult<()>;

    /// Set the characteristic value and emit a notification
    async fn set_value_and_notify(&self, value: &[u8]) -> DriverResult<()>;
}
