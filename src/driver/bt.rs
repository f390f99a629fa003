//! Bluetooth Classic driver trait definition

use tokio::sync::mpsc;
use trait_variant::make;

use crate::core::{error::DriverResult, types::DiscoveredDevice};

/// Abstraction over a Bluetooth Classic (serial profile) stack
///
/// Discovery is asynchronous: devices surface on the returned channel as
/// the stack reports them, on stack-owned context. The serial byte stream
/// becomes available once [`connect`](Self::connect) succeeds.
#[make(Send)]
pub trait BtClassicDriver: Sync + 'static {
    /// Start an asynchronous discovery scan
    ///
    /// Each device the stack reports during the scan is delivered on the
    /// returned channel. The scan runs until
    /// [`stop_discovery`](Self::stop_discovery) is called.
    async fn start_discovery(&self) -> DriverResult<mpsc::Receiver<DiscoveredDevice>>;

    /// Stop the running discovery scan, releasing scan resources
    async fn stop_discovery(&self) -> DriverResult<()>;

    /// Attempt a connection to a device address
    async fn connect(&self, address: &str) -> DriverResult<()>;

    /// Whether a serial link is currently established
    async fn is_connected(&self) -> bool;

    /// Read pending inbound data, if any
    ///
    /// Returns `None` when nothing is available. Non-blocking.
    async fn read_pending(&self) -> DriverResult<Option<String>>;

    /// Write text to the serial link
    async fn write(&self, data: &str) -> DriverResult<()>;
}
