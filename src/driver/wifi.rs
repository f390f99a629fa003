//! WiFi driver trait definitions

use trait_variant::make;

use crate::core::{
    address::AddressConfig,
    error::DriverResult,
    types::{ApStatus, ScannedNetwork, StationStatus},
};

/// Abstraction over the station side of a WiFi stack
///
/// This trait enables testing by allowing mock implementations while
/// providing a standard interface for station operations.
#[make(Send)]
pub trait WifiStationDriver: Sync + 'static {
    /// Scan for visible networks
    ///
    /// Triggers a scan and returns the discovered networks. The scan
    /// operation may take several seconds.
    async fn scan(&self) -> DriverResult<Vec<ScannedNetwork>>;

    /// Apply a static addressing configuration to the interface
    ///
    /// Must be called before [`associate`](Self::associate); there is no
    /// rollback if a later association fails.
    async fn configure_static(&self, config: &AddressConfig) -> DriverResult<()>;

    /// Initiate association with a network
    ///
    /// Returns once the association has been handed to the stack; the
    /// caller observes progress through [`status`](Self::status).
    async fn associate(&self, ssid: &str, credential: Option<&str>) -> DriverResult<()>;

    /// Current station status (state, SSID, addressing, signal)
    async fn status(&self) -> DriverResult<StationStatus>;

    /// Tear down the current association
    async fn disconnect(&self) -> DriverResult<()>;
}

/// Abstraction over the access-point side of a WiFi stack
#[make(Send)]
pub trait WifiApDriver: Sync + 'static {
    /// Start an access point
    ///
    /// A `None` passphrase starts an open network. Visibility and capacity
    /// are fixed for the lifetime of the AP.
    async fn start(
        &self,
        ssid: &str,
        passphrase: Option<&str>,
        channel: u8,
        hidden: bool,
        max_clients: u8,
    ) -> DriverResult<()>;

    /// Stop the access point, disconnecting all stations
    async fn stop(&self) -> DriverResult<()>;

    /// Number of currently attached stations
    async fn station_count(&self) -> DriverResult<u32>;

    /// AP-side addressing snapshot
    async fn info(&self) -> DriverResult<ApStatus>;
}
