//! Main wireless link service facade

use std::sync::Arc;

use crate::{
    core::{
        error::LinkResult,
        types::{
            ApConfig, ApStatus, ConnectionTarget, DiscoveredDevice, LinkState, MqttConnectOptions,
            RetryPolicy, StationOptions, StationStatus,
        },
    },
    driver::{BleDriver, BtClassicDriver, MqttDriver, WifiApDriver, WifiStationDriver},
    link::{
        access_point::ApController, ble::BleSession, bt_classic::BtConnector, mqtt::MqttSession,
        station::StationConnector,
    },
};

/// Main wireless link service facade
///
/// Orchestrates the per-transport session managers over one driver each.
/// Callers drive the event-driven transports by calling [`Self::poll`]
/// from their application loop.
pub struct WirelessLinkService<W, A, B, L, M>
where
    W: WifiStationDriver,
    A: WifiApDriver,
    B: BtClassicDriver,
    L: BleDriver,
    M: MqttDriver,
{
    pub station: Arc<StationConnector<W>>,
    pub access_point: Arc<ApController<A>>,
    pub bt_classic: Arc<BtConnector<B>>,
    pub ble: Arc<BleSession<L>>,
    pub mqtt: Arc<MqttSession<M>>,
}

impl<W, A, B, L, M> WirelessLinkService<W, A, B, L, M>
where
    W: WifiStationDriver,
    A: WifiApDriver,
    B: BtClassicDriver,
    L: BleDriver,
    M: MqttDriver,
{
    /// Create a new wireless link service
    pub fn new(
        station: Arc<W>,
        access_point: Arc<A>,
        bt_classic: Arc<B>,
        ble: Arc<L>,
        mqtt: Arc<M>,
    ) -> Self {
        Self {
            station: Arc::new(StationConnector::new(station)),
            access_point: Arc::new(ApController::new(access_point)),
            bt_classic: Arc::new(BtConnector::new(bt_classic)),
            ble: Arc::new(BleSession::new(ble)),
            mqtt: Arc::new(MqttSession::new(mqtt)),
        }
    }

    /// Connect to a WiFi network as a station
    pub async fn connect_station(
        &self,
        target: &ConnectionTarget,
        options: &StationOptions,
    ) -> LinkResult<StationStatus> {
        self.station.connect(target, options).await
    }

    /// Get station connection status
    pub async fn station_status(&self) -> LinkResult<StationStatus> {
        self.station.status().await
    }

    /// Get station link state
    pub async fn station_state(&self) -> LinkState {
        self.station.state().await
    }

    /// Start the local access point
    pub async fn start_access_point(&self, config: &ApConfig) -> LinkResult<()> {
        self.access_point.start(config).await
    }

    /// Stop the local access point
    pub async fn stop_access_point(&self) -> LinkResult<()> {
        self.access_point.stop().await
    }

    /// Get access point status
    pub async fn access_point_status(&self) -> LinkResult<ApStatus> {
        self.access_point.status().await
    }

    /// Discover and connect to a Bluetooth Classic peer
    pub async fn connect_bt(
        &self,
        target: &ConnectionTarget,
        policy: &RetryPolicy,
    ) -> LinkResult<DiscoveredDevice> {
        self.bt_classic.discover_and_connect(target, policy).await
    }

    /// Bring up the BLE GATT server and start advertising
    pub async fn start_ble(&self) -> LinkResult<()> {
        self.ble.start().await
    }

    /// Connect to the MQTT broker
    pub async fn connect_mqtt(&self, options: &MqttConnectOptions) -> LinkResult<()> {
        self.mqtt.connect(options).await
    }

    /// Service all event-driven transports
    ///
    /// Drains Bluetooth Classic serial input, reconciles the BLE
    /// attachment state and services the MQTT session. Errors from one
    /// transport do not stop the others; the first one is returned.
    pub async fn poll(&self) -> LinkResult<()> {
        let bt = self.bt_classic.poll().await;
        let ble = self.ble.poll().await;
        let mqtt = self.mqtt.poll().await;
        bt.and(ble).and(mqtt)
    }
}
