//! Mock drivers for testing
//!
//! Allow configuring behavior for tests without requiring actual radio
//! hardware. Every mock records call counts so tests can assert which
//! driver operations an orchestration path touched.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::{
    core::{
        address::AddressConfig,
        error::{DriverError, DriverResult},
        types::{
            ApStatus, DiscoveredDevice, InboundMessage, LinkState, MqttConnectOptions,
            ScannedNetwork, StationStatus,
        },
    },
    driver::{
        ble::{BleDriver, BleEvent},
        bt::BtClassicDriver,
        mqtt::MqttDriver,
        wifi::{WifiApDriver, WifiStationDriver},
    },
};

// ---------------------------------------------------------------------------
// WiFi station
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StationState {
    scan_results: Vec<ScannedNetwork>,
    should_fail_scan: bool,
    should_fail_configure: bool,
    should_fail_associate: bool,
    /// Report Connected once this many status polls have happened
    connect_after_polls: Option<u32>,
    applied_config: Option<AddressConfig>,
    associated: Option<(String, Option<String>)>,
    scan_calls: u32,
    configure_calls: u32,
    associate_calls: u32,
    status_calls: u32,
}

/// Mock WiFi station driver
#[derive(Debug, Clone, Default)]
pub struct MockStationDriver {
    inner: Arc<Mutex<StationState>>,
}

impl MockStationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_scan_results(&self, networks: Vec<ScannedNetwork>) {
        self.inner.lock().await.scan_results = networks;
    }

    pub async fn set_scan_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_scan = should_fail;
    }

    pub async fn set_configure_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_configure = should_fail;
    }

    pub async fn set_associate_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_associate = should_fail;
    }

    /// Report Connected from the Nth status poll onwards (1-based);
    /// `None` means the status never leaves Connecting.
    pub async fn set_connect_after_polls(&self, polls: Option<u32>) {
        self.inner.lock().await.connect_after_polls = polls;
    }

    pub async fn scan_calls(&self) -> u32 {
        self.inner.lock().await.scan_calls
    }

    pub async fn configure_calls(&self) -> u32 {
        self.inner.lock().await.configure_calls
    }

    pub async fn associate_calls(&self) -> u32 {
        self.inner.lock().await.associate_calls
    }

    pub async fn status_calls(&self) -> u32 {
        self.inner.lock().await.status_calls
    }

    pub async fn applied_config(&self) -> Option<AddressConfig> {
        self.inner.lock().await.applied_config
    }

    pub async fn associated(&self) -> Option<(String, Option<String>)> {
        self.inner.lock().await.associated.clone()
    }
}

impl WifiStationDriver for MockStationDriver {
    async fn scan(&self) -> DriverResult<Vec<ScannedNetwork>> {
        let mut state = self.inner.lock().await;
        state.scan_calls += 1;
        if state.should_fail_scan {
            Err(DriverError::ScanFailed("mock scan failure".into()))
        } else {
            Ok(state.scan_results.clone())
        }
    }

    async fn configure_static(&self, config: &AddressConfig) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.configure_calls += 1;
        if state.should_fail_configure {
            Err(DriverError::Operation("mock configure failure".into()))
        } else {
            state.applied_config = Some(*config);
            Ok(())
        }
    }

    async fn associate(&self, ssid: &str, credential: Option<&str>) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.associate_calls += 1;
        if state.should_fail_associate {
            Err(DriverError::Operation("mock associate failure".into()))
        } else {
            state.associated = Some((ssid.to_string(), credential.map(Into::into)));
            Ok(())
        }
    }

    async fn status(&self) -> DriverResult<StationStatus> {
        let mut state = self.inner.lock().await;
        state.status_calls += 1;

        let connected = matches!(state.connect_after_polls, Some(n) if state.status_calls >= n);
        if connected {
            let ssid = state.associated.as_ref().map(|(ssid, _)| ssid.clone());
            Ok(StationStatus {
                state: LinkState::Connected,
                ssid,
                ip_address: Some("192.168.1.100".into()),
                mac: Some("aa:bb:cc:dd:ee:ff".into()),
                rssi: Some(-55),
            })
        } else if state.associated.is_some() {
            Ok(StationStatus {
                state: LinkState::Connecting,
                ssid: None,
                ip_address: None,
                mac: None,
                rssi: None,
            })
        } else {
            Ok(StationStatus::idle())
        }
    }

    async fn disconnect(&self) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.associated = None;
        state.connect_after_polls = None;
        state.status_calls = 0;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WiFi access point
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ApState {
    should_fail_start: bool,
    started: Option<StartedAp>,
    station_count: u32,
    start_calls: u32,
    stop_calls: u32,
}

/// Arguments the AP driver was started with, recorded for assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedAp {
    pub ssid: String,
    pub passphrase: Option<String>,
    pub channel: u8,
    pub hidden: bool,
    pub max_clients: u8,
}

/// Mock WiFi access-point driver
#[derive(Debug, Clone, Default)]
pub struct MockApDriver {
    inner: Arc<Mutex<ApState>>,
}

impl MockApDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_start_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_start = should_fail;
    }

    pub async fn set_station_count(&self, count: u32) {
        self.inner.lock().await.station_count = count;
    }

    pub async fn started(&self) -> Option<StartedAp> {
        self.inner.lock().await.started.clone()
    }

    pub async fn start_calls(&self) -> u32 {
        self.inner.lock().await.start_calls
    }

    pub async fn stop_calls(&self) -> u32 {
        self.inner.lock().await.stop_calls
    }
}

impl WifiApDriver for MockApDriver {
    async fn start(
        &self,
        ssid: &str,
        passphrase: Option<&str>,
        channel: u8,
        hidden: bool,
        max_clients: u8,
    ) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.start_calls += 1;
        if state.should_fail_start {
            Err(DriverError::Operation("mock AP start failure".into()))
        } else {
            state.started = Some(StartedAp {
                ssid: ssid.to_string(),
                passphrase: passphrase.map(Into::into),
                channel,
                hidden,
                max_clients,
            });
            Ok(())
        }
    }

    async fn stop(&self) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.stop_calls += 1;
        state.started = None;
        state.station_count = 0;
        Ok(())
    }

    async fn station_count(&self) -> DriverResult<u32> {
        Ok(self.inner.lock().await.station_count)
    }

    async fn info(&self) -> DriverResult<ApStatus> {
        let state = self.inner.lock().await;
        Ok(ApStatus {
            station_count: state.station_count,
            ip_address: state.started.as_ref().map(|_| "192.168.4.1".into()),
            mac: Some("02:00:00:00:aa:01".into()),
        })
    }
}

// ---------------------------------------------------------------------------
// Bluetooth Classic
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BtState {
    /// Devices surfaced during each successive discovery window
    discovery_batches: Vec<Vec<DiscoveredDevice>>,
    should_fail_connect: bool,
    should_fail_stop: bool,
    connected: bool,
    inbound: Vec<String>,
    written: Vec<String>,
    discovery_starts: u32,
    discovery_stops: u32,
    connect_calls: u32,
    connect_addresses: Vec<String>,
}

/// Mock Bluetooth Classic driver
#[derive(Debug, Clone, Default)]
pub struct MockBtDriver {
    inner: Arc<Mutex<BtState>>,
}

impl MockBtDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices to surface during the next discovery window (one call per
    /// window; later windows reuse the last configured batch)
    pub async fn push_discovery_batch(&self, devices: Vec<DiscoveredDevice>) {
        self.inner.lock().await.discovery_batches.push(devices);
    }

    pub async fn set_connect_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_connect = should_fail;
    }

    pub async fn set_stop_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_stop = should_fail;
    }

    pub async fn queue_inbound(&self, message: impl Into<String>) {
        self.inner.lock().await.inbound.push(message.into());
    }

    pub async fn written(&self) -> Vec<String> {
        self.inner.lock().await.written.clone()
    }

    pub async fn discovery_starts(&self) -> u32 {
        self.inner.lock().await.discovery_starts
    }

    pub async fn discovery_stops(&self) -> u32 {
        self.inner.lock().await.discovery_stops
    }

    pub async fn connect_calls(&self) -> u32 {
        self.inner.lock().await.connect_calls
    }

    pub async fn connect_addresses(&self) -> Vec<String> {
        self.inner.lock().await.connect_addresses.clone()
    }
}

impl BtClassicDriver for MockBtDriver {
    async fn start_discovery(&self) -> DriverResult<mpsc::Receiver<DiscoveredDevice>> {
        let mut state = self.inner.lock().await;
        state.discovery_starts += 1;

        let batch_index = (state.discovery_starts as usize - 1)
            .min(state.discovery_batches.len().saturating_sub(1));
        let devices = state
            .discovery_batches
            .get(batch_index)
            .cloned()
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel(devices.len().max(1));
        for device in devices {
            // Capacity matches the batch; sends cannot block.
            let _ = tx.try_send(device);
        }
        Ok(rx)
    }

    async fn stop_discovery(&self) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.discovery_stops += 1;
        if state.should_fail_stop {
            Err(DriverError::Operation("mock BT stop failure".into()))
        } else {
            Ok(())
        }
    }

    async fn connect(&self, address: &str) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.connect_calls += 1;
        state.connect_addresses.push(address.to_string());
        if state.should_fail_connect {
            Err(DriverError::Operation("mock BT connect failure".into()))
        } else {
            state.connected = true;
            Ok(())
        }
    }

    async fn is_connected(&self) -> bool {
        self.inner.lock().await.connected
    }

    async fn read_pending(&self) -> DriverResult<Option<String>> {
        let mut state = self.inner.lock().await;
        if state.inbound.is_empty() {
            Ok(None)
        } else {
            Ok(Some(state.inbound.remove(0)))
        }
    }

    async fn write(&self, data: &str) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        if !state.connected {
            return Err(DriverError::Operation("not connected".into()));
        }
        state.written.push(data.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BLE
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BleState {
    events_tx: Option<mpsc::Sender<BleEvent>>,
    should_fail_notify: bool,
    notified: Vec<Vec<u8>>,
    advertising_restarts: u32,
}

/// Mock BLE peripheral driver
#[derive(Debug, Clone, Default)]
pub struct MockBleDriver {
    inner: Arc<Mutex<BleState>>,
}

impl MockBleDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject an event as if it came from stack-owned context
    pub async fn emit(&self, event: BleEvent) {
        let tx = self.inner.lock().await.events_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    pub async fn set_notify_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_notify = should_fail;
    }

    pub async fn notified(&self) -> Vec<Vec<u8>> {
        self.inner.lock().await.notified.clone()
    }

    pub async fn advertising_restarts(&self) -> u32 {
        self.inner.lock().await.advertising_restarts
    }
}

impl BleDriver for MockBleDriver {
    async fn start(&self) -> DriverResult<mpsc::Receiver<BleEvent>> {
        let mut state = self.inner.lock().await;
        if state.events_tx.is_some() {
            return Err(DriverError::Operation("BLE server already started".into()));
        }
        let (tx, rx) = mpsc::channel(16);
        state.events_tx = Some(tx);
        Ok(rx)
    }

    async fn start_advertising(&self) -> DriverResult<()> {
        self.inner.lock().await.advertising_restarts += 1;
        Ok(())
    }

    async fn set_value_and_notify(&self, value: &[u8]) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        if state.should_fail_notify {
            Err(DriverError::Operation("mock notify failure".into()))
        } else {
            state.notified.push(value.to_vec());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// MQTT
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MqttState {
    connected: bool,
    fail_connect_code: Option<i32>,
    last_connect: Option<MqttConnectOptions>,
    inbound: Vec<InboundMessage>,
    published: Vec<(String, Vec<u8>, bool)>,
    subscriptions: Vec<(String, u8)>,
    unsubscriptions: Vec<String>,
    connect_calls: u32,
    publish_calls: u32,
    subscribe_calls: u32,
    unsubscribe_calls: u32,
    poll_calls: u32,
}

/// Mock MQTT client driver
#[derive(Debug, Clone, Default)]
pub struct MockMqttDriver {
    inner: Arc<Mutex<MqttState>>,
}

impl MockMqttDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make connect fail with the given stack state code
    pub async fn set_connect_failure(&self, code: Option<i32>) {
        self.inner.lock().await.fail_connect_code = code;
    }

    pub async fn queue_inbound(&self, message: InboundMessage) {
        self.inner.lock().await.inbound.push(message);
    }

    /// Simulate the broker dropping the session
    pub async fn drop_connection(&self) {
        self.inner.lock().await.connected = false;
    }

    pub async fn last_connect_options(&self) -> Option<MqttConnectOptions> {
        self.inner.lock().await.last_connect.clone()
    }

    pub async fn published(&self) -> Vec<(String, Vec<u8>, bool)> {
        self.inner.lock().await.published.clone()
    }

    pub async fn subscriptions(&self) -> Vec<(String, u8)> {
        self.inner.lock().await.subscriptions.clone()
    }

    pub async fn publish_calls(&self) -> u32 {
        self.inner.lock().await.publish_calls
    }

    pub async fn subscribe_calls(&self) -> u32 {
        self.inner.lock().await.subscribe_calls
    }

    pub async fn unsubscribe_calls(&self) -> u32 {
        self.inner.lock().await.unsubscribe_calls
    }
}

impl MqttDriver for MockMqttDriver {
    async fn connect(&self, options: &MqttConnectOptions) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.connect_calls += 1;
        state.last_connect = Some(options.clone());
        if let Some(code) = state.fail_connect_code {
            Err(DriverError::Broker {
                code,
                message: "mock broker refusal".into(),
            })
        } else {
            state.connected = true;
            Ok(())
        }
    }

    async fn disconnect(&self) -> DriverResult<()> {
        self.inner.lock().await.connected = false;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.publish_calls += 1;
        state
            .published
            .push((topic.to_string(), payload.to_vec(), retain));
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: u8) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.subscribe_calls += 1;
        state.subscriptions.push((topic.to_string(), qos));
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> DriverResult<()> {
        let mut state = self.inner.lock().await;
        state.unsubscribe_calls += 1;
        state.unsubscriptions.push(topic.to_string());
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.inner.lock().await.connected
    }

    async fn poll(&self) -> DriverResult<Vec<InboundMessage>> {
        let mut state = self.inner.lock().await;
        state.poll_calls += 1;
        Ok(std::mem::take(&mut state.inbound))
    }
}
