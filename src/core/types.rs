//! Domain types for the wireless link service

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How an advertised name is matched against a [`ConnectionTarget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Advertised name must equal the target name
    Exact,
    /// Advertised name must contain the target name as a substring
    Partial,
}

/// The endpoint a connection attempt is aimed at
///
/// Immutable for the duration of an attempt. The name is an SSID for WiFi
/// and an advertised device name for Bluetooth Classic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// SSID or advertised device name
    pub name: String,
    /// Passphrase or PIN, if the endpoint requires one
    pub credential: Option<String>,
    /// Name match policy (WiFi station always matches exactly)
    pub match_policy: MatchPolicy,
}

impl ConnectionTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credential: None,
            match_policy: MatchPolicy::Exact,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    /// Evaluate the match predicate against an advertised name
    ///
    /// An empty advertised name never matches, regardless of policy.
    pub fn matches(&self, advertised: &str) -> bool {
        if advertised.is_empty() {
            return false;
        }
        match self.match_policy {
            MatchPolicy::Exact => advertised == self.name,
            MatchPolicy::Partial => advertised.contains(&self.name),
        }
    }
}

/// Bounded-attempt retry policy for discovery-style connectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    /// Duration of a single discovery window
    pub scan_window: Duration,
    /// Delay between consecutive attempts
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy; an attempt count of zero is treated as one
    pub fn new(max_attempts: u32, scan_window: Duration, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            scan_window,
            retry_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(5), Duration::from_secs(1))
    }
}

/// How a station connect interprets its timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Timeout converted to a fixed status-poll budget (`timeout / 500 ms`,
    /// rounded down). Drift from slow polls accumulates and is accepted.
    #[default]
    PollBudget,
    /// Monotonic-clock deadline; robust when individual polls are delayed
    Deadline,
}

/// Options for a single WiFi station connect call
#[derive(Debug, Clone, Default)]
pub struct StationOptions {
    /// Overall budget for the status-poll phase
    pub timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
    /// Raw static addressing fields; all `None` means DHCP
    pub addressing: StaticAddressing,
}

impl StationOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Raw textual addressing fields as supplied by the caller
///
/// Validated into an [`AddressConfig`](crate::core::address::AddressConfig)
/// before any driver call. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAddressing {
    pub ip: Option<String>,
    pub gateway: Option<String>,
    pub subnet: Option<String>,
    pub dns1: Option<String>,
    pub dns2: Option<String>,
}

impl StaticAddressing {
    /// True when no field is present (DHCP path)
    pub fn is_empty(&self) -> bool {
        fn absent(field: &Option<String>) -> bool {
            field.as_deref().is_none_or(str::is_empty)
        }
        absent(&self.ip)
            && absent(&self.gateway)
            && absent(&self.subnet)
            && absent(&self.dns1)
            && absent(&self.dns2)
    }
}

/// A device surfacing during a Bluetooth Classic discovery window
///
/// Ephemeral: produced while the window is open and discarded once it
/// closes or a match is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Advertised device name (may be empty)
    pub name: String,
    /// Stack-specific device address
    pub address: String,
    /// Signal strength in dBm
    pub rssi: i16,
}

/// Per-transport connection state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LinkState {
    Idle = 0,
    Scanning = 1,
    Connecting = 2,
    Connected = 3,
    Disconnected = 4,
    Failed = 5,
}

impl TryFrom<u8> for LinkState {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(LinkState::Idle),
            1 => Ok(LinkState::Scanning),
            2 => Ok(LinkState::Connecting),
            3 => Ok(LinkState::Connected),
            4 => Ok(LinkState::Disconnected),
            5 => Ok(LinkState::Failed),
            _ => Err(()),
        }
    }
}

impl From<LinkState> for u8 {
    fn from(state: LinkState) -> Self {
        state as u8
    }
}

/// Represents a WiFi network visible in a station scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScannedNetwork {
    /// Network SSID
    pub ssid: String,
    /// MAC address (BSSID)
    pub mac: String,
    /// Channel number
    pub channel: u16,
    /// Signal strength in dBm
    pub rssi: i16,
}

/// Station-side connection status with link details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StationStatus {
    pub state: LinkState,
    /// Connected network SSID (if associated)
    pub ssid: Option<String>,
    /// Assigned IP address (if connected)
    pub ip_address: Option<String>,
    /// Interface hardware address
    pub mac: Option<String>,
    /// Signal strength of the current association in dBm
    pub rssi: Option<i16>,
}

impl StationStatus {
    pub fn idle() -> Self {
        Self {
            state: LinkState::Idle,
            ssid: None,
            ip_address: None,
            mac: None,
            rssi: None,
        }
    }
}

/// Parameters for starting an access point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApConfig {
    pub ssid: String,
    /// Passphrase; shorter than 8 characters degrades to an open network
    pub passphrase: Option<String>,
    /// WiFi channel, 1 through 13
    pub channel: u8,
    /// Do not broadcast the SSID
    pub hidden: bool,
    pub max_clients: u8,
}

impl ApConfig {
    pub fn new(ssid: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            passphrase: None,
            channel: 1,
            hidden: false,
            max_clients: 4,
        }
    }
}

/// Read-only snapshot of a running access point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApStatus {
    /// Number of currently attached stations
    pub station_count: u32,
    /// AP-side IP address
    pub ip_address: Option<String>,
    /// AP-side hardware address
    pub mac: Option<String>,
}

/// Last-will message registered with an MQTT broker at connect time
///
/// The will is delivered by the broker if this client disconnects uncleanly.
/// QoS is fixed at 0; only the retain flag is caller-controlled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub message: String,
    pub retain: bool,
}

/// Parameters for an MQTT broker connection
#[derive(Debug, Clone, Default)]
pub struct MqttConnectOptions {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub will: Option<LastWill>,
    pub clean_session: bool,
}

impl MqttConnectOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            clean_session: true,
            ..Default::default()
        }
    }
}

/// An inbound MQTT message delivered to the registered handler
///
/// The payload is passed through raw; this layer does not reformat it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}
