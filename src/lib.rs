//! Wireless Link Service
//!
//! A connection-lifecycle service for the wireless links of an embedded
//! Linux device:
//! - WiFi station and local access point
//! - Bluetooth Classic serial peers
//! - BLE GATT server
//! - MQTT broker sessions

pub mod config;
pub mod core;
pub mod driver;
pub mod link;

pub use crate::core::{
    error::{DriverError, LinkError, ValidationError},
    types::{
        ApConfig, ApStatus, ConnectionTarget, DiscoveredDevice, LastWill, LinkState, MatchPolicy,
        MqttConnectOptions, RetryPolicy, ScannedNetwork, StationOptions, StationStatus,
        StaticAddressing, TimeoutPolicy,
    },
};
pub use link::WirelessLinkService;
