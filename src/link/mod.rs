//! Connection lifecycle managers
//!
//! One session manager per transport, each generic over its driver
//! trait, plus the facade that owns all five.

pub mod access_point;
pub mod ble;
pub mod bt_classic;
pub mod mqtt;
pub mod service;
pub mod station;

pub use access_point::ApController;
pub use ble::BleSession;
pub use bt_classic::BtConnector;
pub use mqtt::MqttSession;
pub use service::WirelessLinkService;
pub use station::StationConnector;
