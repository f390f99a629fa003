//! Driver abstraction layer
//!
//! Traits for the radio/protocol stacks this service orchestrates, plus
//! the concrete Linux implementations and the mocks used in tests.

pub mod ble;
pub mod bluer_ble;
pub mod bluer_bt;
pub mod bt;
pub mod hostapd;
pub mod mock;
pub mod mqtt;
pub mod rumqttc_mqtt;
pub mod wifi;
pub mod wifi_ctrl;

pub use ble::{BleDriver, BleEvent};
pub use bt::BtClassicDriver;
pub use mqtt::MqttDriver;
pub use wifi::{WifiApDriver, WifiStationDriver};

#[cfg(test)]
pub use mock::{MockApDriver, MockBleDriver, MockBtDriver, MockMqttDriver, MockStationDriver};
