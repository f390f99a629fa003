//! Runtime settings

use std::time::Duration;

use crate::config::CliArgs;

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub interface: String,
    pub device_name: String,
    pub ssid: Option<String>,
    pub passphrase: Option<String>,
    pub connect_timeout: Duration,
    pub enable_ble: bool,
    pub mqtt_host: Option<String>,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub poll_interval: Duration,
    pub quiet: bool,
}

impl From<CliArgs> for Settings {
    fn from(args: CliArgs) -> Self {
        Settings {
            interface: args.interface,
            device_name: args.device_name,
            ssid: args.ssid,
            passphrase: args.passphrase,
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            enable_ble: args.enable_ble,
            mqtt_host: args.mqtt_host,
            mqtt_port: args.mqtt_port,
            mqtt_client_id: args.mqtt_client_id,
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(10)),
            quiet: args.quiet,
        }
    }
}
