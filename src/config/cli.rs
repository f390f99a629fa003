//! Command-line argument parsing

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(name = "wireless-link-service", version, author)]
#[clap(about = "Connection-lifecycle service for WiFi, Bluetooth Classic, BLE and MQTT links")]
pub struct CliArgs {
    /// Wireless network interface name
    #[clap(short, long, default_value = "wlan0")]
    pub interface: String,

    /// Device name advertised over BLE and used as Bluetooth alias
    #[clap(short = 'n', long, default_value = "wireless-link")]
    pub device_name: String,

    /// SSID to connect to at startup; no station connect when omitted
    #[clap(short, long)]
    pub ssid: Option<String>,

    /// Passphrase for the startup SSID
    #[clap(short, long)]
    pub passphrase: Option<String>,

    /// Station connect timeout in seconds
    #[clap(long, default_value = "30")]
    pub connect_timeout_secs: u64,

    /// Enable the BLE GATT server
    #[clap(long, default_value = "true")]
    pub enable_ble: bool,

    /// MQTT broker host; the broker session stays down when omitted
    #[clap(long)]
    pub mqtt_host: Option<String>,

    /// MQTT broker port
    #[clap(long, default_value = "1883")]
    pub mqtt_port: u16,

    /// MQTT client identifier
    #[clap(long, default_value = "wireless-link")]
    pub mqtt_client_id: String,

    /// Application loop poll interval in milliseconds
    #[clap(long, default_value = "100")]
    pub poll_interval_ms: u64,

    /// Log warnings and errors only
    #[clap(short, long)]
    pub quiet: bool,
}
