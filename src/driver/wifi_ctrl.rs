//! WiFi station driver over wpa_supplicant
//!
//! Talks to wpa_supplicant through its control socket via the wifi-ctrl
//! runtime. Static addressing and address lookups shell out to the `ip`
//! tool since wpa_supplicant does not manage layer 3.

use tokio::process::Command;
use tracing::{debug, error, warn};
use wifi_ctrl::sta::{RequestClient, WifiSetup};

use crate::{
    core::{
        address::AddressConfig,
        error::{DriverError, DriverResult},
        types::{LinkState, ScannedNetwork, StationStatus},
    },
    driver::wifi::WifiStationDriver,
};

/// WiFi station driver backed by wpa_supplicant
pub struct WifiCtrlStation {
    interface: String,
    client: RequestClient,
}

impl WifiCtrlStation {
    /// Connect to the wpa_supplicant control socket for `interface` and
    /// spawn the station runtime
    pub async fn new(interface: String) -> DriverResult<Self> {
        let path = format!("/var/run/wpa_supplicant/{interface}");
        let mut setup = WifiSetup::new().map_err(|e| DriverError::Unavailable(e.to_string()))?;
        setup.set_socket_path(path);

        let client = setup.get_request_client();
        let station = setup.complete();

        tokio::spawn(async move {
            if let Err(e) = station.run().await {
                error!("wpa_supplicant runtime error: {e}");
            }
        });

        Ok(Self { interface, client })
    }

    /// Convert frequency (MHz) to channel number
    fn frequency_to_channel(freq_str: &str) -> u16 {
        let freq = freq_str.parse::<u16>().unwrap_or(0);
        match freq {
            2412 => 1,
            2417 => 2,
            2422 => 3,
            2427 => 4,
            2432 => 5,
            2437 => 6,
            2442 => 7,
            2447 => 8,
            2452 => 9,
            2457 => 10,
            2462 => 11,
            2467 => 12,
            2472 => 13,
            2484 => 14,
            // 5GHz channels (simplified)
            5180 => 36,
            5200 => 40,
            5220 => 44,
            5240 => 48,
            5260 => 52,
            5280 => 56,
            5300 => 60,
            5320 => 64,
            5500 => 100,
            5520 => 104,
            5540 => 108,
            5560 => 112,
            5580 => 116,
            5660 => 132,
            5680 => 136,
            5700 => 140,
            5745 => 149,
            5765 => 153,
            5785 => 157,
            5805 => 161,
            5825 => 165,
            _ => 0,
        }
    }

    /// Run an `ip` subcommand, failing on a non-zero exit status
    async fn run_ip(&self, args: &[&str]) -> DriverResult<String> {
        let output = Command::new("ip")
            .args(args)
            .output()
            .await
            .map_err(|e| DriverError::Operation(format!("ip {}: {e}", args.join(" "))))?;

        if !output.status.success() {
            return Err(DriverError::Operation(format!(
                "ip {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Interface IPv4 address, if one is assigned
    async fn get_ip_address(&self) -> Option<String> {
        let stdout = self
            .run_ip(&["-4", "addr", "show", &self.interface])
            .await
            .ok()?;

        for line in stdout.lines() {
            let line = line.trim();
            if line.starts_with("inet ") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 2 {
                    let ip = parts[1].split('/').next()?;
                    return Some(ip.to_string());
                }
            }
        }

        None
    }
}

impl WifiStationDriver for WifiCtrlStation {
    async fn scan(&self) -> DriverResult<Vec<ScannedNetwork>> {
        debug!("scanning on interface {}", self.interface);

        let results = self
            .client
            .get_scan()
            .await
            .map_err(|e| DriverError::ScanFailed(e.to_string()))?;

        let networks: Vec<ScannedNetwork> = results
            .iter()
            .map(|res| ScannedNetwork {
                ssid: res.name.clone(),
                mac: res.mac.clone(),
                channel: Self::frequency_to_channel(&res.frequency),
                rssi: res.signal as i16,
            })
            .collect();

        debug!("scan complete, {} networks visible", networks.len());
        Ok(networks)
    }

    async fn configure_static(&self, config: &AddressConfig) -> DriverResult<()> {
        let address = format!("{}/{}", config.ip, config.prefix_len());
        debug!(interface = %self.interface, %address, "applying static addressing");

        self.run_ip(&["addr", "flush", "dev", &self.interface]).await?;
        self.run_ip(&["addr", "add", &address, "dev", &self.interface])
            .await?;
        let gateway = config.gateway.to_string();
        self.run_ip(&[
            "route", "replace", "default", "via", &gateway, "dev", &self.interface,
        ])
        .await?;

        if let Some(dns1) = config.dns1 {
            let mut args = vec!["dns".to_string(), self.interface.clone(), dns1.to_string()];
            if let Some(dns2) = config.dns2 {
                args.push(dns2.to_string());
            }
            let status = Command::new("resolvectl")
                .args(&args)
                .status()
                .await
                .map_err(|e| DriverError::Operation(format!("resolvectl: {e}")))?;
            if !status.success() {
                warn!("resolvectl failed, DNS servers not applied");
            }
        }

        Ok(())
    }

    async fn associate(&self, ssid: &str, credential: Option<&str>) -> DriverResult<()> {
        debug!("associating with {ssid}");

        let network_id = self
            .client
            .add_network()
            .await
            .map_err(|e| DriverError::Operation(format!("add_network: {e}")))?;

        // wifi-ctrl handles quoting internally via conf_escape
        self.client
            .set_network_ssid(network_id, ssid.to_string())
            .await
            .map_err(|e| DriverError::Operation(format!("set ssid: {e}")))?;

        match credential {
            Some(passphrase) => {
                self.client
                    .set_network_psk(network_id, passphrase.to_string())
                    .await
                    .map_err(|e| DriverError::Operation(format!("set psk: {e}")))?;
            }
            None => {
                self.client
                    .send_custom(format!("SET_NETWORK {network_id} key_mgmt NONE"))
                    .await
                    .map_err(|e| DriverError::Operation(format!("set key_mgmt: {e}")))?;
            }
        }

        // Enables the network and kicks off association; progress is
        // observed through status().
        self.client
            .select_network(network_id)
            .await
            .map_err(|e| DriverError::Operation(format!("select_network: {e}")))?;

        if let Err(e) = self.client.save_config().await {
            warn!("failed to save wpa_supplicant config: {e}");
        }

        debug!("association initiated");
        Ok(())
    }

    async fn status(&self) -> DriverResult<StationStatus> {
        let status = self
            .client
            .get_status()
            .await
            .map_err(|e| DriverError::Operation(format!("get_status: {e}")))?;

        let wpa_state = status
            .get("wpa_state")
            .map(|s| s.as_str())
            .unwrap_or("UNKNOWN");

        let state = match wpa_state {
            "COMPLETED" => LinkState::Connected,
            "ASSOCIATING" | "AUTHENTICATING" | "4WAY_HANDSHAKE" | "GROUP_HANDSHAKE" => {
                LinkState::Connecting
            }
            "SCANNING" => LinkState::Scanning,
            _ => LinkState::Idle,
        };

        let ssid = status.get("ssid").cloned();
        let mac = status.get("address").cloned();

        // wpa_supplicant only reports an address when it handled DHCP
        // itself; fall back to the interface.
        let ip_address = if state == LinkState::Connected {
            match status.get("ip_address").cloned() {
                Some(ip) => Some(ip),
                None => self.get_ip_address().await,
            }
        } else {
            status.get("ip_address").cloned()
        };

        Ok(StationStatus {
            state,
            ssid,
            ip_address,
            mac,
            rssi: None,
        })
    }

    async fn disconnect(&self) -> DriverResult<()> {
        debug!("disconnecting");
        self.client
            .send_custom("DISCONNECT".to_string())
            .await
            .map_err(|e| DriverError::Operation(format!("disconnect: {e}")))?;
        Ok(())
    }
}
