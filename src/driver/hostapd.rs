//! WiFi access-point driver over hostapd
//!
//! Writes a hostapd configuration for each start and runs hostapd as a
//! child process. Station accounting and interface addressing come from
//! the `iw` and `ip` tools.

use std::path::PathBuf;

use tokio::{fs, process::Command, sync::Mutex};
use tracing::{debug, info, warn};

use crate::{
    core::{
        error::{DriverError, DriverResult},
        types::ApStatus,
    },
    driver::wifi::WifiApDriver,
};

/// WiFi access-point driver backed by a hostapd child process
pub struct HostapdAp {
    interface: String,
    config_path: PathBuf,
    child: Mutex<Option<tokio::process::Child>>,
}

impl HostapdAp {
    pub fn new(interface: String) -> Self {
        let config_path = PathBuf::from(format!("/run/hostapd-{interface}.conf"));
        Self {
            interface,
            config_path,
            child: Mutex::new(None),
        }
    }

    fn render_config(
        &self,
        ssid: &str,
        passphrase: Option<&str>,
        channel: u8,
        hidden: bool,
        max_clients: u8,
    ) -> String {
        let mut conf = format!(
            "interface={}\n\
             driver=nl80211\n\
             ssid={ssid}\n\
             hw_mode=g\n\
             channel={channel}\n\
             ignore_broadcast_ssid={}\n\
             max_num_sta={max_clients}\n",
            self.interface,
            u8::from(hidden),
        );
        if let Some(passphrase) = passphrase {
            conf.push_str(&format!(
                "wpa=2\n\
                 wpa_key_mgmt=WPA-PSK\n\
                 rsn_pairwise=CCMP\n\
                 wpa_passphrase={passphrase}\n"
            ));
        }
        conf
    }

    async fn run_tool(&self, tool: &str, args: &[&str]) -> DriverResult<String> {
        let output = Command::new(tool)
            .args(args)
            .output()
            .await
            .map_err(|e| DriverError::Operation(format!("{tool}: {e}")))?;
        if !output.status.success() {
            return Err(DriverError::Operation(format!(
                "{tool} {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl WifiApDriver for HostapdAp {
    async fn start(
        &self,
        ssid: &str,
        passphrase: Option<&str>,
        channel: u8,
        hidden: bool,
        max_clients: u8,
    ) -> DriverResult<()> {
        // hostapd.conf is line-oriented; a control character in either
        // value would inject configuration directives.
        if ssid.chars().any(char::is_control)
            || passphrase.is_some_and(|p| p.chars().any(char::is_control))
        {
            return Err(DriverError::Operation(
                "ssid or passphrase contains control characters".into(),
            ));
        }

        let mut child = self.child.lock().await;
        if child.is_some() {
            return Err(DriverError::Operation("hostapd already running".into()));
        }

        let conf = self.render_config(ssid, passphrase, channel, hidden, max_clients);
        fs::write(&self.config_path, conf)
            .await
            .map_err(|e| DriverError::Operation(format!("write hostapd config: {e}")))?;

        let spawned = Command::new("hostapd")
            .arg(&self.config_path)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DriverError::Unavailable(format!("spawn hostapd: {e}")))?;

        *child = Some(spawned);
        info!(ssid, channel, interface = %self.interface, "hostapd started");
        Ok(())
    }

    async fn stop(&self) -> DriverResult<()> {
        let mut child = self.child.lock().await;
        if let Some(mut process) = child.take() {
            if let Err(e) = process.kill().await {
                warn!("failed to kill hostapd: {e}");
            }
            let _ = process.wait().await;
            info!("hostapd stopped");
        } else {
            debug!("stop requested but hostapd is not running");
        }
        Ok(())
    }

    async fn station_count(&self) -> DriverResult<u32> {
        let dump = self
            .run_tool("iw", &["dev", &self.interface, "station", "dump"])
            .await?;
        let count = dump
            .lines()
            .filter(|line| line.starts_with("Station "))
            .count() as u32;
        Ok(count)
    }

    async fn info(&self) -> DriverResult<ApStatus> {
        let station_count = self.station_count().await.unwrap_or(0);

        let mut ip_address = None;
        let mut mac = None;
        if let Ok(stdout) = self
            .run_tool("ip", &["addr", "show", &self.interface])
            .await
        {
            for line in stdout.lines() {
                let line = line.trim();
                if let Some(rest) = line.strip_prefix("link/ether ") {
                    mac = rest.split_whitespace().next().map(str::to_string);
                } else if let Some(rest) = line.strip_prefix("inet ") {
                    ip_address = rest
                        .split_whitespace()
                        .next()
                        .and_then(|cidr| cidr.split('/').next())
                        .map(str::to_string);
                }
            }
        }

        Ok(ApStatus {
            station_count,
            ip_address,
            mac,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_secured() {
        let ap = HostapdAp::new("wlan0".into());
        let conf = ap.render_config("DeviceAP", Some("longenough"), 6, false, 8);

        assert!(conf.contains("interface=wlan0\n"));
        assert!(conf.contains("ssid=DeviceAP\n"));
        assert!(conf.contains("channel=6\n"));
        assert!(conf.contains("ignore_broadcast_ssid=0\n"));
        assert!(conf.contains("max_num_sta=8\n"));
        assert!(conf.contains("wpa=2\n"));
        assert!(conf.contains("wpa_passphrase=longenough\n"));
    }

    #[tokio::test]
    async fn test_start_rejects_control_characters() {
        let ap = HostapdAp::new("wlan0".into());

        assert!(
            ap.start("Device\nwpa=0", None, 6, false, 8)
                .await
                .is_err()
        );
        assert!(
            ap.start("DeviceAP", Some("pass\nphrase8"), 6, false, 8)
                .await
                .is_err()
        );
    }

    #[test]
    fn test_render_config_open_and_hidden() {
        let ap = HostapdAp::new("wlan0".into());
        let conf = ap.render_config("DeviceAP", None, 1, true, 4);

        assert!(conf.contains("ignore_broadcast_ssid=1\n"));
        assert!(!conf.contains("wpa="));
        assert!(!conf.contains("wpa_passphrase"));
    }
}
