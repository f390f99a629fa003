//! WiFi access point controller
//!
//! Starts and stops a local access point and reports its attached-client
//! count. A passphrase shorter than the WPA2 minimum of 8 characters
//! silently degrades the network to open rather than failing the start.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    core::{
        error::{LinkError, LinkResult, ValidationError},
        types::{ApConfig, ApStatus, LinkState},
    },
    driver::WifiApDriver,
};

/// Minimum WPA2 passphrase length; anything shorter starts an open network
const MIN_PASSPHRASE_LEN: usize = 8;

/// WiFi access point controller
pub struct ApController<A: WifiApDriver> {
    driver: Arc<A>,
    state: Arc<RwLock<LinkState>>,
}

impl<A: WifiApDriver> ApController<A> {
    pub fn new(driver: Arc<A>) -> Self {
        Self {
            driver,
            state: Arc::new(RwLock::new(LinkState::Idle)),
        }
    }

    /// Start the access point
    ///
    /// Rejects channels outside 1 through 13. A passphrase shorter than
    /// 8 characters is treated as invalid and the AP comes up open.
    pub async fn start(&self, config: &ApConfig) -> LinkResult<()> {
        if !(1..=13).contains(&config.channel) {
            return Err(LinkError::Validation(ValidationError::InvalidChannel(
                config.channel,
            )));
        }

        let passphrase = match config.passphrase.as_deref() {
            Some(p) if p.len() >= MIN_PASSPHRASE_LEN => Some(p),
            Some(_) => {
                warn!(
                    ssid = %config.ssid,
                    "passphrase shorter than {MIN_PASSPHRASE_LEN} characters, starting open network"
                );
                None
            }
            None => None,
        };

        self.driver
            .start(
                &config.ssid,
                passphrase,
                config.channel,
                config.hidden,
                config.max_clients,
            )
            .await
            .map_err(LinkError::Stack)?;

        *self.state.write().await = LinkState::Connected;
        info!(
            ssid = %config.ssid,
            channel = config.channel,
            open = passphrase.is_none(),
            "access point started"
        );
        Ok(())
    }

    /// Stop the access point, disconnecting all attached stations
    pub async fn stop(&self) -> LinkResult<()> {
        self.driver.stop().await.map_err(LinkError::Stack)?;
        *self.state.write().await = LinkState::Idle;
        info!("access point stopped");
        Ok(())
    }

    /// Attached-station count and AP-side addressing; read-only
    pub async fn status(&self) -> LinkResult<ApStatus> {
        let count = self.driver.station_count().await.map_err(LinkError::Stack)?;
        let mut info = self.driver.info().await.map_err(LinkError::Stack)?;
        info.station_count = count;
        Ok(info)
    }

    pub async fn state(&self) -> LinkState {
        *self.state.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockApDriver;

    #[tokio::test]
    async fn test_start_with_valid_passphrase() {
        let driver = Arc::new(MockApDriver::new());
        let controller = ApController::new(driver.clone());

        let mut config = ApConfig::new("DeviceAP");
        config.passphrase = Some("longenough".into());
        config.channel = 6;
        config.max_clients = 8;

        controller.start(&config).await.unwrap();

        let started = driver.started().await.unwrap();
        assert_eq!(started.ssid, "DeviceAP");
        assert_eq!(started.passphrase.as_deref(), Some("longenough"));
        assert_eq!(started.channel, 6);
        assert_eq!(started.max_clients, 8);
        assert_eq!(controller.state().await, LinkState::Connected);
    }

    #[tokio::test]
    async fn test_short_passphrase_degrades_to_open_network() {
        let driver = Arc::new(MockApDriver::new());
        let controller = ApController::new(driver.clone());

        let mut config = ApConfig::new("DeviceAP");
        config.passphrase = Some("1234567".into()); // 7 chars

        controller.start(&config).await.unwrap();

        let started = driver.started().await.unwrap();
        assert_eq!(started.passphrase, None);
    }

    #[tokio::test]
    async fn test_no_passphrase_starts_open() {
        let driver = Arc::new(MockApDriver::new());
        let controller = ApController::new(driver.clone());

        controller.start(&ApConfig::new("DeviceAP")).await.unwrap();
        assert_eq!(driver.started().await.unwrap().passphrase, None);
    }

    #[tokio::test]
    async fn test_channel_out_of_range_rejected() {
        let driver = Arc::new(MockApDriver::new());
        let controller = ApController::new(driver.clone());

        let mut config = ApConfig::new("DeviceAP");
        config.channel = 14;

        let err = controller.start(&config).await.unwrap_err();
        assert!(matches!(
            err,
            LinkError::Validation(ValidationError::InvalidChannel(14))
        ));
        assert_eq!(driver.start_calls().await, 0);

        config.channel = 0;
        assert!(controller.start(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_and_status() {
        let driver = Arc::new(MockApDriver::new());
        let controller = ApController::new(driver.clone());

        controller.start(&ApConfig::new("DeviceAP")).await.unwrap();
        driver.set_station_count(3).await;

        let status = controller.status().await.unwrap();
        assert_eq!(status.station_count, 3);
        assert!(status.ip_address.is_some());

        controller.stop().await.unwrap();
        assert_eq!(driver.stop_calls().await, 1);
        assert_eq!(controller.state().await, LinkState::Idle);
        assert_eq!(controller.status().await.unwrap().station_count, 0);
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_stack_error() {
        let driver = Arc::new(MockApDriver::new());
        driver.set_start_failure(true).await;

        let controller = ApController::new(driver.clone());
        let err = controller.start(&ApConfig::new("DeviceAP")).await.unwrap_err();
        assert!(matches!(err, LinkError::Stack(_)));
        assert_eq!(controller.state().await, LinkState::Idle);
    }
}
