//! WiFi station connector
//!
//! Establishes a single association: scan, exact-name match, optional
//! static addressing, associate, then poll status until connected or the
//! timeout budget is spent. One call is one attempt; retry is the
//! caller's responsibility, unlike the Bluetooth Classic connector which
//! owns its own retry loop.

use std::{sync::Arc, time::Duration};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    core::{
        address::AddressConfig,
        error::{LinkError, LinkResult},
        types::{ConnectionTarget, LinkState, StationOptions, StationStatus, TimeoutPolicy},
    },
    driver::WifiStationDriver,
};

/// Interval between status polls while waiting for the association
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Station-side connection state machine
#[derive(Debug)]
struct StationStateMachine {
    state: LinkState,
    ssid: Option<String>,
    error: Option<String>,
}

impl StationStateMachine {
    fn new() -> Self {
        Self {
            state: LinkState::Idle,
            ssid: None,
            error: None,
        }
    }

    fn begin_scan(&mut self, ssid: String) {
        self.state = LinkState::Scanning;
        self.ssid = Some(ssid);
        self.error = None;
    }

    fn begin_connect(&mut self) {
        self.state = LinkState::Connecting;
    }

    fn complete(&mut self) {
        self.state = LinkState::Connected;
        self.error = None;
    }

    fn fail(&mut self, error: String) {
        self.state = LinkState::Failed;
        self.error = Some(error);
    }

    fn state(&self) -> LinkState {
        self.state
    }
}

/// WiFi station connector
pub struct StationConnector<W: WifiStationDriver> {
    driver: Arc<W>,
    state_machine: Arc<RwLock<StationStateMachine>>,
}

impl<W: WifiStationDriver> StationConnector<W> {
    pub fn new(driver: Arc<W>) -> Self {
        Self {
            driver,
            state_machine: Arc::new(RwLock::new(StationStateMachine::new())),
        }
    }

    /// Connect to the target network
    ///
    /// Fails without touching the association path when the scan sees no
    /// networks, when the target SSID is not visible (always matched
    /// exactly, never partially), or when the supplied addressing is
    /// invalid. A failure to apply valid static addressing is terminal
    /// for this call; a partially applied configuration is not rolled
    /// back.
    pub async fn connect(
        &self,
        target: &ConnectionTarget,
        options: &StationOptions,
    ) -> LinkResult<StationStatus> {
        self.state_machine
            .write()
            .await
            .begin_scan(target.name.clone());

        info!(ssid = %target.name, "scanning for target network");
        let networks = match self.driver.scan().await {
            Ok(networks) => networks,
            Err(e) => return Err(self.fail(LinkError::Stack(e)).await),
        };

        if networks.is_empty() {
            warn!("scan returned no networks");
            return Err(self.fail(LinkError::NotFound(target.name.clone())).await);
        }

        let found = networks.iter().find(|n| n.ssid == target.name);
        let Some(found) = found else {
            warn!(ssid = %target.name, "target network not visible");
            return Err(self.fail(LinkError::NotFound(target.name.clone())).await);
        };
        info!(ssid = %found.ssid, rssi = found.rssi, "found target network");

        // Scan results must not leak into the association phase.
        drop(networks);

        let addressing = match AddressConfig::parse(&options.addressing) {
            Ok(config) => config,
            Err(e) => return Err(self.fail(LinkError::Validation(e)).await),
        };
        if let Some(config) = addressing {
            debug!(ip = %config.ip, "applying static addressing");
            if let Err(e) = self.driver.configure_static(&config).await {
                return Err(self.fail(LinkError::Stack(e)).await);
            }
        } else {
            debug!("using DHCP addressing");
        }

        self.state_machine.write().await.begin_connect();
        if let Err(e) = self
            .driver
            .associate(&target.name, target.credential.as_deref())
            .await
        {
            return Err(self.fail(LinkError::Stack(e)).await);
        }

        match self.wait_for_connection(options).await {
            Ok(status) => {
                self.state_machine.write().await.complete();
                info!(
                    ssid = %target.name,
                    ip = status.ip_address.as_deref().unwrap_or("unknown"),
                    mac = status.mac.as_deref().unwrap_or("unknown"),
                    rssi = ?status.rssi,
                    "station connected"
                );
                Ok(status)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Poll the driver until the association completes or the budget runs out
    async fn wait_for_connection(&self, options: &StationOptions) -> LinkResult<StationStatus> {
        match options.timeout_policy {
            TimeoutPolicy::PollBudget => {
                // The timeout is a fixed number of poll attempts, not a
                // wall-clock measurement; drift from slow polls accumulates.
                let max_polls =
                    (options.timeout.as_millis() / STATUS_POLL_INTERVAL.as_millis()) as u32;
                for _ in 0..max_polls {
                    tokio::time::sleep(STATUS_POLL_INTERVAL).await;
                    let status = self.driver.status().await.map_err(LinkError::Stack)?;
                    if status.state == LinkState::Connected {
                        return Ok(status);
                    }
                }
            }
            TimeoutPolicy::Deadline => {
                let deadline = tokio::time::Instant::now() + options.timeout;
                while tokio::time::Instant::now() < deadline {
                    tokio::time::sleep(STATUS_POLL_INTERVAL).await;
                    let status = self.driver.status().await.map_err(LinkError::Stack)?;
                    if status.state == LinkState::Connected {
                        return Ok(status);
                    }
                }
            }
        }
        Err(LinkError::Timeout(options.timeout))
    }

    async fn fail(&self, error: LinkError) -> LinkError {
        self.state_machine.write().await.fail(error.to_string());
        error
    }

    /// Re-read the live status from the driver
    pub async fn status(&self) -> LinkResult<StationStatus> {
        self.driver.status().await.map_err(LinkError::Stack)
    }

    /// Last state recorded by the connect state machine
    pub async fn state(&self) -> LinkState {
        self.state_machine.read().await.state()
    }

    /// SSID of the current or last attempted association
    pub async fn target_ssid(&self) -> Option<String> {
        self.state_machine.read().await.ssid.clone()
    }

    /// Failure message of the last connect attempt, if it failed
    pub async fn last_error(&self) -> Option<String> {
        self.state_machine.read().await.error.clone()
    }

    /// Tear down the current association
    pub async fn disconnect(&self) -> LinkResult<()> {
        self.driver.disconnect().await.map_err(LinkError::Stack)?;
        let mut sm = self.state_machine.write().await;
        sm.state = LinkState::Disconnected;
        sm.ssid = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::types::{ScannedNetwork, StaticAddressing},
        driver::MockStationDriver,
    };

    fn network(ssid: &str) -> ScannedNetwork {
        ScannedNetwork {
            ssid: ssid.into(),
            mac: "aa:bb:cc:dd:ee:ff".into(),
            channel: 6,
            rssi: -60,
        }
    }

    fn addressing(ip: &str, gateway: &str, subnet: &str) -> StaticAddressing {
        StaticAddressing {
            ip: Some(ip.into()),
            gateway: Some(gateway.into()),
            subnet: Some(subnet.into()),
            dns1: None,
            dns2: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_success() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("HomeNet")]).await;
        driver.set_connect_after_polls(Some(2)).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet").with_credential("hunter22");
        let options = StationOptions::with_timeout(Duration::from_secs(10));

        let status = connector.connect(&target, &options).await.unwrap();
        assert_eq!(status.state, LinkState::Connected);
        assert_eq!(status.ip_address.as_deref(), Some("192.168.1.100"));
        assert_eq!(connector.state().await, LinkState::Connected);
        assert_eq!(
            driver.associated().await,
            Some(("HomeNet".to_string(), Some("hunter22".to_string())))
        );
    }

    #[tokio::test]
    async fn test_target_not_in_scan_does_not_associate() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("OtherNet")]).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions::with_timeout(Duration::from_secs(10));

        let err = connector.connect(&target, &options).await.unwrap_err();
        assert!(matches!(err, LinkError::NotFound(name) if name == "HomeNet"));
        assert_eq!(driver.associate_calls().await, 0);
        assert_eq!(connector.state().await, LinkState::Failed);
        assert_eq!(connector.target_ssid().await.as_deref(), Some("HomeNet"));
        assert!(connector.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_empty_scan_fails_without_retry() {
        let driver = Arc::new(MockStationDriver::new());

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions::with_timeout(Duration::from_secs(10));

        let err = connector.connect(&target, &options).await.unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));
        assert_eq!(driver.scan_calls().await, 1);
        assert_eq!(driver.associate_calls().await, 0);
    }

    #[tokio::test]
    async fn test_ssid_never_partially_matched() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("HomeNet-5G")]).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions::with_timeout(Duration::from_secs(10));

        assert!(connector.connect(&target, &options).await.is_err());
        assert_eq!(driver.associate_calls().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_poll_budget_is_exact() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("HomeNet")]).await;
        // Status never transitions to Connected.

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions::with_timeout(Duration::from_secs(10));

        let err = connector.connect(&target, &options).await.unwrap_err();
        assert!(matches!(err, LinkError::Timeout(_)));
        // 10 s at one poll per 500 ms: exactly 20 polls.
        assert_eq!(driver.status_calls().await, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_poll_budget_rounds_down() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("HomeNet")]).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions::with_timeout(Duration::from_millis(1999));

        assert!(connector.connect(&target, &options).await.is_err());
        assert_eq!(driver.status_calls().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_policy_connects() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("HomeNet")]).await;
        driver.set_connect_after_polls(Some(3)).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions {
            timeout: Duration::from_secs(5),
            timeout_policy: TimeoutPolicy::Deadline,
            addressing: StaticAddressing::default(),
        };

        let status = connector.connect(&target, &options).await.unwrap();
        assert_eq!(status.state, LinkState::Connected);
    }

    #[tokio::test]
    async fn test_invalid_addressing_aborts_before_driver() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("HomeNet")]).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions {
            timeout: Duration::from_secs(10),
            timeout_policy: TimeoutPolicy::PollBudget,
            addressing: StaticAddressing {
                ip: Some("192.168.1.50".into()),
                // Missing gateway and subnet.
                ..Default::default()
            },
        };

        let err = connector.connect(&target, &options).await.unwrap_err();
        assert!(matches!(err, LinkError::Validation(_)));
        assert_eq!(driver.configure_calls().await, 0);
        assert_eq!(driver.associate_calls().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_addressing_applied_before_association() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("HomeNet")]).await;
        driver.set_connect_after_polls(Some(1)).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions {
            timeout: Duration::from_secs(10),
            timeout_policy: TimeoutPolicy::PollBudget,
            addressing: addressing("192.168.1.50", "192.168.1.1", "255.255.255.0"),
        };

        connector.connect(&target, &options).await.unwrap();
        let applied = driver.applied_config().await.unwrap();
        assert_eq!(applied.ip.to_string(), "192.168.1.50");
        assert_eq!(applied.prefix_len(), 24);
    }

    #[tokio::test]
    async fn test_addressing_apply_failure_is_terminal() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("HomeNet")]).await;
        driver.set_configure_failure(true).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions {
            timeout: Duration::from_secs(10),
            timeout_policy: TimeoutPolicy::PollBudget,
            addressing: addressing("192.168.1.50", "192.168.1.1", "255.255.255.0"),
        };

        let err = connector.connect(&target, &options).await.unwrap_err();
        assert!(matches!(err, LinkError::Stack(_)));
        assert_eq!(driver.associate_calls().await, 0);
    }

    #[tokio::test]
    async fn test_scan_failure_surfaces_stack_error() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_failure(true).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions::with_timeout(Duration::from_secs(10));

        let err = connector.connect(&target, &options).await.unwrap_err();
        assert!(matches!(err, LinkError::Stack(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_records_state() {
        let driver = Arc::new(MockStationDriver::new());
        driver.set_scan_results(vec![network("HomeNet")]).await;
        driver.set_connect_after_polls(Some(1)).await;

        let connector = StationConnector::new(driver.clone());
        let target = ConnectionTarget::new("HomeNet");
        let options = StationOptions::with_timeout(Duration::from_secs(5));

        connector.connect(&target, &options).await.unwrap();
        connector.disconnect().await.unwrap();
        assert_eq!(connector.state().await, LinkState::Disconnected);
    }
}
