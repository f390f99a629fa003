//! Bluetooth Classic discovery-connector
//!
//! Runs an asynchronous device scan with a name-match predicate, then
//! attempts a connection to the first match. Unlike the WiFi station
//! connector, this operation owns its own bounded retry loop: each
//! attempt is a fresh scan window with no candidate state carried over.

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::{
    core::{
        dispatch::{HandlerSlot, TextHandler},
        error::{LinkError, LinkResult},
        types::{ConnectionTarget, DiscoveredDevice, LinkState, RetryPolicy},
    },
    driver::BtClassicDriver,
};

/// Bluetooth Classic discovery-connector and serial session
pub struct BtConnector<D: BtClassicDriver> {
    driver: Arc<D>,
    state: Arc<RwLock<LinkState>>,
    handler: HandlerSlot<TextHandler>,
}

impl<D: BtClassicDriver> BtConnector<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            state: Arc::new(RwLock::new(LinkState::Idle)),
            handler: HandlerSlot::new(),
        }
    }

    /// Scan for the target device and connect to the first match
    ///
    /// Per attempt: discover for the policy's scan window (the window is
    /// never cut short by an early match), stop the scan, then connect to
    /// the candidate if one surfaced. Success returns immediately;
    /// otherwise the inter-attempt delay elapses and a fresh window
    /// begins, up to the policy's attempt budget.
    pub async fn discover_and_connect(
        &self,
        target: &ConnectionTarget,
        policy: &RetryPolicy,
    ) -> LinkResult<DiscoveredDevice> {
        let mut last_error = LinkError::NotFound(target.name.clone());

        for attempt in 1..=policy.max_attempts() {
            if policy.max_attempts() > 1 {
                info!(attempt, max = policy.max_attempts(), "discovery attempt");
            }

            *self.state.write().await = LinkState::Scanning;
            let mut devices = self.driver.start_discovery().await.map_err(LinkError::Stack)?;
            let candidate = self
                .collect_candidate(target, &mut devices, policy.scan_window)
                .await;
            // Scan-resource release is best-effort: a stop failure must
            // not consume the remaining attempts.
            if let Err(e) = self.driver.stop_discovery().await {
                warn!(error = %e, "failed to stop discovery");
            }

            match candidate {
                Some(device) => {
                    *self.state.write().await = LinkState::Connecting;
                    info!(
                        name = %device.name,
                        address = %device.address,
                        "connecting to matched device"
                    );
                    match self.driver.connect(&device.address).await {
                        Ok(()) => {
                            *self.state.write().await = LinkState::Connected;
                            info!(address = %device.address, "bluetooth device connected");
                            return Ok(device);
                        }
                        Err(e) => {
                            warn!(address = %device.address, error = %e, "connect attempt failed");
                            last_error = LinkError::Stack(e);
                        }
                    }
                }
                None => {
                    debug!(name = %target.name, "no matching device in scan window");
                    last_error = LinkError::NotFound(target.name.clone());
                }
            }

            if attempt < policy.max_attempts() {
                tokio::time::sleep(policy.retry_delay).await;
            }
        }

        *self.state.write().await = LinkState::Failed;
        warn!(
            name = %target.name,
            attempts = policy.max_attempts(),
            "could not connect to device"
        );
        Err(last_error)
    }

    /// Drain the discovery channel for the duration of the scan window
    ///
    /// The first matching device is retained; later devices are still
    /// drained and logged but never replace the candidate. No ranking by
    /// signal strength: selection depends on the stack's callback order.
    async fn collect_candidate(
        &self,
        target: &ConnectionTarget,
        devices: &mut mpsc::Receiver<DiscoveredDevice>,
        window: std::time::Duration,
    ) -> Option<DiscoveredDevice> {
        let deadline = tokio::time::Instant::now() + window;
        let mut candidate: Option<DiscoveredDevice> = None;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                maybe = devices.recv() => match maybe {
                    Some(device) => {
                        if candidate.is_none() && target.matches(&device.name) {
                            info!(
                                name = %device.name,
                                address = %device.address,
                                rssi = device.rssi,
                                "found target device"
                            );
                            candidate = Some(device);
                        } else {
                            debug!(
                                name = %device.name,
                                address = %device.address,
                                "discovered device"
                            );
                        }
                    }
                    None => {
                        // Stack closed the discovery pipe early; the window
                        // still runs its full course.
                        tokio::time::sleep_until(deadline).await;
                        break;
                    }
                }
            }
        }

        candidate
    }

    /// Register the inbound message handler, replacing any previous one
    pub async fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.handler.register(Arc::new(handler)).await;
    }

    /// Deliver pending inbound serial data to the registered handler
    ///
    /// Messages are trimmed of surrounding whitespace before delivery.
    /// Call periodically from the application loop.
    pub async fn poll(&self) -> LinkResult<()> {
        if let Some(raw) = self.driver.read_pending().await.map_err(LinkError::Stack)? {
            let message = raw.trim();
            if let Some(handler) = self.handler.get().await {
                handler(message);
            }
        }
        Ok(())
    }

    /// Send text over the serial link
    pub async fn send(&self, message: &str) -> LinkResult<()> {
        if !self.driver.is_connected().await {
            return Err(LinkError::NotConnected);
        }
        self.driver.write(message).await.map_err(LinkError::Stack)
    }

    pub async fn is_connected(&self) -> bool {
        self.driver.is_connected().await
    }

    pub async fn state(&self) -> LinkState {
        *self.state.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::types::MatchPolicy,
        driver::MockBtDriver,
    };
    use std::{sync::Mutex, time::Duration};

    fn device(name: &str, address: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            name: name.into(),
            address: address.into(),
            rssi: -50,
        }
    }

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_secs(5), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_match_exhausts_attempts_without_connecting() {
        let driver = Arc::new(MockBtDriver::new());
        driver
            .push_discovery_batch(vec![device("Unrelated", "11:11:11:11:11:11")])
            .await;

        let connector = BtConnector::new(driver.clone());
        let target = ConnectionTarget::new("Speaker");

        let start = tokio::time::Instant::now();
        let err = connector
            .discover_and_connect(&target, &policy(3))
            .await
            .unwrap_err();

        assert!(matches!(err, LinkError::NotFound(name) if name == "Speaker"));
        assert_eq!(driver.connect_calls().await, 0);
        assert_eq!(driver.discovery_starts().await, 3);
        assert_eq!(driver.discovery_stops().await, 3);
        // Three full windows plus two inter-attempt delays.
        assert_eq!(start.elapsed(), Duration::from_secs(3 * 5 + 2));
        assert_eq!(connector.state().await, LinkState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_match_connects() {
        let driver = Arc::new(MockBtDriver::new());
        driver
            .push_discovery_batch(vec![
                device("Headset", "22:22:22:22:22:22"),
                device("MyFooDevice", "33:33:33:33:33:33"),
            ])
            .await;

        let connector = BtConnector::new(driver.clone());
        let target = ConnectionTarget::new("Foo").with_match_policy(MatchPolicy::Partial);

        let connected = connector
            .discover_and_connect(&target, &policy(1))
            .await
            .unwrap();
        assert_eq!(connected.name, "MyFooDevice");
        assert_eq!(
            driver.connect_addresses().await,
            vec!["33:33:33:33:33:33".to_string()]
        );
        assert_eq!(connector.state().await, LinkState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_policy_rejects_partial_name() {
        let driver = Arc::new(MockBtDriver::new());
        driver
            .push_discovery_batch(vec![device("MyFooDevice", "33:33:33:33:33:33")])
            .await;

        let connector = BtConnector::new(driver.clone());
        let target = ConnectionTarget::new("Foo");

        let err = connector
            .discover_and_connect(&target, &policy(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));
        assert_eq!(driver.connect_calls().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unnamed_devices_never_match() {
        let driver = Arc::new(MockBtDriver::new());
        driver
            .push_discovery_batch(vec![device("", "44:44:44:44:44:44")])
            .await;

        let connector = BtConnector::new(driver.clone());
        let target = ConnectionTarget::new("").with_match_policy(MatchPolicy::Partial);

        assert!(
            connector
                .discover_and_connect(&target, &policy(1))
                .await
                .is_err()
        );
        assert_eq!(driver.connect_calls().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_seen_match_wins() {
        let driver = Arc::new(MockBtDriver::new());
        driver
            .push_discovery_batch(vec![
                device("Speaker-A", "55:55:55:55:55:55"),
                device("Speaker-B", "66:66:66:66:66:66"),
            ])
            .await;

        let connector = BtConnector::new(driver.clone());
        let target = ConnectionTarget::new("Speaker").with_match_policy(MatchPolicy::Partial);

        let connected = connector
            .discover_and_connect(&target, &policy(1))
            .await
            .unwrap();
        assert_eq!(connected.address, "55:55:55:55:55:55");
        assert_eq!(driver.connect_calls().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_stops_retrying() {
        let driver = Arc::new(MockBtDriver::new());
        driver
            .push_discovery_batch(vec![device("Speaker", "77:77:77:77:77:77")])
            .await;

        let connector = BtConnector::new(driver.clone());
        let target = ConnectionTarget::new("Speaker");

        connector
            .discover_and_connect(&target, &policy(3))
            .await
            .unwrap();
        assert_eq!(driver.discovery_starts().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_retries_with_fresh_scan() {
        let driver = Arc::new(MockBtDriver::new());
        driver
            .push_discovery_batch(vec![device("Speaker", "88:88:88:88:88:88")])
            .await;
        driver.set_connect_failure(true).await;

        let connector = BtConnector::new(driver.clone());
        let target = ConnectionTarget::new("Speaker");

        let err = connector
            .discover_and_connect(&target, &policy(3))
            .await
            .unwrap_err();
        // The device was found but could not be connected: a stack
        // failure, not a not-found one.
        assert!(matches!(err, LinkError::Stack(_)));
        assert_eq!(driver.discovery_starts().await, 3);
        assert_eq!(driver.connect_calls().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discovery_failure_does_not_abort_connect() {
        let driver = Arc::new(MockBtDriver::new());
        driver
            .push_discovery_batch(vec![device("Speaker", "aa:aa:aa:aa:aa:aa")])
            .await;
        driver.set_stop_failure(true).await;

        let connector = BtConnector::new(driver.clone());
        let connected = connector
            .discover_and_connect(&ConnectionTarget::new("Speaker"), &policy(2))
            .await
            .unwrap();

        assert_eq!(connected.address, "aa:aa:aa:aa:aa:aa");
        assert_eq!(connector.state().await, LinkState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discovery_failure_keeps_retrying() {
        let driver = Arc::new(MockBtDriver::new());
        driver.set_stop_failure(true).await;

        let connector = BtConnector::new(driver.clone());
        let err = connector
            .discover_and_connect(&ConnectionTarget::new("Speaker"), &policy(3))
            .await
            .unwrap_err();

        assert!(matches!(err, LinkError::NotFound(_)));
        assert_eq!(driver.discovery_starts().await, 3);
        assert_eq!(connector.state().await, LinkState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_scans_once() {
        let driver = Arc::new(MockBtDriver::new());
        let connector = BtConnector::new(driver.clone());
        let target = ConnectionTarget::new("Speaker");

        let policy = RetryPolicy::new(0, Duration::from_secs(1), Duration::ZERO);
        assert!(
            connector
                .discover_and_connect(&target, &policy)
                .await
                .is_err()
        );
        assert_eq!(driver.discovery_starts().await, 1);
    }

    #[tokio::test]
    async fn test_poll_trims_and_dispatches() {
        let driver = Arc::new(MockBtDriver::new());
        driver.queue_inbound("  hello world \r\n").await;

        let connector = BtConnector::new(driver.clone());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        connector
            .set_message_handler(move |msg: &str| {
                sink.lock().unwrap().push(msg.to_string());
            })
            .await;

        connector.poll().await.unwrap();

        assert_eq!(
            *received.lock().unwrap(),
            vec!["hello world".to_string()]
        );
    }

    #[tokio::test]
    async fn test_poll_without_handler_is_noop() {
        let driver = Arc::new(MockBtDriver::new());
        driver.queue_inbound("dropped").await;

        let connector = BtConnector::new(driver.clone());
        connector.poll().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_connection() {
        let driver = Arc::new(MockBtDriver::new());
        let connector = BtConnector::new(driver.clone());

        let err = connector.send("ping").await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
        assert!(driver.written().await.is_empty());

        driver
            .push_discovery_batch(vec![device("Speaker", "99:99:99:99:99:99")])
            .await;
        connector
            .discover_and_connect(&ConnectionTarget::new("Speaker"), &policy(1))
            .await
            .unwrap();

        connector.send("ping").await.unwrap();
        assert_eq!(driver.written().await, vec!["ping".to_string()]);
    }
}
