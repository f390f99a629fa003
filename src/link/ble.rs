//! BLE session manager
//!
//! Owns the GATT server lifecycle: reacts to asynchronous peer
//! attach/detach events and re-arms advertising after a disconnect so a
//! new central can attach without caller intervention. This is the only
//! transport that self-heals; WiFi station and MQTT leave reconnection
//! to the caller.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::{
    core::{
        dispatch::{HandlerSlot, TextHandler},
        error::{LinkError, LinkResult},
    },
    driver::{BleDriver, BleEvent},
};

/// Delay after a detach before advertising restarts, giving the stack
/// time to finish its teardown
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// BLE session manager
///
/// One session per GATT server; the driver rejects a second `start`.
pub struct BleSession<D: BleDriver> {
    driver: Arc<D>,
    events: Mutex<Option<mpsc::Receiver<BleEvent>>>,
    /// Live attachment flag, updated as stack events drain
    attached: AtomicBool,
    /// Attachment value as of the last reconciliation
    recorded: AtomicBool,
    handler: HandlerSlot<TextHandler>,
}

impl<D: BleDriver> BleSession<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            events: Mutex::new(None),
            attached: AtomicBool::new(false),
            recorded: AtomicBool::new(false),
            handler: HandlerSlot::new(),
        }
    }

    /// Bring up the GATT server and begin advertising
    pub async fn start(&self) -> LinkResult<()> {
        let receiver = self.driver.start().await.map_err(LinkError::Stack)?;
        *self.events.lock().await = Some(receiver);
        info!("BLE server started, advertising");
        Ok(())
    }

    /// Register the inbound write handler, replacing any previous one
    pub async fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.handler.register(Arc::new(handler)).await;
    }

    /// Drain stack events and reconcile the recorded attachment state
    ///
    /// Must run on every application loop iteration, not only on edges:
    /// the attached-but-not-yet-recorded case is applied here too, so a
    /// missed update cannot re-enter the detached branch. An
    /// attached-to-detached transition waits the settle delay and then
    /// restarts advertising exactly once.
    pub async fn poll(&self) -> LinkResult<()> {
        {
            let mut guard = self.events.lock().await;
            let Some(events) = guard.as_mut() else {
                // Not started yet; nothing to reconcile.
                return Ok(());
            };
            while let Ok(event) = events.try_recv() {
                match event {
                    BleEvent::PeerAttached => self.attached.store(true, Ordering::SeqCst),
                    BleEvent::PeerDetached => self.attached.store(false, Ordering::SeqCst),
                    BleEvent::InboundWrite(data) => self.dispatch(&data).await,
                }
            }
        }

        let attached = self.attached.load(Ordering::SeqCst);
        let recorded = self.recorded.load(Ordering::SeqCst);

        if recorded && !attached {
            tokio::time::sleep(SETTLE_DELAY).await;
            self.driver
                .start_advertising()
                .await
                .map_err(LinkError::Stack)?;
            self.recorded.store(false, Ordering::SeqCst);
            info!("peer detached, advertising restarted");
        } else if attached && !recorded {
            self.recorded.store(true, Ordering::SeqCst);
            info!("peer attached");
        }

        Ok(())
    }

    async fn dispatch(&self, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        let message = text.trim();
        debug!(len = data.len(), "inbound BLE write");
        if let Some(handler) = self.handler.get().await {
            handler(message);
        }
    }

    /// Set the characteristic value and notify the attached peer
    ///
    /// Only permitted while a peer is attached.
    pub async fn send(&self, message: &str) -> LinkResult<()> {
        if !self.attached.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }
        self.driver
            .set_value_and_notify(message.as_bytes())
            .await
            .map_err(LinkError::Stack)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}
