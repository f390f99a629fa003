//! BLE peripheral driver over BlueZ
//!
//! Serves a single GATT service with one read/write/notify
//! characteristic through bluer. Peer attachment is tracked through the
//! notification session: a central subscribing counts as attached, the
//! session stopping as detached.

use bluer::{
    Adapter,
    adv::{Advertisement, AdvertisementHandle, Type as AdvertisementType},
    gatt::local::{
        Application, ApplicationHandle, Characteristic, CharacteristicNotifier,
        CharacteristicNotify, CharacteristicNotifyMethod, CharacteristicRead, CharacteristicWrite,
        CharacteristicWriteMethod, Service,
    },
};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    core::error::{DriverError, DriverResult},
    driver::ble::{BleDriver, BleEvent},
};

/// Serial-style exchange service UUID
pub const LINK_SERVICE_UUID: Uuid = Uuid::from_bytes([
    0x8e, 0x2c, 0x51, 0xd0, 0x7a, 0x1b, 0x4f, 0x8d, 0x9c, 0x02, 0x6b, 0xe1, 0x3a, 0x95, 0x20, 0x01,
]);

/// Read/write/notify characteristic UUID
pub const LINK_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x8e, 0x2c, 0x51, 0xd0, 0x7a, 0x1b, 0x4f, 0x8d, 0x9c, 0x02, 0x6b, 0xe1, 0x3a, 0x95, 0x20, 0x02,
]);

const EVENT_CHANNEL_CAPACITY: usize = 32;

struct Running {
    adapter: Adapter,
    _app: ApplicationHandle,
    advertisement: Option<AdvertisementHandle>,
}

/// BLE peripheral driver backed by bluer
pub struct BluerBle {
    device_name: String,
    running: Mutex<Option<Running>>,
    /// Current characteristic value served to reads
    value: Arc<Mutex<Vec<u8>>>,
    /// Notification session of the attached peer, if any
    notifier: Arc<Mutex<Option<CharacteristicNotifier>>>,
    /// Bumped on every new notification session so a stale watcher can
    /// tell it was superseded
    session_generation: Arc<AtomicU64>,
}

impl BluerBle {
    pub fn new(device_name: String) -> Self {
        Self {
            device_name,
            running: Mutex::new(None),
            value: Arc::new(Mutex::new(Vec::new())),
            notifier: Arc::new(Mutex::new(None)),
            session_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn advertisement(&self) -> Advertisement {
        Advertisement {
            advertisement_type: AdvertisementType::Peripheral,
            service_uuids: vec![LINK_SERVICE_UUID].into_iter().collect(),
            discoverable: Some(true),
            local_name: Some(self.device_name.clone()),
            ..Default::default()
        }
    }

    fn build_application(&self, events: mpsc::Sender<BleEvent>) -> Application {
        let value = self.value.clone();
        let read_value = self.value.clone();
        let notifier_slot = self.notifier.clone();
        let generation = self.session_generation.clone();
        let write_events = events.clone();

        Application {
            services: vec![Service {
                uuid: LINK_SERVICE_UUID,
                primary: true,
                characteristics: vec![Characteristic {
                    uuid: LINK_CHAR_UUID,
                    read: Some(CharacteristicRead {
                        read: true,
                        fun: Box::new(move |_req| {
                            let value = read_value.clone();
                            Box::pin(async move { Ok(value.lock().await.clone()) })
                        }),
                        ..Default::default()
                    }),
                    write: Some(CharacteristicWrite {
                        write: true,
                        write_without_response: false,
                        method: CharacteristicWriteMethod::Fun(Box::new(move |new_value, _req| {
                            let value = value.clone();
                            let events = write_events.clone();
                            Box::pin(async move {
                                debug!(len = new_value.len(), "characteristic written");
                                *value.lock().await = new_value.clone();
                                let _ = events.send(BleEvent::InboundWrite(new_value)).await;
                                Ok(())
                            })
                        })),
                        ..Default::default()
                    }),
                    notify: Some(CharacteristicNotify {
                        notify: true,
                        method: CharacteristicNotifyMethod::Fun(Box::new(move |notifier| {
                            let notifier_slot = notifier_slot.clone();
                            let generation = generation.clone();
                            let events = events.clone();
                            Box::pin(async move {
                                debug!("notification session started");
                                let my_generation =
                                    generation.fetch_add(1, Ordering::SeqCst) + 1;
                                let _ = events.send(BleEvent::PeerAttached).await;
                                *notifier_slot.lock().await = Some(notifier);

                                // Watch for the session ending; that is the
                                // only detach signal BlueZ gives us here.
                                tokio::spawn(async move {
                                    loop {
                                        tokio::time::sleep(std::time::Duration::from_millis(200))
                                            .await;
                                        if generation.load(Ordering::SeqCst) != my_generation {
                                            // Superseded by a newer session.
                                            break;
                                        }
                                        let stopped = match &*notifier_slot.lock().await {
                                            Some(notifier) => notifier.is_stopped(),
                                            None => true,
                                        };
                                        if stopped {
                                            notifier_slot.lock().await.take();
                                            let _ = events.send(BleEvent::PeerDetached).await;
                                            break;
                                        }
                                    }
                                });
                            })
                        })),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}

impl BleDriver for BluerBle {
    async fn start(&self) -> DriverResult<mpsc::Receiver<BleEvent>> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(DriverError::Operation("BLE server already started".into()));
        }

        let session = bluer::Session::new()
            .await
            .map_err(|e| DriverError::Unavailable(e.to_string()))?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|e| DriverError::Unavailable(e.to_string()))?;

        adapter
            .set_powered(true)
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))?;
        adapter
            .set_alias(self.device_name.clone())
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let app = self.build_application(tx);
        let app_handle = adapter
            .serve_gatt_application(app)
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))?;

        let advertisement = adapter
            .advertise(self.advertisement())
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))?;

        info!(
            adapter = adapter.name(),
            name = %self.device_name,
            "BLE GATT server registered, advertising"
        );

        *running = Some(Running {
            adapter,
            _app: app_handle,
            advertisement: Some(advertisement),
        });
        Ok(rx)
    }

    async fn start_advertising(&self) -> DriverResult<()> {
        let mut running = self.running.lock().await;
        let Some(running) = running.as_mut() else {
            return Err(DriverError::Operation("BLE server not started".into()));
        };

        // Drop the previous handle first; BlueZ refuses duplicates.
        running.advertisement.take();
        let handle = running
            .adapter
            .advertise(self.advertisement())
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))?;
        running.advertisement = Some(handle);

        debug!("advertising restarted");
        Ok(())
    }

    async fn set_value_and_notify(&self, value: &[u8]) -> DriverResult<()> {
        *self.value.lock().await = value.to_vec();

        let mut notifier = self.notifier.lock().await;
        match notifier.as_mut() {
            Some(session) => session
                .notify(value.to_vec())
                .await
                .map_err(|e| DriverError::Operation(e.to_string())),
            None => {
                warn!("no notification session, value stored without notify");
                Ok(())
            }
        }
    }
}
