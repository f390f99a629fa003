//! Bluetooth Classic driver over BlueZ
//!
//! Device discovery goes through the adapter's discovery session; the
//! serial link is an RFCOMM stream on the SPP channel. A reader task
//! splits inbound bytes into lines so the session manager can poll
//! without blocking.

use std::{
    collections::VecDeque,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bluer::{
    Adapter, AdapterEvent, Address,
    rfcomm::{SocketAddr, Stream},
};
use futures::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, WriteHalf},
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    core::{
        error::{DriverError, DriverResult},
        types::DiscoveredDevice,
    },
    driver::bt::BtClassicDriver,
};

/// Serial Port Profile channel
const SPP_CHANNEL: u8 = 1;

const DISCOVERY_CHANNEL_CAPACITY: usize = 16;

/// Bluetooth Classic driver backed by BlueZ
pub struct BluerBtClassic {
    adapter: Adapter,
    discovery: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<WriteHalf<Stream>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    lines: Arc<Mutex<VecDeque<String>>>,
    connected: Arc<AtomicBool>,
}

impl BluerBtClassic {
    /// Connect to bluetoothd and power on the default adapter
    pub async fn new() -> DriverResult<Self> {
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

        info!(adapter = adapter.name(), "Bluetooth adapter ready");
        Ok(Self {
            adapter,
            discovery: Mutex::new(None),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            lines: Arc::new(Mutex::new(VecDeque::new())),
            connected: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl BtClassicDriver for BluerBtClassic {
    async fn start_discovery(&self) -> DriverResult<mpsc::Receiver<DiscoveredDevice>> {
        let mut discovery = self.discovery.lock().await;
        if let Some(previous) = discovery.take() {
            previous.abort();
        }

        let events = self
            .adapter
            .discover_devices()
            .await
            .map_err(|e| DriverError::ScanFailed(e.to_string()))?;

        let adapter = self.adapter.clone();
        let (tx, rx) = mpsc::channel(DISCOVERY_CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            futures::pin_mut!(events);
            while let Some(event) = events.next().await {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };
                let Ok(device) = adapter.device(address) else {
                    continue;
                };
                let name = device.name().await.ok().flatten().unwrap_or_default();
                let rssi = device.rssi().await.ok().flatten().unwrap_or(0);
                debug!(%address, name, rssi, "device discovered");
                if tx
                    .send(DiscoveredDevice {
                        name,
                        address: address.to_string(),
                        rssi,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        *discovery = Some(task);
        Ok(rx)
    }

    async fn stop_discovery(&self) -> DriverResult<()> {
        // Aborting the task drops the discovery session, which ends the
        // adapter's scan.
        if let Some(task) = self.discovery.lock().await.take() {
            task.abort();
        }
        Ok(())
    }

    async fn connect(&self, address: &str) -> DriverResult<()> {
        let address = Address::from_str(address)
            .map_err(|e| DriverError::Operation(format!("bad address {address}: {e}")))?;

        let stream = Stream::connect(SocketAddr::new(address, SPP_CHANNEL))
            .await
            .map_err(|e| DriverError::Operation(format!("RFCOMM connect: {e}")))?;

        let (read_half, write_half) = tokio::io::split(stream);
        *self.writer.lock().await = Some(write_half);
        self.connected.store(true, Ordering::SeqCst);

        let lines = self.lines.clone();
        let connected = self.connected.clone();
        let reader_task = tokio::spawn(async move {
            let mut reader = BufReader::new(read_half).lines();
            loop {
                match reader.next_line().await {
                    Ok(Some(line)) => lines.lock().await.push_back(line),
                    Ok(None) => break,
                    Err(e) => {
                        warn!("RFCOMM read error: {e}");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
        });

        let mut reader = self.reader.lock().await;
        if let Some(previous) = reader.replace(reader_task) {
            previous.abort();
        }

        info!(%address, "RFCOMM link established");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_pending(&self) -> DriverResult<Option<String>> {
        Ok(self.lines.lock().await.pop_front())
    }

    async fn write(&self, data: &str) -> DriverResult<()> {
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(DriverError::Operation("no RFCOMM link".into()));
        };
        writer
            .write_all(data.as_bytes())
            .await
            .map_err(|e| DriverError::Operation(format!("RFCOMM write: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| DriverError::Operation(format!("RFCOMM flush: {e}")))?;
        Ok(())
    }
}
