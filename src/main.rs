//! Wireless Link Service - Main Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wireless_link_service::{
    ConnectionTarget, MqttConnectOptions, StationOptions, StationStatus, WirelessLinkService,
    config::{CliArgs, Settings},
    driver::{
        bluer_ble::BluerBle, bluer_bt::BluerBtClassic, hostapd::HostapdAp,
        rumqttc_mqtt::RumqttcMqtt, wifi_ctrl::WifiCtrlStation,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings: Settings = CliArgs::parse().into();

    // Initialize tracing
    let default_filter = if settings.quiet {
        "warn"
    } else {
        "info,wireless_link_service=debug"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(?settings, "Starting wireless link service");

    // Create drivers
    let station = Arc::new(WifiCtrlStation::new(settings.interface.clone()).await?);
    info!("WiFi station driver initialized for interface: {}", settings.interface);

    let access_point = Arc::new(HostapdAp::new(settings.interface.clone()));
    let bt_classic = Arc::new(BluerBtClassic::new().await?);
    let ble = Arc::new(BluerBle::new(settings.device_name.clone()));
    let mqtt = Arc::new(RumqttcMqtt::new(
        settings
            .mqtt_host
            .clone()
            .unwrap_or_else(|| "localhost".to_string()),
        settings.mqtt_port,
    ));

    let service = Arc::new(WirelessLinkService::new(
        station,
        access_point,
        bt_classic,
        ble,
        mqtt,
    ));
    info!("Wireless link service created");

    // Bring up the configured transports
    if let Some(ssid) = &settings.ssid {
        let mut target = ConnectionTarget::new(ssid.clone());
        if let Some(passphrase) = &settings.passphrase {
            target = target.with_credential(passphrase.clone());
        }
        let options = StationOptions::with_timeout(settings.connect_timeout);
        match service.connect_station(&target, &options).await {
            Ok(status) => info!(
                %ssid,
                ip = status.ip_address.as_deref().unwrap_or("unknown"),
                "station connected"
            ),
            Err(e) => error!("Station connect failed: {e}"),
        }
    }

    if settings.enable_ble {
        match service.start_ble().await {
            Ok(()) => info!("BLE GATT server started"),
            Err(e) => error!("Failed to start BLE GATT server: {e}"),
        }
    }

    if settings.mqtt_host.is_some() {
        let options = MqttConnectOptions::new(settings.mqtt_client_id.clone());
        match service.connect_mqtt(&options).await {
            Ok(()) => {
                info!("MQTT session established");
                // Announce the station link state as a retained JSON report.
                let status = service
                    .station_status()
                    .await
                    .unwrap_or_else(|_| StationStatus::idle());
                let topic = format!("{}/station", settings.mqtt_client_id);
                if let Err(e) = service.mqtt.publish_json(&topic, &status, true).await {
                    warn!("failed to publish station status: {e}");
                }
            }
            Err(e) => error!("Failed to connect to MQTT broker: {e}"),
        }
    }

    info!("Service started successfully");

    // Application loop: service the event-driven transports until a
    // shutdown signal arrives.
    let poll_service = service.clone();
    let poll_interval = settings.poll_interval;
    let poll_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = poll_service.poll().await {
                warn!("transport poll error: {e}");
            }
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully");
        }
        _ = shutdown_signal() => {
            info!("Received SIGTERM, shutting down gracefully");
        }
    }
    poll_task.abort();

    info!("Shutting down...");
    if service.mqtt.is_connected().await {
        let _ = service.mqtt.disconnect().await;
    }
    let _ = service.stop_access_point().await;
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");

    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await
}
