//! Demo vendor client.
//!
//! Run the presence server first, then: cargo run -p vendor-app-demo
//!
//! Walks a scripted route while reporting, backgrounds briefly, comes
//! back, and finally logs out. Watch GET /vendors on the server while it
//! runs.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vendor_presence_core::{VendorId, traits::WatchOptions};
use vendor_presence_geo::ScriptedSource;
use vendor_presence_session::{LifecycleEvent, PresenceManager, spawn_lifecycle_bridge};
use vendor_presence_transport::WsTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let url =
        std::env::var("PRESENCE_URL").unwrap_or_else(|_| "ws://127.0.0.1:7987/ws".to_owned());
    let vendor = std::env::var("VENDOR_ID").unwrap_or_else(|_| "vendor-demo".to_owned());

    // A short walk through Bengaluru.
    let route = vec![
        (12.9716, 77.5946),
        (12.9721, 77.5950),
        (12.9727, 77.5957),
        (12.9733, 77.5963),
    ];

    let transport = WsTransport::new(url);
    let geo = ScriptedSource::new(route);
    let manager = Arc::new(PresenceManager::with_options(
        transport,
        geo,
        WatchOptions {
            interval: Duration::from_secs(1),
            min_distance_m: 0.0,
        },
        Duration::from_secs(3),
    ));

    let (lifecycle_tx, lifecycle_rx) = mpsc::channel(8);
    let bridge = spawn_lifecycle_bridge(Arc::clone(&manager), lifecycle_rx);

    tracing::info!(%vendor, "logging in");
    manager.start(VendorId::new(vendor)).await?;

    tokio::time::sleep(Duration::from_secs(5)).await;

    tracing::info!("backgrounding");
    lifecycle_tx.send(LifecycleEvent::Background).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    tracing::info!("foregrounding");
    lifecycle_tx.send(LifecycleEvent::Foreground).await?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    tracing::info!("logging out");
    manager.stop().await;

    bridge.abort();
    Ok(())
}
