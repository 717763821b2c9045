//! Demo presence server.
//!
//! Run with: cargo run -p presence-server-demo
//!
//! Accepts vendor presence connections on /ws and exposes the live
//! vendor registry at GET /vendors.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vendor_presence_core::{PresenceMessage, VendorId};

/// What the server knows about one vendor.
#[derive(Debug, Clone, serde::Serialize)]
struct VendorPresence {
    online: bool,
    lat: Option<f64>,
    lng: Option<f64>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
struct AppState {
    vendors: Arc<RwLock<HashMap<VendorId, VendorPresence>>>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let state = AppState::default();

    let app = Router::new()
        .route("/vendors", get(vendors_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 7987));
    tracing::info!("Presence server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn vendors_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.vendors.read().await.clone())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // The vendor bound to this connection, once identified.
    let mut bound: Option<VendorId> = None;
    // Whether the vendor said goodbye explicitly.
    let mut went_offline = false;

    while let Some(frame) = socket.recv().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("websocket error: {e}");
                break;
            }
        };

        let msg: PresenceMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("invalid presence message: {e}");
                continue;
            }
        };

        match msg {
            PresenceMessage::Identify { vendor_id } => {
                tracing::info!(vendor = %vendor_id, "vendor identified");
                let mut vendors = state.vendors.write().await;
                let entry = vendors.entry(vendor_id.clone()).or_insert(VendorPresence {
                    online: true,
                    lat: None,
                    lng: None,
                    updated_at: Utc::now(),
                });
                entry.online = true;
                entry.updated_at = Utc::now();
                bound = Some(vendor_id);
            }
            PresenceMessage::LocationUpdate {
                vendor_id,
                lat,
                lng,
                updated_at,
            } => {
                let captured = updated_at
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now());
                let mut vendors = state.vendors.write().await;
                vendors.insert(
                    vendor_id,
                    VendorPresence {
                        online: true,
                        lat: Some(lat),
                        lng: Some(lng),
                        updated_at: captured,
                    },
                );
            }
            PresenceMessage::GoOffline {
                vendor_id,
                last_location,
            } => {
                tracing::info!(vendor = %vendor_id, "vendor went offline");
                let mut vendors = state.vendors.write().await;
                let entry = vendors.entry(vendor_id).or_insert(VendorPresence {
                    online: false,
                    lat: None,
                    lng: None,
                    updated_at: Utc::now(),
                });
                entry.online = false;
                entry.updated_at = Utc::now();
                if let Some(loc) = last_location {
                    entry.lat = Some(loc.lat);
                    entry.lng = Some(loc.lng);
                }
                went_offline = true;
            }
        }
    }

    // Transport-level disconnect without an explicit goodbye: mark the
    // vendor offline with whatever position we already had.
    if !went_offline {
        if let Some(vendor_id) = bound {
            tracing::info!(vendor = %vendor_id, "connection dropped, marking offline");
            let mut vendors = state.vendors.write().await;
            if let Some(entry) = vendors.get_mut(&vendor_id) {
                entry.online = false;
                entry.updated_at = Utc::now();
            }
        }
    }
}
