//! Collaborator traits for transport and geolocation.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::fix::LocationFix;
use crate::message::PresenceMessage;

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("transport closed")]
    Closed,
    #[error("serialize failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Asynchronous connection notifications observed by the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; the connection is open.
    Connected,
    /// The connection dropped; the transport retries on its own.
    Disconnected,
}

/// A persistent bidirectional connection to the presence server.
///
/// Implementations own connect/disconnect/reconnect; emission is
/// fire-and-forget. At most one underlying connection exists at a time.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a connect request and return without waiting for the
    /// handshake. Idempotent: calling while already connected (or while a
    /// connect is in flight) never opens a second connection.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Emit a message. Fails with `NotConnected` while the connection is
    /// down; callers decide whether that matters.
    async fn send(&self, msg: &PresenceMessage) -> Result<(), TransportError>;

    /// Close the connection and stop reconnecting until the next `connect`.
    async fn close(&self);

    /// Whether the connection is currently open.
    fn is_connected(&self) -> bool;

    /// Subscribe to connect/disconnect notifications.
    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Location permission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Sampling configuration for a watch subscription.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Desired interval between samples.
    pub interval: Duration,
    /// Minimum movement in meters before a new sample is produced.
    pub min_distance_m: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            min_distance_m: 10.0,
        }
    }
}

/// Watch subscription identifier.
pub type WatchId = Uuid;

/// Geolocation error.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("no fix available: {0}")]
    Unavailable(String),
}

/// Supplies periodic position fixes.
///
/// Implementations adapt a platform location API; the session layer only
/// ever sees fixes through the subscription channel or `current_fix`.
#[async_trait]
pub trait GeolocationSource: Send + Sync {
    /// Request (or re-check) location permission.
    async fn request_permission(&self) -> Permission;

    /// One-shot fix, used for the best-effort final capture on suspend.
    async fn current_fix(&self) -> Result<LocationFix, GeoError>;

    /// Start a watch subscription; fixes arrive on the returned channel.
    async fn subscribe(
        &self,
        opts: WatchOptions,
    ) -> Result<(WatchId, mpsc::Receiver<LocationFix>), GeoError>;

    /// Tear down a watch subscription. Unknown ids are ignored.
    async fn unsubscribe(&self, id: WatchId);
}
