//! Bridge from application lifecycle notifications to the session.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use vendor_presence_core::{GeolocationSource, Transport};

use crate::manager::PresenceManager;

/// Foreground/background transitions relayed by the platform shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The app regained the foreground.
    Foreground,
    /// The app lost the foreground (or is about to terminate).
    Background,
}

/// Map lifecycle events onto `resume`/`suspend`.
///
/// The platform adapter owns the sender half; this is the only wiring a
/// shell needs for the presence session to follow the app lifecycle.
pub fn spawn_lifecycle_bridge<T, G>(
    manager: Arc<PresenceManager<T, G>>,
    mut events: mpsc::Receiver<LifecycleEvent>,
) -> JoinHandle<()>
where
    T: Transport + 'static,
    G: GeolocationSource + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(?event, "lifecycle transition");
            match event {
                LifecycleEvent::Foreground => manager.resume().await,
                LifecycleEvent::Background => manager.suspend().await,
            }
        }
    })
}
