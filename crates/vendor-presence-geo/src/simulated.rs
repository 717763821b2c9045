//! Externally fed geolocation source.

use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;
use vendor_presence_core::{
    GeolocationSource, LocationFix,
    traits::{GeoError, Permission, WatchId, WatchOptions},
};

const WATCH_CHANNEL_CAPACITY: usize = 32;

struct Inner {
    permission: Permission,
    current: Option<LocationFix>,
    one_shot_fails: bool,
    watchers: HashMap<WatchId, mpsc::Sender<LocationFix>>,
}

/// Geolocation source fed from outside the crate.
///
/// This is the bridge point for a platform location API (or a test): the
/// platform side calls `push_fix`, subscribers receive it on their watch
/// channel. Also drives the background path, where a platform task wakes
/// the process and pushes one fix.
pub struct SimulatedSource {
    inner: RwLock<Inner>,
}

impl SimulatedSource {
    /// Create a source with permission granted and no position yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                permission: Permission::Granted,
                current: None,
                one_shot_fails: false,
                watchers: HashMap::new(),
            }),
        }
    }

    /// Make `request_permission` report denied.
    pub fn deny_permission(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.permission = Permission::Denied;
        }
    }

    /// Make `current_fix` fail, as a GPS timeout would.
    pub fn fail_one_shot(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.one_shot_fails = true;
        }
    }

    /// Feed a new fix: becomes the current position and fans out to
    /// every live watcher. Watchers that fell behind miss it; only the
    /// freshest position matters.
    pub fn push_fix(&self, fix: LocationFix) {
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        inner.current = Some(fix);
        inner.watchers.retain(|id, tx| {
            if tx.is_closed() {
                tracing::debug!(%id, "dropping closed watcher");
                return false;
            }
            let _ = tx.try_send(fix);
            true
        });
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeolocationSource for SimulatedSource {
    async fn request_permission(&self) -> Permission {
        self.inner
            .read()
            .map_or(Permission::Denied, |inner| inner.permission)
    }

    async fn current_fix(&self) -> Result<LocationFix, GeoError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| GeoError::Unavailable(e.to_string()))?;
        if inner.one_shot_fails {
            return Err(GeoError::Unavailable("gps timeout".into()));
        }
        inner
            .current
            .ok_or_else(|| GeoError::Unavailable("no fix yet".into()))
    }

    async fn subscribe(
        &self,
        _opts: WatchOptions,
    ) -> Result<(WatchId, mpsc::Receiver<LocationFix>), GeoError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| GeoError::Unavailable(e.to_string()))?;
        if inner.permission == Permission::Denied {
            return Err(GeoError::PermissionDenied);
        }
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        inner.watchers.insert(id, tx);
        Ok((id, rx))
    }

    async fn unsubscribe(&self, id: WatchId) {
        if let Ok(mut inner) = self.inner.write() {
            inner.watchers.remove(&id);
        }
    }
}
