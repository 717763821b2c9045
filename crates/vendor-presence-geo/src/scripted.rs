//! Route-playing geolocation source for demos.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;
use vendor_presence_core::{
    GeolocationSource, LocationFix,
    traits::{GeoError, Permission, WatchId, WatchOptions},
};

/// Plays a fixed route of coordinates, one waypoint per watch interval,
/// cycling when the route ends. Permission is always granted.
pub struct ScriptedSource {
    route: Arc<Vec<(f64, f64)>>,
    last: Arc<RwLock<Option<LocationFix>>>,
    tasks: RwLock<HashMap<WatchId, JoinHandle<()>>>,
}

impl ScriptedSource {
    /// Create a source that walks the given `(lat, lng)` waypoints.
    #[must_use]
    pub fn new(route: Vec<(f64, f64)>) -> Self {
        Self {
            route: Arc::new(route),
            last: Arc::new(RwLock::new(None)),
            tasks: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl GeolocationSource for ScriptedSource {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn current_fix(&self) -> Result<LocationFix, GeoError> {
        let last = self
            .last
            .read()
            .map_err(|e| GeoError::Unavailable(e.to_string()))?;
        if let Some(fix) = *last {
            return Ok(fix);
        }
        self.route
            .first()
            .map(|&(lat, lng)| LocationFix::new(lat, lng))
            .ok_or_else(|| GeoError::Unavailable("empty route".into()))
    }

    async fn subscribe(
        &self,
        opts: WatchOptions,
    ) -> Result<(WatchId, mpsc::Receiver<LocationFix>), GeoError> {
        if self.route.is_empty() {
            return Err(GeoError::Unavailable("empty route".into()));
        }

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(32);
        let route = Arc::clone(&self.route);
        let last = Arc::clone(&self.last);

        let task = tokio::spawn(async move {
            loop {
                for &(lat, lng) in route.iter() {
                    tokio::time::sleep(opts.interval).await;
                    let fix = LocationFix::new(lat, lng);
                    if let Ok(mut slot) = last.write() {
                        *slot = Some(fix);
                    }
                    if tx.send(fix).await.is_err() {
                        return;
                    }
                }
            }
        });

        if let Ok(mut tasks) = self.tasks.write() {
            tasks.insert(id, task);
        }
        Ok((id, rx))
    }

    async fn unsubscribe(&self, id: WatchId) {
        let task = self.tasks.write().ok().and_then(|mut tasks| tasks.remove(&id));
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.read() {
            for task in tasks.values() {
                task.abort();
            }
        }
    }
}
