//! The presence session state machine.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, broadcast::error::RecvError},
    task::JoinHandle,
};
use vendor_presence_core::{
    GeolocationSource, LocationFix, PresenceMessage, SessionState, Transport, TransportEvent,
    VendorId,
    traits::{Permission, TransportError, WatchId, WatchOptions},
};

/// How long the best-effort final fix may hold up `suspend`/`stop`.
const FINAL_FIX_TIMEOUT: Duration = Duration::from_secs(3);

/// Session manager error. Only setup failures reach callers; runtime
/// failures (dropped emissions, reconnects) degrade silently.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[from] TransportError),
}

struct Watch {
    id: WatchId,
    task: JoinHandle<()>,
}

struct SessionInner {
    state: SessionState,
    identity: Option<VendorId>,
    last_fix: Option<LocationFix>,
    watch: Option<Watch>,
    event_task: Option<JoinHandle<()>>,
}

/// Single source of truth for "is this vendor reporting location right
/// now", independent of any screen lifecycle.
///
/// One instance exists per process, shared via `Arc`; any call site may
/// invoke `start`/`suspend`/`resume`/`stop` without coordinating with the
/// others. Lifecycle transitions are serialized by a single async mutex,
/// so one transition always completes before the next begins.
pub struct PresenceManager<T, G>
where
    T: Transport + 'static,
    G: GeolocationSource + 'static,
{
    transport: Arc<T>,
    geo: Arc<G>,
    watch_opts: WatchOptions,
    final_fix_timeout: Duration,
    session: Arc<Mutex<SessionInner>>,
}

impl<T, G> PresenceManager<T, G>
where
    T: Transport + 'static,
    G: GeolocationSource + 'static,
{
    /// Create a manager with default sampling options.
    #[must_use]
    pub fn new(transport: T, geo: G) -> Self {
        Self::with_options(transport, geo, WatchOptions::default(), FINAL_FIX_TIMEOUT)
    }

    /// Create a manager with explicit sampling options and final-fix
    /// timeout.
    #[must_use]
    pub fn with_options(
        transport: T,
        geo: G,
        watch_opts: WatchOptions,
        final_fix_timeout: Duration,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            geo: Arc::new(geo),
            watch_opts,
            final_fix_timeout,
            session: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Disconnected,
                identity: None,
                last_fix: None,
                watch: None,
                event_task: None,
            })),
        }
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state
    }

    /// Last known location, if any fix was ever reported.
    pub async fn last_fix(&self) -> Option<LocationFix> {
        self.session.lock().await.last_fix
    }

    /// Bind `identity` and begin a presence session.
    ///
    /// Returns after issuing the connect request; handshake completion is
    /// observed asynchronously and moves the session to `Identified`.
    /// Calling while already `Identified`/`Reporting` re-sends the
    /// identify message over the existing connection instead of opening a
    /// duplicate.
    ///
    /// # Errors
    /// `PermissionDenied` if location permission is not granted (the
    /// transport is never touched), `TransportUnavailable` if the connect
    /// request cannot be issued.
    pub async fn start(&self, identity: VendorId) -> Result<(), SessionError> {
        if self.geo.request_permission().await == Permission::Denied {
            return Err(SessionError::PermissionDenied);
        }

        let mut session = self.session.lock().await;
        if session.state.is_emitting() {
            // Covers reconnection after transient network loss.
            if let Err(e) = self
                .transport
                .send(&PresenceMessage::identify(&identity))
                .await
            {
                tracing::warn!("re-identify dropped: {e}");
            }
            session.identity = Some(identity);
            return Ok(());
        }

        tracing::info!(vendor = %identity, "starting presence session");
        session.identity = Some(identity);
        session.state = SessionState::Connecting;

        self.ensure_event_task(&mut session);
        if let Err(e) = self.transport.connect().await {
            session.state = SessionState::Disconnected;
            return Err(SessionError::TransportUnavailable(e));
        }
        self.ensure_watch(&mut session).await;
        Ok(())
    }

    /// Record a fresh fix and emit it if the session is reporting.
    ///
    /// Called by the watch subscription and by any external trigger (the
    /// platform background task uses this same entry point). The fix
    /// always becomes last-known; it is only emitted while
    /// `Identified`/`Reporting`. Emission failures are dropped per-fix —
    /// the next fix supersedes them.
    pub async fn report_fix(&self, fix: LocationFix) {
        deliver_fix(&self.session, self.transport.as_ref(), fix).await;
    }

    /// Go dark for a foreground loss: capture a best-effort final fix,
    /// emit one `go:offline` signal, tear down sampling, and close the
    /// transport. No-op unless the session is connecting or reporting.
    pub async fn suspend(&self) {
        let mut session = self.session.lock().await;
        if !matches!(
            session.state,
            SessionState::Connecting | SessionState::Identified | SessionState::Reporting
        ) {
            return;
        }
        self.go_dark(&mut session, false).await;
    }

    /// Reconnect and re-identify after a foreground regain. No-op unless
    /// suspended.
    pub async fn resume(&self) {
        let mut session = self.session.lock().await;
        if session.state != SessionState::Offline {
            return;
        }
        tracing::info!("resuming presence session");
        session.state = SessionState::Connecting;
        if let Err(e) = self.transport.connect().await {
            tracing::warn!("resume connect failed: {e}");
            return;
        }
        self.ensure_watch(&mut session).await;
    }

    /// Explicit logout: same offline handoff as `suspend`, then the
    /// session is discarded. A new `start` (possibly with a different
    /// identity) is required afterwards.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        if session.state == SessionState::Disconnected {
            return;
        }
        tracing::info!("stopping presence session");
        self.go_dark(&mut session, true).await;
    }

    /// Offline handoff shared by `suspend` and `stop`.
    async fn go_dark(&self, session: &mut SessionInner, terminal: bool) {
        // Best-effort final fix under a hard timeout so app termination
        // is never stalled waiting on GPS.
        match tokio::time::timeout(self.final_fix_timeout, self.geo.current_fix()).await {
            Ok(Ok(fix)) => session.last_fix = Some(fix),
            Ok(Err(e)) => tracing::debug!("final fix unavailable: {e}"),
            Err(_) => tracing::debug!("final fix timed out"),
        }

        if session.state.is_emitting() {
            if let Some(identity) = session.identity.clone() {
                let msg = PresenceMessage::go_offline(&identity, session.last_fix.as_ref());
                if let Err(e) = self.transport.send(&msg).await {
                    tracing::warn!("offline signal dropped: {e}");
                }
            }
        }

        if let Some(watch) = session.watch.take() {
            watch.task.abort();
            self.geo.unsubscribe(watch.id).await;
        }
        self.transport.close().await;

        if terminal {
            if let Some(task) = session.event_task.take() {
                task.abort();
            }
            session.identity = None;
            session.last_fix = None;
            session.state = SessionState::Disconnected;
        } else {
            session.state = SessionState::Offline;
        }
    }

    /// Spawn the transport event loop once per session. It sends the
    /// identify message on every connect (initial and reconnect) and
    /// falls back to `Connecting` while the transport redials.
    fn ensure_event_task(&self, session: &mut SessionInner) {
        if session.event_task.is_some() {
            return;
        }

        // Subscribe before the connect request so the first Connected
        // event cannot be missed.
        let mut events = self.transport.events();
        let shared = Arc::clone(&self.session);
        let transport = Arc::clone(&self.transport);

        session.event_task = Some(tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "transport events lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let mut session = shared.lock().await;
                match event {
                    TransportEvent::Connected => {
                        let Some(identity) = session.identity.clone() else {
                            continue;
                        };
                        if session.state == SessionState::Connecting
                            || session.state.is_emitting()
                        {
                            match transport.send(&PresenceMessage::identify(&identity)).await {
                                Ok(()) => {
                                    if session.state == SessionState::Connecting {
                                        session.state = SessionState::Identified;
                                    }
                                }
                                Err(e) => tracing::warn!("identify dropped: {e}"),
                            }
                        }
                    }
                    TransportEvent::Disconnected => {
                        if session.state.is_emitting() {
                            // Transport retries on its own; fixes are
                            // stored but not emitted meanwhile.
                            session.state = SessionState::Connecting;
                        }
                    }
                }
            }
        }));
    }

    /// Subscribe to the geolocation source and forward samples through
    /// `report_fix` semantics.
    async fn ensure_watch(&self, session: &mut SessionInner) {
        if session.watch.is_some() {
            return;
        }
        match self.geo.subscribe(self.watch_opts).await {
            Ok((id, mut rx)) => {
                let shared = Arc::clone(&self.session);
                let transport = Arc::clone(&self.transport);
                let task = tokio::spawn(async move {
                    while let Some(fix) = rx.recv().await {
                        deliver_fix(&shared, transport.as_ref(), fix).await;
                    }
                });
                session.watch = Some(Watch { id, task });
            }
            Err(e) => tracing::warn!("location watch unavailable: {e}"),
        }
    }
}

async fn deliver_fix<T: Transport>(
    session: &Mutex<SessionInner>,
    transport: &T,
    fix: LocationFix,
) {
    let mut session = session.lock().await;
    session.last_fix = Some(fix);
    if !session.state.is_emitting() {
        return;
    }
    let Some(identity) = session.identity.clone() else {
        return;
    };
    match transport
        .send(&PresenceMessage::location_update(&identity, &fix))
        .await
    {
        Ok(()) => {
            if session.state == SessionState::Identified {
                session.state = SessionState::Reporting;
            }
        }
        Err(e) => tracing::debug!("fix dropped: {e}"),
    }
}
