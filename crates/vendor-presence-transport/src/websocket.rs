//! WebSocket client transport with reconnect backoff.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{Mutex, broadcast, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use vendor_presence_core::{
    PresenceMessage, Transport, TransportEvent, traits::TransportError,
};

/// Backoff configuration for the reconnect loop.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the doubled delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

struct Running {
    outbound_tx: mpsc::UnboundedSender<String>,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// WebSocket transport session.
///
/// One background run loop owns the socket: it dials, pumps outbound
/// messages, and redials with exponential backoff whenever the connection
/// drops. `connect` while the loop is running is a no-op, so a second
/// concurrent connection can never exist.
pub struct WsTransport {
    url: String,
    policy: ReconnectPolicy,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<TransportEvent>,
    running: Mutex<Option<Running>>,
}

impl WsTransport {
    /// Create a transport for the given `ws://`/`wss://` URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_policy(url, ReconnectPolicy::default())
    }

    /// Create a transport with a custom reconnect policy.
    #[must_use]
    pub fn with_policy(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            url: url.into(),
            policy,
            connected: Arc::new(AtomicBool::new(false)),
            events,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            // Already connecting or connected.
            return Ok(());
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_loop(
            self.url.clone(),
            outbound_rx,
            Arc::clone(&self.connected),
            self.events.clone(),
            self.policy,
            Arc::clone(&stop),
        ));

        *running = Some(Running {
            outbound_tx,
            stop,
            task,
        });
        Ok(())
    }

    async fn send(&self, msg: &PresenceMessage) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let json = serde_json::to_string(msg)?;

        let running = self.running.lock().await;
        let Some(running) = running.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        running
            .outbound_tx
            .send(json)
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        let mut running = self.running.lock().await;
        if let Some(Running {
            outbound_tx,
            stop,
            mut task,
        }) = running.take()
        {
            stop.store(true, Ordering::SeqCst);
            // Dropping the sender lets the run loop flush queued frames
            // (the offline handoff in particular) before it exits.
            drop(outbound_tx);
            if tokio::time::timeout(Duration::from_secs(1), &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
            if self.connected.swap(false, Ordering::SeqCst) {
                let _ = self.events.send(TransportEvent::Disconnected);
            }
            tracing::debug!("presence transport closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

async fn run_loop(
    url: String,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<TransportEvent>,
    policy: ReconnectPolicy,
    stop: Arc<AtomicBool>,
) {
    let mut delay = policy.initial_delay;
    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                tracing::debug!(%url, "presence transport connected");
                connected.store(true, Ordering::SeqCst);
                let _ = events.send(TransportEvent::Connected);
                delay = policy.initial_delay;

                let (mut sink, mut stream) = ws.split();
                loop {
                    tokio::select! {
                        out = outbound_rx.recv() => {
                            let Some(json) = out else {
                                // Close requested: queued frames have been
                                // flushed, shut the socket down.
                                let _ = sink.send(Message::Close(None)).await;
                                if connected.swap(false, Ordering::SeqCst) {
                                    let _ = events.send(TransportEvent::Disconnected);
                                }
                                return;
                            };
                            if let Err(e) = sink.send(Message::Text(json.into())).await {
                                tracing::warn!("presence send failed: {e}");
                                break;
                            }
                        }
                        incoming = stream.next() => {
                            match incoming {
                                Some(Ok(Message::Close(_))) | None => break,
                                // The server pushes nothing we act on.
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    tracing::warn!("presence transport error: {e}");
                                    break;
                                }
                            }
                        }
                    }
                }

                connected.store(false, Ordering::SeqCst);
                let _ = events.send(TransportEvent::Disconnected);
                tracing::debug!("presence transport disconnected");
            }
            Err(e) => {
                tracing::warn!("presence connect failed: {e}");
            }
        }

        if stop.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(policy.max_delay);
    }
}
