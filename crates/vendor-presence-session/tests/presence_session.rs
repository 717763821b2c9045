//! End-to-end presence session over a real WebSocket listener.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::StreamExt;
use tokio::{net::TcpListener, sync::mpsc, time::timeout};
use tokio_tungstenite::tungstenite::Message;
use vendor_presence_core::{LocationFix, SessionState, VendorId};
use vendor_presence_geo::SimulatedSource;
use vendor_presence_session::{LifecycleEvent, PresenceManager, spawn_lifecycle_bridge};
use vendor_presence_transport::{ReconnectPolicy, WsTransport};

const TICK: Duration = Duration::from_secs(3);

/// Accepts connections sequentially and records every JSON frame.
fn spawn_recording_server(
    listener: TcpListener,
) -> (Arc<Mutex<Vec<serde_json::Value>>>, Arc<Mutex<usize>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(Mutex::new(0usize));

    let received_task = Arc::clone(&received);
    let connections_task = Arc::clone(&connections);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            *connections_task.lock().unwrap() += 1;
            while let Some(Ok(frame)) = ws.next().await {
                if let Message::Text(text) = frame {
                    if let Ok(json) = serde_json::from_str(&text) {
                        received_task.lock().unwrap().push(json);
                    }
                }
            }
        }
    });

    (received, connections)
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(TICK, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn events_of(received: &Mutex<Vec<serde_json::Value>>) -> Vec<String> {
    received
        .lock()
        .unwrap()
        .iter()
        .filter_map(|m| m["event"].as_str().map(str::to_owned))
        .collect()
}

#[tokio::test]
async fn full_session_lifecycle_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (received, connections) = spawn_recording_server(listener);

    let transport = WsTransport::with_policy(
        format!("ws://{addr}"),
        ReconnectPolicy {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
        },
    );
    let geo = SimulatedSource::new();
    let manager = Arc::new(PresenceManager::new(transport, geo));

    let (lifecycle_tx, lifecycle_rx) = mpsc::channel(8);
    let bridge = spawn_lifecycle_bridge(Arc::clone(&manager), lifecycle_rx);

    // Login and identify.
    manager.start(VendorId::new("v7")).await.unwrap();
    wait_until(|| events_of(&received) == ["identify"]).await;
    assert_eq!(manager.state().await, SessionState::Identified);

    // A reported fix becomes a location update.
    manager.report_fix(LocationFix::new(12.9, 77.6)).await;
    wait_until(|| events_of(&received).len() == 2).await;
    {
        let frames = received.lock().unwrap();
        assert_eq!(frames[1]["event"], "location:update");
        assert_eq!(frames[1]["vendorId"], "v7");
        assert_eq!(frames[1]["lat"], 12.9);
        assert_eq!(frames[1]["lng"], 77.6);
        assert!(frames[1]["updatedAt"].is_string());
    }
    assert_eq!(manager.state().await, SessionState::Reporting);

    // Backgrounding goes dark with the last known position.
    lifecycle_tx.send(LifecycleEvent::Background).await.unwrap();
    wait_until(|| events_of(&received).len() == 3).await;
    {
        let frames = received.lock().unwrap();
        assert_eq!(frames[2]["event"], "go:offline");
        assert_eq!(frames[2]["lastLocation"]["lat"], 12.9);
        assert_eq!(frames[2]["lastLocation"]["lng"], 77.6);
    }
    assert_eq!(manager.state().await, SessionState::Offline);

    // Foregrounding reconnects and re-identifies.
    lifecycle_tx.send(LifecycleEvent::Foreground).await.unwrap();
    wait_until(|| events_of(&received).len() == 4).await;
    assert_eq!(events_of(&received)[3], "identify");
    assert_eq!(*connections.lock().unwrap(), 2);
    assert_eq!(manager.state().await, SessionState::Identified);

    // Logout ends the session for good.
    manager.stop().await;
    wait_until(|| events_of(&received).len() == 5).await;
    assert_eq!(events_of(&received)[4], "go:offline");
    assert_eq!(manager.state().await, SessionState::Disconnected);

    manager.report_fix(LocationFix::new(1.0, 1.0)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(events_of(&received).len(), 5);

    bridge.abort();
}
