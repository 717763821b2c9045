//! Integration tests for `WsTransport` against a real WebSocket listener.

use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use vendor_presence_core::{PresenceMessage, Transport, TransportEvent, VendorId, traits::TransportError};
use vendor_presence_transport::{ReconnectPolicy, WsTransport};

const TICK: Duration = Duration::from_secs(2);

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
    }
}

async fn wait_connected(transport: &WsTransport) {
    let mut events = transport.events();
    if transport.is_connected() {
        return;
    }
    loop {
        let event = timeout(TICK, events.recv())
            .await
            .expect("timed out waiting for connect")
            .expect("event channel closed");
        if event == TransportEvent::Connected {
            return;
        }
    }
}

#[tokio::test]
async fn connect_then_identify_reaches_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let incoming = ws.next().await.unwrap().unwrap();
        let Message::Text(text) = incoming else {
            panic!("expected text frame");
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["event"], "identify");
        assert_eq!(json["vendorId"], "v1");
    });

    let transport = WsTransport::with_policy(format!("ws://{addr}"), fast_policy());
    transport.connect().await.unwrap();
    wait_connected(&transport).await;

    transport
        .send(&PresenceMessage::identify(&VendorId::new("v1")))
        .await
        .unwrap();

    timeout(TICK, server).await.unwrap().unwrap();
    transport.close().await;
}

#[tokio::test]
async fn connect_is_idempotent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // A second connect must never open a second connection.
        let second = timeout(Duration::from_millis(300), listener.accept()).await;
        assert!(second.is_err(), "unexpected second connection");
    });

    let transport = WsTransport::with_policy(format!("ws://{addr}"), fast_policy());
    transport.connect().await.unwrap();
    wait_connected(&transport).await;
    transport.connect().await.unwrap();

    timeout(TICK, server).await.unwrap().unwrap();
    transport.close().await;
}

#[tokio::test]
async fn send_while_disconnected_fails() {
    let transport = WsTransport::new("ws://127.0.0.1:1");
    let err = transport
        .send(&PresenceMessage::identify(&VendorId::new("v1")))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::NotConnected));
}

#[tokio::test]
async fn reconnects_after_server_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        // First connection is dropped immediately.
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        drop(ws);

        // The transport should dial again on its own.
        let (stream, _) = timeout(TICK, listener.accept()).await.unwrap().unwrap();
        let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    });

    let transport = WsTransport::with_policy(format!("ws://{addr}"), fast_policy());
    let mut events = transport.events();
    transport.connect().await.unwrap();

    let mut seen = Vec::new();
    while seen.len() < 3 {
        let event = timeout(TICK, events.recv()).await.unwrap().unwrap();
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            TransportEvent::Connected,
            TransportEvent::Disconnected,
            TransportEvent::Connected,
        ]
    );

    timeout(TICK, server).await.unwrap().unwrap();
    transport.close().await;
}

#[tokio::test]
async fn close_stops_reconnecting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let transport = WsTransport::with_policy(format!("ws://{addr}"), fast_policy());
    transport.connect().await.unwrap();

    let (stream, _) = timeout(TICK, listener.accept()).await.unwrap().unwrap();
    let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    wait_connected(&transport).await;

    transport.close().await;
    assert!(!transport.is_connected());

    // No redial after close.
    let redial = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(redial.is_err(), "transport reconnected after close");
}
