//! Transport session for the presence connection.
//!
//! Provides:
//! - `WsTransport` - WebSocket client with idempotent connect and
//!   internal reconnect backoff
//! - `ReconnectPolicy` - backoff configuration

pub mod websocket;

pub use websocket::{ReconnectPolicy, WsTransport};
