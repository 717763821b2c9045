//! Core abstractions for vendor presence sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `VendorId` / `LocationFix` - Identity and position value types
//! - `SessionState` - The presence state machine states
//! - `PresenceMessage` - Typed wire messages
//! - Transport and Geolocation collaborator traits

pub mod fix;
pub mod message;
pub mod state;
pub mod traits;

pub use fix::{LocationFix, VendorId};
pub use message::{LastLocation, PresenceMessage};
pub use state::SessionState;
pub use traits::{GeolocationSource, Transport, TransportEvent};
