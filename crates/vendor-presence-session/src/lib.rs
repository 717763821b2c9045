//! Presence session orchestration.
//!
//! Provides:
//! - `PresenceManager` - Single source of truth for "is this vendor
//!   reporting location right now", independent of UI screen lifecycle
//! - Lifecycle bridge mapping foreground/background transitions onto
//!   `resume`/`suspend`

pub mod lifecycle;
pub mod manager;

pub use lifecycle::{LifecycleEvent, spawn_lifecycle_bridge};
pub use manager::{PresenceManager, SessionError};
