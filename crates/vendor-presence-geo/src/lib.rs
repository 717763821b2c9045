//! Geolocation source adapters.
//!
//! Provides:
//! - `SimulatedSource` - Externally fed source for tests and platform bridging
//! - `ScriptedSource` - Plays a fixed route at the watch interval

pub mod scripted;
pub mod simulated;

pub use scripted::ScriptedSource;
pub use simulated::SimulatedSource;
