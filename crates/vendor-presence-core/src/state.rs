//! Presence session states.

use serde::{Deserialize, Serialize};

/// State of the per-process presence session.
///
/// Exactly one instance exists per running application process; a vendor
/// has one device/session at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session: initial state, or after an explicit `stop`.
    Disconnected,
    /// A connect request has been issued; handshake not yet observed.
    Connecting,
    /// Transport is open and the identify message has been sent.
    Identified,
    /// At least one fix has been emitted since identifying.
    Reporting,
    /// Suspended: the offline handoff was sent and the transport closed.
    Offline,
}

impl SessionState {
    /// Whether fixes may be emitted over the transport in this state.
    #[must_use]
    pub const fn is_emitting(self) -> bool {
        matches!(self, Self::Identified | Self::Reporting)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Identified => "identified",
            Self::Reporting => "reporting",
            Self::Offline => "offline",
        };
        f.write_str(s)
    }
}
