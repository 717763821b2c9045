//! Wire messages for the presence connection.

use serde::{Deserialize, Serialize};

use crate::fix::{LocationFix, VendorId};

/// Bare coordinates carried by the offline handoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastLocation {
    pub lat: f64,
    pub lng: f64,
}

impl From<&LocationFix> for LastLocation {
    fn from(fix: &LocationFix) -> Self {
        Self {
            lat: fix.latitude,
            lng: fix.longitude,
        }
    }
}

/// Message from the vendor app to the presence server.
///
/// JSON over a persistent connection, tagged by event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PresenceMessage {
    /// Bind the connection to a vendor. Sent once per successful connect,
    /// and again after every reconnect.
    #[serde(rename = "identify", rename_all = "camelCase")]
    Identify { vendor_id: VendorId },
    /// A fresh position sample while reporting.
    #[serde(rename = "location:update", rename_all = "camelCase")]
    LocationUpdate {
        vendor_id: VendorId,
        lat: f64,
        lng: f64,
        /// RFC3339 capture timestamp.
        updated_at: String,
    },
    /// Explicit "going dark" signal, with the last known position when
    /// one exists.
    #[serde(rename = "go:offline", rename_all = "camelCase")]
    GoOffline {
        vendor_id: VendorId,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_location: Option<LastLocation>,
    },
}

impl PresenceMessage {
    /// Identify message for a vendor.
    #[must_use]
    pub fn identify(vendor_id: &VendorId) -> Self {
        Self::Identify {
            vendor_id: vendor_id.clone(),
        }
    }

    /// Location update for a reported fix.
    #[must_use]
    pub fn location_update(vendor_id: &VendorId, fix: &LocationFix) -> Self {
        Self::LocationUpdate {
            vendor_id: vendor_id.clone(),
            lat: fix.latitude,
            lng: fix.longitude,
            updated_at: fix.captured_at.to_rfc3339(),
        }
    }

    /// Offline handoff, carrying the last known fix if any.
    #[must_use]
    pub fn go_offline(vendor_id: &VendorId, last_fix: Option<&LocationFix>) -> Self {
        Self::GoOffline {
            vendor_id: vendor_id.clone(),
            last_location: last_fix.map(LastLocation::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn identify_wire_format() {
        let msg = PresenceMessage::identify(&VendorId::new("v1"));
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "identify");
        assert_eq!(json["vendorId"], "v1");
    }

    #[test]
    fn location_update_wire_format() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        let fix = LocationFix::at(12.5, 77.25, ts);
        let msg = PresenceMessage::location_update(&VendorId::new("v1"), &fix);
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "location:update");
        assert_eq!(json["vendorId"], "v1");
        assert_eq!(json["lat"], 12.5);
        assert_eq!(json["lng"], 77.25);
        assert_eq!(json["updatedAt"], "2025-06-01T09:30:00+00:00");
    }

    #[test]
    fn go_offline_with_last_location() {
        let fix = LocationFix::new(1.0, 2.0);
        let msg = PresenceMessage::go_offline(&VendorId::new("v1"), Some(&fix));
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "go:offline");
        assert_eq!(json["lastLocation"]["lat"], 1.0);
        assert_eq!(json["lastLocation"]["lng"], 2.0);
    }

    #[test]
    fn go_offline_without_fix_omits_payload() {
        let msg = PresenceMessage::go_offline(&VendorId::new("v1"), None);
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "go:offline");
        assert!(json.get("lastLocation").is_none());
    }

    #[test]
    fn messages_round_trip() {
        let fix = LocationFix::new(3.0, 4.0);
        let msg = PresenceMessage::location_update(&VendorId::new("v9"), &fix);
        let json = serde_json::to_string(&msg).unwrap();
        let back: PresenceMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
