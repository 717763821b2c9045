//! Identity and position value types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque stable vendor identifier.
///
/// Immutable once a session starts; binds a transport session to a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(String);

impl VendorId {
    /// Create a vendor id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VendorId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A single GPS/location sample.
///
/// Immutable value object. Only the most recent fix is ever retained
/// ("last known location").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// When the sample was captured.
    pub captured_at: DateTime<Utc>,
}

impl LocationFix {
    /// Create a fix captured now.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            captured_at: Utc::now(),
        }
    }

    /// Create a fix with an explicit capture time.
    #[must_use]
    pub const fn at(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            captured_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_id_is_transparent_in_json() {
        let id = VendorId::new("v-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"v-42\"");
        let back: VendorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn fix_retains_coordinates() {
        let fix = LocationFix::new(12.97, 77.59);
        assert_eq!(fix.latitude, 12.97);
        assert_eq!(fix.longitude, 77.59);
    }
}
