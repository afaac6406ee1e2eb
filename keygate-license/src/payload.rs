//! The signed license payload.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The license payload that gets signed.
///
/// An empty `hwid` denotes a generic license not bound to any device.
/// Timestamps serialize as ISO-8601 (RFC 3339) strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePayload {
    /// Hardware id this license is bound to, or empty for unbound.
    #[serde(default)]
    pub hwid: String,
    /// When the license was issued.
    pub issued: DateTime<Utc>,
    /// When the license stops being valid.
    pub expiry: DateTime<Utc>,
    /// Feature names this license unlocks.
    pub features: Vec<String>,
}

impl LicensePayload {
    /// Builds a payload issued now, valid for `validity_days`.
    #[must_use]
    pub fn new(hwid: impl Into<String>, validity_days: i64, features: Vec<String>) -> Self {
        Self::new_at(hwid, validity_days, features, Utc::now())
    }

    /// Builds a payload with an explicit issue time.
    #[must_use]
    pub fn new_at(
        hwid: impl Into<String>,
        validity_days: i64,
        features: Vec<String>,
        issued: DateTime<Utc>,
    ) -> Self {
        Self {
            hwid: hwid.into(),
            issued,
            expiry: issued + Duration::days(validity_days),
            features,
        }
    }

    /// Returns true if this license is bound to a specific hardware id.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        !self.hwid.is_empty()
    }

    /// Returns true if the license is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry < now
    }
}
