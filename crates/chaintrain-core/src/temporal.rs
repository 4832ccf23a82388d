//! # Temporal Types — Epoch-Millisecond Timestamps
//!
//! Every record the dashboard renders carries `timestamp` as epoch
//! milliseconds, and signed training intents embed `timestamp_ms`. This module
//! provides [`Timestamp`], a UTC instant serialized as an integer millisecond
//! count so it stays canonicalizable (no floats, no offsets).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// A UTC instant with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to milliseconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// From a `chrono::DateTime<Utc>`, truncating below milliseconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        let ms = dt.timestamp_millis();
        Self(DateTime::from_timestamp_millis(ms).unwrap_or(dt))
    }

    /// From epoch milliseconds.
    pub fn from_epoch_millis(ms: i64) -> Result<Self, ValidationError> {
        DateTime::from_timestamp_millis(ms)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "timestamp",
                reason: format!("out of range: {ms}"),
            })
    }

    /// Epoch milliseconds.
    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// RFC 3339 rendering with millisecond precision and `Z` suffix.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.epoch_millis())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ms = i64::deserialize(deserializer)?;
        Self::from_epoch_millis(ms).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_integer_millis() {
        let ts = Timestamp::from_epoch_millis(1_700_000_000_123).unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1700000000123");
    }

    #[test]
    fn roundtrips_through_json() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn rfc3339_uses_z_suffix() {
        let ts = Timestamp::from_epoch_millis(0).unwrap();
        assert_eq!(ts.to_rfc3339(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn from_utc_truncates_micros() {
        let dt = DateTime::from_timestamp(10, 123_456_789).unwrap();
        let ts = Timestamp::from_utc(dt);
        assert_eq!(ts.epoch_millis(), 10_123);
    }
}
