//! Store timestamp format.
//!
//! The Task Store emits UTC timestamps as `YYYY-MM-DD HH:MM:SS` without an
//! offset. Parsing also accepts RFC 3339 so that stores emitting ISO
//! timestamps interoperate. Serialization always uses the store format.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// `strftime` pattern of the store timestamp format.
pub const STORE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Error returned when a timestamp string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid store timestamp: {0:?}")]
pub struct TimestampError(pub String);

/// Parses a store timestamp (or RFC 3339 string) as UTC.
///
/// # Errors
///
/// Returns [`TimestampError`] if the string matches neither format.
pub fn parse(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, STORE_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimestampError(raw.to_string()))
}

/// Formats a UTC timestamp in the store format.
#[must_use]
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(STORE_FORMAT).to_string()
}

/// Serde adapter for `DateTime<Utc>` fields.
pub mod required {
    use super::{DateTime, Deserialize, Deserializer, Serializer, Utc};

    /// Serializes in the store format.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format(ts))
    }

    /// Deserializes from the store format or RFC 3339.
    ///
    /// # Errors
    ///
    /// Returns a custom error if the string cannot be parsed.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<DateTime<Utc>>` fields (`null` allowed).
pub mod optional {
    use super::{DateTime, Deserialize, Deserializer, Serializer, Utc};

    /// Serializes `None` as `null`, otherwise in the store format.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_some(&super::format(ts)),
            None => s.serialize_none(),
        }
    }

    /// Deserializes `null`, an empty string, or a timestamp.
    ///
    /// # Errors
    ///
    /// Returns a custom error if a non-empty string cannot be parsed.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => super::parse(s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}
