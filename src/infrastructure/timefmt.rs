//! Shared timestamp (de)serialization for the SQLite repositories.
//!
//! Persists as RFC3339 UTC strings; parses both the millisecond-precision
//! and whole-second forms a write from any client might produce.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};

pub fn format(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn parse(raw: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(CoreError::from)
}

pub fn parse_opt(raw: Option<String>) -> CoreResult<Option<DateTime<Utc>>> {
    raw.map(|s| parse(&s)).transpose()
}
