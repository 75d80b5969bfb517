//! Database access for projects, result rows and events

pub mod events;
pub mod projects;
pub mod results;

use chrono::{DateTime, SecondsFormat, Utc};
use ecp_common::{Error, Result};
use uuid::Uuid;

/// Timestamps are stored as RFC 3339 text with millisecond precision,
/// which sorts lexicographically in time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp {}: {}", raw, e)))
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Invalid stored id {}: {}", raw, e)))
}
