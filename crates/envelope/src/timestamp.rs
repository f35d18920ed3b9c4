//! Timestamp formatting for header records.
//!
//! Header lines must stay single-line JSON records, so every timestamp placed
//! in an envelope or item header is encoded as a fixed textual form: RFC3339,
//! UTC, microsecond precision with a trailing `Z`. Decoding accepts any valid
//! RFC3339 timestamp (fractional seconds optional) and normalizes it to UTC.
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::EnvelopeError;

/// Formats a timestamp the way header records carry it.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
///
/// let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
/// assert_eq!(envelope::format_timestamp(ts), "2024-01-01T12:30:00.000000Z");
/// ```
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a header timestamp, failing with [`EnvelopeError::InvalidTimestamp`]
/// on anything that is not RFC3339.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EnvelopeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| EnvelopeError::InvalidTimestamp(format!("{raw:?}: {err}")))
}
