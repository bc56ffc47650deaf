//! Timestamp and date parsing for platform data

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Date format of date-question bounds and date samples
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Zone-less timestamp format, with optional fractional seconds
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse an API timestamp as UTC
///
/// Accepts RFC 3339 (`2020-04-01T12:00:00Z`, `...+02:00`, fractional seconds)
/// and zone-less timestamps, which are taken as UTC.
pub fn parse_api_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, NAIVE_TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| Error::Parse(format!("timestamp '{}': {}", value, e)))
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_api_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| Error::Parse(format!("date '{}': {}", value, e)))
}

/// Convert fractional Unix seconds (as used in prediction timeseries)
pub fn from_unix_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
