//! RFC1123 timestamps as used on `If-Unmodified-Since` headers.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid HTTP date: {0}")]
pub struct HttpDateError(String);

/// Render a timestamp in RFC1123 form with the GMT zone designator.
pub fn to_http_date(when: DateTime<Utc>) -> String {
    when.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an RFC1123 header value. Accepts the `GMT`/`UTC`/`UT` zone names
/// peers emit as well as numeric offsets.
pub fn parse_http_date(raw: &str) -> Result<DateTime<Utc>, HttpDateError> {
    let trimmed = raw.trim();
    for zone in [" GMT", " UTC", " UT"] {
        if let Some(rest) = trimmed.strip_suffix(zone) {
            return NaiveDateTime::parse_from_str(rest, "%a, %d %b %Y %H:%M:%S")
                .map(|naive| naive.and_utc())
                .map_err(|_| HttpDateError(raw.to_string()));
        }
    }
    DateTime::parse_from_rfc2822(trimmed)
        .map(|when| when.with_timezone(&Utc))
        .map_err(|_| HttpDateError(raw.to_string()))
}
