//! Extraction of the claimed modification time from a board body.
//!
//! Every board must embed exactly one
//! `<time datetime="YYYY-MM-DDTHH:MM:SSZ">` element; its timestamp is the
//! board's claimed modification time and must be re-checked out-of-band from
//! any HTTP headers.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::bytes::Regex;
use thiserror::Error;

static TIME_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<\s*time\s+datetime\s*=\s*"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z)"\s*/?\s*>"#,
    )
    .expect("valid time tag pattern")
});

/// Errors produced while reading a board body's time tag.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeTagError {
    #[error("Missing <time datetime=\"YYYY-MM-DDTHH:MM:SSZ\"> tag")]
    Missing,

    #[error("Could not parse date {0}")]
    BadDate(String),
}

/// Parse the claimed modification time out of a board body.
pub fn parse_modified(body: &[u8]) -> Result<DateTime<Utc>, TimeTagError> {
    let captures = TIME_TAG.captures(body).ok_or(TimeTagError::Missing)?;
    let raw = captures.get(1).ok_or(TimeTagError::Missing)?.as_bytes();
    let text = std::str::from_utf8(raw)
        .map_err(|_| TimeTagError::BadDate(String::from_utf8_lossy(raw).into_owned()))?;
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ")
        .map(|naive| naive.and_utc())
        .map_err(|_| TimeTagError::BadDate(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plain_tag() {
        let body = b"<time datetime=\"2024-06-15T12:00:00Z\"></time>hello";
        assert_eq!(
            parse_modified(body).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_tag_is_case_insensitive_and_whitespace_tolerant() {
        let body = b"< TIME  datetime = \"2024-06-15T12:00:00Z\" />";
        assert_eq!(
            parse_modified(body).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_self_closing_tag() {
        let body = b"before<time datetime=\"2023-01-01T00:00:00Z\"/>after";
        assert!(parse_modified(body).is_ok());
    }

    #[test]
    fn test_missing_tag() {
        assert_eq!(parse_modified(b"no tag here"), Err(TimeTagError::Missing));
        assert_eq!(
            parse_modified(b"<time datetime=\"June 15\">"),
            Err(TimeTagError::Missing)
        );
    }

    #[test]
    fn test_digits_that_are_not_a_date() {
        let body = b"<time datetime=\"2024-99-99T99:99:99Z\">";
        assert_eq!(
            parse_modified(body),
            Err(TimeTagError::BadDate("2024-99-99T99:99:99Z".to_string()))
        );
    }

    #[test]
    fn test_tag_inside_binary_body() {
        let mut body = vec![0xff, 0xfe, 0x00];
        body.extend_from_slice(b"<time datetime=\"2024-06-15T12:00:00Z\">");
        body.push(0xff);
        assert!(parse_modified(&body).is_ok());
    }
}
