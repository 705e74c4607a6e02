//! The board record.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A published board: one item of signed microcontent, keyed by its author's
/// public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Author public key, 64 lowercase hex characters.
    pub key: String,
    /// Raw HTML fragment exactly as posted, at most `MAX_BOARD_BYTES` bytes.
    pub body: Vec<u8>,
    /// Claimed modification time, parsed from the body's `<time>` element.
    pub modified: DateTime<Utc>,
    /// Ed25519 signature over `body`, 128 lowercase hex characters.
    pub signature: String,
}

impl Board {
    /// Render `modified` the way it is stored at rest (RFC3339, UTC).
    pub fn modified_at_db_format(&self) -> String {
        self.modified.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_db_format_is_rfc3339_utc() {
        let board = Board {
            key: "00".repeat(32),
            body: b"<time datetime=\"2024-06-15T12:00:00Z\"></time>".to_vec(),
            modified: Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
            signature: "00".repeat(64),
        };
        assert_eq!(board.modified_at_db_format(), "2024-06-15T12:00:00Z");
    }

    #[test]
    fn test_db_format_round_trips() {
        let modified = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        let board = Board {
            key: "11".repeat(32),
            body: Vec::new(),
            modified,
            signature: "22".repeat(64),
        };
        let parsed = DateTime::parse_from_rfc3339(&board.modified_at_db_format()).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), modified);
    }
}
