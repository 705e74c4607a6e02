//! Board keys and their calendar-expiry suffix.
//!
//! A key is a 32-byte Ed25519 public key whose lowercase hex form must end in
//! `83eMMYY`: the `MMYY` digits name the month the key expires, credit-card
//! style. A key stays usable through the end of its expiry month and may not
//! name a month more than two years ahead.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use thiserror::Error;

use crate::DENYLIST;

/// Errors produced while validating a board key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid key")]
    Malformed,

    #[error("Signature must end with 83eMMYY. You might be using an old key format. Delete your old key, update your client, and try again.")]
    BadSuffix,

    #[error("Key has expired")]
    Expired,

    #[error("Key is set to expire more than two years in the future")]
    ExpiresTooLate,
}

/// A validated 32-byte board key in its canonical lowercase hex form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardKey {
    bytes: [u8; 32],
    hex: String,
}

impl BoardKey {
    /// Parse a path component as a board key: exactly 64 hex characters
    /// decoding to 32 bytes. Uppercase hex is normalized to lowercase.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        if s.len() != 64 {
            return Err(KeyError::Malformed);
        }
        let decoded = hex::decode(s).map_err(|_| KeyError::Malformed)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self {
            hex: hex::encode(bytes),
            bytes,
        })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// High 64 bits of the key read as a big-endian 256-bit integer. This is
    /// the part compared against the difficulty threshold.
    pub fn prefix_u64(&self) -> u64 {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.bytes[..8]);
        u64::from_be_bytes(prefix)
    }

    /// The calendar expiry encoded in the `MMYY` suffix: the first day of
    /// that month. Fails unless hex characters 57..60 are `83e` and the last
    /// four are a real `MMYY`.
    pub fn expiry(&self) -> Result<NaiveDate, KeyError> {
        if &self.hex[57..60] != "83e" {
            return Err(KeyError::BadSuffix);
        }
        let month: u32 = self.hex[60..62].parse().map_err(|_| KeyError::BadSuffix)?;
        let year: i32 = self.hex[62..64].parse().map_err(|_| KeyError::BadSuffix)?;
        NaiveDate::from_ymd_opt(2000 + year, month, 1).ok_or(KeyError::BadSuffix)
    }

    /// Check the expiry window against the clock: a key is accepted through
    /// the end of its expiry month and may not expire more than two years
    /// out.
    pub fn check_expiry(&self, now: DateTime<Utc>) -> Result<(), KeyError> {
        let expiry = self.expiry()?;
        let expiry_start = expiry
            .and_hms_opt(0, 0, 0)
            .map(|n| n.and_utc())
            .ok_or(KeyError::BadSuffix)?;
        let grace_end = expiry_start
            .checked_add_months(Months::new(1))
            .ok_or(KeyError::Expired)?;
        if now > grace_end {
            return Err(KeyError::Expired);
        }
        let horizon = now
            .checked_add_months(Months::new(24))
            .ok_or(KeyError::ExpiresTooLate)?;
        if expiry_start > horizon {
            return Err(KeyError::ExpiresTooLate);
        }
        Ok(())
    }

    /// Whether this key is on the server denylist.
    pub fn is_denied(&self) -> bool {
        DENYLIST.contains(&self.hex.as_str())
    }
}

impl std::fmt::Display for BoardKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex)
    }
}

/// The key suffix a freshly mined key should carry: `83e`, the current
/// month, and the last two digits of next year.
pub fn mining_suffix(now: DateTime<Utc>) -> String {
    format!("83e{:02}{:02}", now.month(), (now.year() + 1) % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key_ending(suffix: &str) -> BoardKey {
        let prefix = "a".repeat(64 - suffix.len());
        BoardKey::parse(&format!("{prefix}{suffix}")).unwrap()
    }

    #[test]
    fn test_parse_rejects_short_and_non_hex() {
        assert_eq!(BoardKey::parse("abcd"), Err(KeyError::Malformed));
        assert_eq!(
            BoardKey::parse(&"z".repeat(64)),
            Err(KeyError::Malformed)
        );
    }

    #[test]
    fn test_parse_normalizes_case() {
        let upper = "AB".repeat(32);
        let key = BoardKey::parse(&upper).unwrap();
        assert_eq!(key.as_hex(), "ab".repeat(32));
    }

    #[test]
    fn test_prefix_u64_is_big_endian() {
        let key = BoardKey::parse(&format!("ff00000000000001{}", "0".repeat(48))).unwrap();
        assert_eq!(key.prefix_u64(), 0xff00_0000_0000_0001);
    }

    #[test]
    fn test_expiry_parses_suffix() {
        let key = key_ending("83e1225");
        assert_eq!(key.expiry().unwrap(), NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
    }

    #[test]
    fn test_expiry_rejects_wrong_marker() {
        assert_eq!(key_ending("83f1225").expiry(), Err(KeyError::BadSuffix));
    }

    #[test]
    fn test_expiry_rejects_bad_month() {
        assert_eq!(key_ending("83e0025").expiry(), Err(KeyError::BadSuffix));
        assert_eq!(key_ending("83e1325").expiry(), Err(KeyError::BadSuffix));
        assert_eq!(key_ending("83eab25").expiry(), Err(KeyError::BadSuffix));
    }

    #[test]
    fn test_check_expiry_accepts_current_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(key_ending("83e1225").check_expiry(now), Ok(()));
        // still inside the one-month grace window after the expiry month opens
        assert_eq!(key_ending("83e0624").check_expiry(now), Ok(()));
    }

    #[test]
    fn test_check_expiry_rejects_expired() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(key_ending("83e0120").check_expiry(now), Err(KeyError::Expired));
        assert_eq!(key_ending("83e0424").check_expiry(now), Err(KeyError::Expired));
    }

    #[test]
    fn test_check_expiry_rejects_far_future() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(
            key_ending("83e0130").check_expiry(now),
            Err(KeyError::ExpiresTooLate)
        );
        // exactly two years out is still fine
        assert_eq!(key_ending("83e0626").check_expiry(now), Ok(()));
    }

    #[test]
    fn test_denylist_contains_test_key() {
        let key = BoardKey::parse(
            "fad415fbaa0339c4fd372d8287e50f67905321ccfd9c43fa4c20ac40afed1983",
        )
        .unwrap();
        assert!(key.is_denied());
        assert!(!key_ending("83e1225").is_denied());
    }

    #[test]
    fn test_mining_suffix_targets_next_year() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(mining_suffix(now), "83e0625");
    }
}
