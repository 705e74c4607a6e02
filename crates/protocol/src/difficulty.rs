//! Difficulty factor and the key admission threshold.
//!
//! The difficulty factor grows with the number of stored boards:
//! `(count / 10_000_000)^4`. New keys, read as big-endian 256-bit integers,
//! must fall below `(2^256 - 1) * (1 - difficulty)`. Only the high 64 bits
//! take part in the comparison, which matches the protocol's observable
//! behavior for any realistic difficulty.

use crate::key::BoardKey;

/// Difficulty factor for a store currently holding `count` boards.
pub fn difficulty_factor(count: usize) -> f64 {
    (count as f64 / 10_000_000.0).powi(4)
}

/// Highest admissible value for the top 64 bits of a new key.
pub fn key_threshold(difficulty: f64) -> u64 {
    ((1.0 - difficulty) * u64::MAX as f64) as u64
}

/// Whether a new key falls under the admission threshold.
pub fn key_under_threshold(key: &BoardKey, difficulty: f64) -> bool {
    key.prefix_u64() < key_threshold(difficulty)
}
