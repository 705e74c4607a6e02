//! Core protocol rules for Spring '83 boards.
//!
//! This crate holds the pure value types and checks shared by the server and
//! the relay machinery:
//! - Board record and its at-rest time format
//! - Key parsing, the `83eMMYY` expiry suffix, and the difficulty threshold
//! - Ed25519 signature parsing and verification
//! - Extraction of the `<time datetime="...">` element from board bodies

pub mod board;
pub mod difficulty;
pub mod httpdate;
pub mod key;
pub mod signature;
pub mod timetag;

pub use board::Board;
pub use key::{BoardKey, KeyError};
pub use signature::{BoardSignature, SignatureError};

/// Maximum board body size in bytes.
pub const MAX_BOARD_BYTES: usize = 2217;

/// Protocol version advertised in `Spring-Version` headers.
pub const SPRING_VERSION: &str = "83";

/// Boards whose claimed modification time is older than this are reaped.
pub const MAX_BOARD_AGE_DAYS: i64 = 22;

/// Keys that are never accepted for publication. The protocol's published
/// test key is always on this list.
pub const DENYLIST: &[&str] =
    &["fad415fbaa0339c4fd372d8287e50f67905321ccfd9c43fa4c20ac40afed1983"];
