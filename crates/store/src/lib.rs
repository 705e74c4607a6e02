//! Board repositories.
//!
//! One logical table keyed by board key, with a sweep-by-age operation for
//! the reaper. Two backends ship here: a concurrent in-memory map and an
//! embedded sled database. Anything else (server-side SQL, say) just has to
//! implement the five-method `BoardStore` trait.

pub mod memory;
pub mod reaper;
pub mod sled_store;

pub use memory::MemoryStore;
pub use reaper::Reaper;
pub use sled_store::SledStore;

use chrono::{DateTime, Utc};
use spring83_protocol::Board;
use thiserror::Error;

/// Errors surfaced by a board repository. Callers translate these into
/// internal-server-error responses without leaking detail.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Backend(#[from] sled::Error),

    #[error("corrupt board record for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// The keyed blob repository holding published boards.
///
/// `put` is an insert-or-replace keyed by `board.key` and must be atomic
/// with respect to concurrent `get`/`list`. `list` orders by `modified`
/// descending. `count` feeds the difficulty factor.
pub trait BoardStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Board>, StoreError>;

    fn list(&self) -> Result<Vec<Board>, StoreError>;

    fn put(&self, board: &Board) -> Result<(), StoreError>;

    /// Remove boards with `modified` strictly before `cutoff`; returns how
    /// many were removed.
    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}
