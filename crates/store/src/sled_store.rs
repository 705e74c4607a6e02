//! Embedded board storage on sled.
//!
//! One tree keyed by board key; values are bincode records with `modified`
//! kept as an RFC3339 string at rest.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spring83_protocol::Board;

use crate::{BoardStore, StoreError};

/// Board row as serialized into sled.
#[derive(Serialize, Deserialize)]
struct StoredBoard {
    key: String,
    body: Vec<u8>,
    modified: String,
    signature: String,
}

/// Persistent board storage backed by an embedded sled database.
pub struct SledStore {
    db: sled::Db,
    boards: sled::Tree,
}

impl SledStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(&path)?;
        let boards = db.open_tree("boards")?;
        tracing::info!("opened board store at {:?}", path.as_ref());
        Ok(Self { db, boards })
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Board, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            key: String::from_utf8_lossy(key).into_owned(),
            reason,
        };
        let record: StoredBoard =
            bincode::deserialize(value).map_err(|err| corrupt(err.to_string()))?;
        let modified = DateTime::parse_from_rfc3339(&record.modified)
            .map_err(|err| corrupt(err.to_string()))?
            .with_timezone(&Utc);
        Ok(Board {
            key: record.key,
            body: record.body,
            modified,
            signature: record.signature,
        })
    }

    fn encode(board: &Board) -> Result<Vec<u8>, StoreError> {
        let record = StoredBoard {
            key: board.key.clone(),
            body: board.body.clone(),
            modified: board.modified_at_db_format(),
            signature: board.signature.clone(),
        };
        bincode::serialize(&record).map_err(|err| StoreError::Corrupt {
            key: board.key.clone(),
            reason: err.to_string(),
        })
    }
}

impl BoardStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Board>, StoreError> {
        match self.boards.get(key.as_bytes())? {
            Some(value) => Ok(Some(Self::decode(key.as_bytes(), &value)?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<Board>, StoreError> {
        let mut boards = Vec::new();
        for entry in self.boards.iter() {
            let (key, value) = entry?;
            boards.push(Self::decode(&key, &value)?);
        }
        boards.sort_by(|a, b| b.modified.cmp(&a.modified).then(a.key.cmp(&b.key)));
        Ok(boards)
    }

    fn put(&self, board: &Board) -> Result<(), StoreError> {
        let value = Self::encode(board)?;
        self.boards.insert(board.key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut expired = Vec::new();
        for entry in self.boards.iter() {
            let (key, value) = entry?;
            let board = Self::decode(&key, &value)?;
            if board.modified < cutoff {
                expired.push(key);
            }
        }
        let removed = expired.len();
        for key in expired {
            self.boards.remove(key)?;
        }
        if removed > 0 {
            self.db.flush()?;
        }
        Ok(removed)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.boards.len())
    }
}
