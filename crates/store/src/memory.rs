//! In-memory board storage using DashMap for concurrent access.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use spring83_protocol::Board;

use crate::{BoardStore, StoreError};

/// Thread-safe in-memory board storage. Nothing survives a restart; useful
/// for tests and throwaway nodes.
#[derive(Default)]
pub struct MemoryStore {
    boards: DashMap<String, Board>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoardStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Board>, StoreError> {
        Ok(self.boards.get(key).map(|entry| entry.value().clone()))
    }

    fn list(&self) -> Result<Vec<Board>, StoreError> {
        let mut boards: Vec<Board> = self
            .boards
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        boards.sort_by(|a, b| b.modified.cmp(&a.modified).then(a.key.cmp(&b.key)));
        Ok(boards)
    }

    fn put(&self, board: &Board) -> Result<(), StoreError> {
        self.boards.insert(board.key.clone(), board.clone());
        Ok(())
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.boards.len();
        self.boards.retain(|_, board| board.modified >= cutoff);
        Ok(before - self.boards.len())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.boards.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn board(key: &str, day: u32) -> Board {
        Board {
            key: key.to_string(),
            body: format!("<time datetime=\"2024-06-{day:02}T00:00:00Z\"></time>").into_bytes(),
            modified: Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap(),
            signature: "00".repeat(64),
        }
    }

    #[test]
    fn test_put_and_get() {
        let store = MemoryStore::new();
        let board = board("aa", 15);
        store.put(&board).unwrap();
        assert_eq!(store.get("aa").unwrap().unwrap(), board);
        assert!(store.get("bb").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_same_key() {
        let store = MemoryStore::new();
        store.put(&board("aa", 1)).unwrap();
        store.put(&board("aa", 20)).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("aa").unwrap().unwrap().modified.to_rfc3339(),
            "2024-06-20T00:00:00+00:00");
    }

    #[test]
    fn test_list_orders_by_modified_desc() {
        let store = MemoryStore::new();
        store.put(&board("aa", 1)).unwrap();
        store.put(&board("bb", 20)).unwrap();
        store.put(&board("cc", 10)).unwrap();
        let keys: Vec<String> = store.list().unwrap().into_iter().map(|b| b.key).collect();
        assert_eq!(keys, vec!["bb", "cc", "aa"]);
    }

    #[test]
    fn test_delete_before_sweeps_only_old_rows() {
        let store = MemoryStore::new();
        store.put(&board("aa", 1)).unwrap();
        store.put(&board("bb", 20)).unwrap();
        let cutoff = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        assert_eq!(store.delete_before(cutoff).unwrap(), 1);
        assert!(store.get("aa").unwrap().is_none());
        assert!(store.get("bb").unwrap().is_some());
        // a row exactly at the cutoff survives
        store.put(&board("cc", 10)).unwrap();
        assert_eq!(store.delete_before(cutoff).unwrap(), 0);
    }
}
