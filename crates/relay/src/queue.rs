//! The relay queue: an indexed min-heap of pending deliveries.
//!
//! Priority is the earliest `next_attempt`; identity is the pair
//! `(board key, destination)`, of which at most one live entry exists.
//! Every heap slot is mirrored in the lookup index and vice versa.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use spring83_protocol::Board;

/// One scheduled delivery of a board to a single destination.
#[derive(Debug, Clone)]
pub struct RelayItem {
    pub board: Board,
    pub destination: String,
    pub queued_at: DateTime<Utc>,
    pub next_attempt: DateTime<Utc>,
    pub attempts: u32,
}

impl RelayItem {
    fn pair(&self) -> (String, String) {
        (self.board.key.clone(), self.destination.clone())
    }

    /// Compact tag for log lines: `(12345678...1225, https://peer)`.
    pub fn shorthand(&self) -> String {
        let key = &self.board.key;
        format!(
            "({}...{}, {})",
            &key[..8.min(key.len())],
            &key[key.len().saturating_sub(4)..],
            self.destination
        )
    }
}

/// Min-heap on `next_attempt` with a position index per `(key, destination)`
/// pair.
#[derive(Default)]
pub struct RelayQueue {
    heap: Vec<RelayItem>,
    index: HashMap<(String, String), usize>,
}

impl RelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The entry with the earliest `next_attempt`, if any.
    pub fn peek(&self) -> Option<&RelayItem> {
        self.heap.first()
    }

    /// The live entry for a `(key, destination)` pair, if any.
    pub fn lookup(&self, key: &str, destination: &str) -> Option<&RelayItem> {
        self.index
            .get(&(key.to_string(), destination.to_string()))
            .and_then(|&slot| self.heap.get(slot))
    }

    /// Insert or refresh the entry for `(board.key, destination)`.
    ///
    /// A refresh replaces the carried board, zeroes the attempt counter and
    /// moves both timestamps to `at`; a fresh insert starts the same way.
    /// Returns whether the entry is new.
    pub fn upsert(&mut self, board: Board, destination: &str, at: DateTime<Utc>) -> bool {
        let pair = (board.key.clone(), destination.to_string());
        if let Some(&slot) = self.index.get(&pair) {
            let item = &mut self.heap[slot];
            item.board = board;
            item.attempts = 0;
            item.queued_at = at;
            item.next_attempt = at;
            self.restore(slot);
            false
        } else {
            self.push(RelayItem {
                board,
                destination: destination.to_string(),
                queued_at: at,
                next_attempt: at,
                attempts: 0,
            });
            true
        }
    }

    /// Put a popped item back, keeping its attempt counter. Used by the
    /// retry path after a failed delivery.
    pub fn reinsert(&mut self, item: RelayItem) {
        if let Some(&slot) = self.index.get(&item.pair()) {
            tracing::warn!(
                "{} reinserted while already queued, replacing",
                item.shorthand()
            );
            self.remove_at(slot);
        }
        self.push(item);
    }

    /// Remove and return the head, but only if it is due at `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<RelayItem> {
        if self.heap.first()?.next_attempt > now {
            return None;
        }
        self.remove_at(0)
    }

    fn push(&mut self, item: RelayItem) {
        let slot = self.heap.len();
        self.index.insert(item.pair(), slot);
        self.heap.push(item);
        self.sift_up(slot);
    }

    fn remove_at(&mut self, slot: usize) -> Option<RelayItem> {
        if slot >= self.heap.len() {
            return None;
        }
        let last = self.heap.len() - 1;
        if slot != last {
            self.swap_slots(slot, last);
        }
        let item = self.heap.pop()?;
        self.index.remove(&item.pair());
        if slot < self.heap.len() {
            self.restore(slot);
        }
        Some(item)
    }

    fn restore(&mut self, slot: usize) {
        self.sift_down(slot);
        self.sift_up(slot);
    }

    fn earlier(&self, a: usize, b: usize) -> bool {
        self.heap[a].next_attempt < self.heap[b].next_attempt
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.index.insert(self.heap[a].pair(), a);
        self.index.insert(self.heap[b].pair(), b);
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.earlier(slot, parent) {
                break;
            }
            self.swap_slots(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let mut smallest = slot;
            for child in [2 * slot + 1, 2 * slot + 2] {
                if child < self.heap.len() && self.earlier(child, smallest) {
                    smallest = child;
                }
            }
            if smallest == slot {
                return;
            }
            self.swap_slots(slot, smallest);
            slot = smallest;
        }
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        assert_eq!(self.heap.len(), self.index.len());
        for (slot, item) in self.heap.iter().enumerate() {
            assert_eq!(self.index[&item.pair()], slot);
            if slot > 0 {
                let parent = (slot - 1) / 2;
                assert!(self.heap[parent].next_attempt <= item.next_attempt);
            }
        }
    }
}
