//! Board propagation across a federation.
//!
//! Accepted boards are queued for every configured peer and drained by a
//! single background worker:
//! - an indexed min-heap keyed by `(board key, destination)` collapses
//!   duplicate work,
//! - failed deliveries back off with jittered exponential waits and give up
//!   an hour after entering the queue,
//! - the `Via` header suppresses immediate loopback between peers.

pub mod client;
pub mod queue;
pub mod tracker;

pub use client::{PeerClient, RelayError};
pub use queue::{RelayItem, RelayQueue};
pub use tracker::{via_token, PropagationTracker};
