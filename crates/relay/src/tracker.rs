//! The propagation tracker: a shared queue plus one background worker.
//!
//! Admissions call `fan_out`, which upserts one queue entry per peer and
//! wakes the worker if it is not running. The worker pops due entries,
//! posts them with the queue mutex released, and either discards the entry
//! or reschedules it with a jittered exponential wait. An entry whose next
//! attempt would land more than an hour after it entered the queue is
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use spring83_protocol::Board;

use crate::client::PeerClient;
use crate::queue::{RelayItem, RelayQueue};

/// How long a queue entry may keep retrying after it was queued.
fn give_up_after() -> chrono::Duration {
    chrono::Duration::hours(1)
}

struct TrackerState {
    queue: RelayQueue,
    worker_running: bool,
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    client: PeerClient,
    propagate_wait: Duration,
}

/// Schedules accepted boards for delivery to peers and drives the queue to
/// quiescence. Cheap to clone; all clones share one queue and worker.
#[derive(Clone)]
pub struct PropagationTracker {
    inner: Arc<TrackerInner>,
}

impl PropagationTracker {
    pub fn new(client: PeerClient, propagate_wait: Duration) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(TrackerState {
                    queue: RelayQueue::new(),
                    worker_running: false,
                }),
                client,
                propagate_wait,
            }),
        }
    }

    /// Queue `board` for every peer in `federates` except the one named by
    /// the inbound `Via` token, if any.
    pub fn fan_out(&self, board: &Board, federates: &[String], via_host: Option<&str>) {
        for federate in federates {
            if let Some(via) = via_host {
                if host_of(federate) == via {
                    tracing::debug!("not scheduling {federate}: board arrived via {via}");
                    continue;
                }
            }
            self.schedule(board.clone(), federate);
        }
    }

    /// Insert or refresh the queue entry for `(board.key, destination)` and
    /// make sure a worker is draining the queue.
    pub fn schedule(&self, board: Board, destination: &str) {
        let at = Utc::now()
            + chrono::Duration::from_std(self.inner.propagate_wait)
                .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let key = board.key.clone();
        let mut state = self.inner.state.lock();
        let fresh = state.queue.upsert(board, destination, at);
        if let Some(item) = state.queue.lookup(&key, destination) {
            if fresh {
                tracing::info!(
                    "{} queued for propagation at {}",
                    item.shorthand(),
                    item.next_attempt.to_rfc3339()
                );
            } else {
                tracing::info!(
                    "{} already queued, rescheduled for {}",
                    item.shorthand(),
                    item.next_attempt.to_rfc3339()
                );
            }
        }
        if !state.worker_running {
            state.worker_running = true;
            let worker = self.clone();
            tokio::spawn(async move { worker.process_queue().await });
        }
    }

    /// Number of live queue entries.
    pub fn queued_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Snapshot of the live entry for a `(key, destination)` pair.
    pub fn queued(&self, key: &str, destination: &str) -> Option<RelayItem> {
        self.inner.state.lock().queue.lookup(key, destination).cloned()
    }

    async fn process_queue(self) {
        tracing::debug!("propagation worker spinning up");
        loop {
            let due = {
                let mut state = self.inner.state.lock();
                if state.queue.is_empty() {
                    state.worker_running = false;
                    tracing::debug!("queue empty, propagation worker spinning down");
                    return;
                }
                state.queue.pop_due(Utc::now())
            };

            let item = match due {
                Some(item) => item,
                None => {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let tag = item.shorthand();
            match self.inner.client.post_board(&item.destination, &item.board).await {
                Ok(()) => tracing::info!("{tag} successfully propagated"),
                Err(err) => {
                    tracing::warn!("{tag} delivery failed: {err}");
                    match reschedule_after_failure(item, Utc::now(), &mut rand::thread_rng()) {
                        Some(item) => {
                            tracing::info!(
                                "{tag} will retry at {}",
                                item.next_attempt.to_rfc3339()
                            );
                            self.inner.state.lock().queue.reinsert(item);
                        }
                        None => tracing::warn!("{tag} too many attempts, giving up"),
                    }
                }
            }
        }
    }
}

/// Decide the follow-up for a failed delivery: the item rescheduled with a
/// jittered exponential wait, or `None` once its retry budget is spent.
fn reschedule_after_failure<R: Rng>(
    mut item: RelayItem,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<RelayItem> {
    item.attempts += 1;
    let upper = 1i64 << item.attempts.min(30);
    let wait_minutes = rng.gen_range(0..upper).max(2);
    item.next_attempt = now + chrono::Duration::minutes(wait_minutes);
    if item.next_attempt > item.queued_at + give_up_after() {
        None
    } else {
        Some(item)
    }
}

/// The host token of a `Via: Spring/83 <host>` header value: its second
/// whitespace-separated field.
pub fn via_token(header_value: &str) -> Option<&str> {
    header_value.split_whitespace().nth(1)
}

/// Hostname portion of a configured peer URL, scheme stripped, for
/// comparison against `Via` tokens.
fn host_of(url: &str) -> &str {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn board(key: &str) -> Board {
        Board {
            key: key.to_string(),
            body: b"<time datetime=\"2024-06-15T12:00:00Z\"></time>hello".to_vec(),
            modified: Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
            signature: "ab".repeat(64),
        }
    }

    fn item(queued_at: DateTime<Utc>) -> RelayItem {
        RelayItem {
            board: board(&"cd".repeat(32)),
            destination: "https://peer.example".to_string(),
            queued_at,
            next_attempt: queued_at,
            attempts: 0,
        }
    }

    fn tracker(wait: Duration) -> PropagationTracker {
        let client = PeerClient::new("node.test").unwrap();
        PropagationTracker::new(client, wait)
    }

    #[test]
    fn test_via_token_takes_second_field() {
        assert_eq!(via_token("Spring/83 peer-a.example"), Some("peer-a.example"));
        assert_eq!(via_token("  Spring/83   peer-a.example  "), Some("peer-a.example"));
        assert_eq!(via_token("Spring/83"), None);
        assert_eq!(via_token(""), None);
    }

    #[test]
    fn test_host_of_strips_scheme() {
        assert_eq!(host_of("https://peer-a.example"), "peer-a.example");
        assert_eq!(host_of("http://peer-a.example/"), "peer-a.example");
        assert_eq!(host_of("peer-a.example"), "peer-a.example");
    }

    #[test]
    fn test_reschedule_waits_at_least_two_minutes() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(83);
        let rescheduled = reschedule_after_failure(item(now), now, &mut rng).unwrap();
        assert_eq!(rescheduled.attempts, 1);
        assert!(rescheduled.next_attempt >= now + chrono::Duration::minutes(2));
    }

    #[test]
    fn test_reschedule_gives_up_after_an_hour() {
        let queued_at = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let now = queued_at + chrono::Duration::minutes(59);
        let mut rng = StdRng::seed_from_u64(83);
        // 59 minutes in, even the two-minute floor lands past the budget
        assert!(reschedule_after_failure(item(queued_at), now, &mut rng).is_none());
    }

    #[test]
    fn test_retries_increase_until_given_up() {
        let queued_at = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(4242);
        let mut current = item(queued_at);
        let mut last_attempt = current.next_attempt;
        let mut rounds = 0;
        loop {
            let now = last_attempt;
            match reschedule_after_failure(current, now, &mut rng) {
                Some(next) => {
                    assert!(next.next_attempt > last_attempt);
                    assert!(next.next_attempt <= next.queued_at + give_up_after());
                    last_attempt = next.next_attempt;
                    current = next;
                }
                None => break,
            }
            rounds += 1;
            assert!(rounds <= 60, "retry loop never gave up");
        }
    }

    #[tokio::test]
    async fn test_fan_out_skips_the_via_peer() {
        let tracker = tracker(Duration::from_secs(300));
        let federates = vec![
            "https://peer-a.example".to_string(),
            "https://peer-b.example".to_string(),
        ];
        let board = board(&"ab".repeat(32));
        tracker.fan_out(&board, &federates, Some("peer-a.example"));

        assert_eq!(tracker.queued_len(), 1);
        assert!(tracker.queued(&board.key, "https://peer-b.example").is_some());
        assert!(tracker.queued(&board.key, "https://peer-a.example").is_none());
    }

    #[tokio::test]
    async fn test_worker_delivers_due_item_and_drains() {
        let server = MockServer::start().await;
        let board = board(&"ab".repeat(32));
        Mock::given(method("PUT"))
            .and(path(format!("/{}", board.key)))
            .and(header("Spring-Version", "83"))
            .and(header("Content-Type", "text/html;charset=utf-8"))
            .and(header("Spring-Signature", board.signature.as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = tracker(Duration::ZERO);
        tracker.schedule(board, &server.uri());

        for _ in 0..100 {
            if !server.received_requests().await.unwrap_or_default().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);
        assert_eq!(tracker.queued_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_rescheduled_with_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tracker = tracker(Duration::ZERO);
        let board = board(&"ab".repeat(32));
        tracker.schedule(board.clone(), &server.uri());

        let mut retried = None;
        for _ in 0..100 {
            if let Some(item) = tracker.queued(&board.key, &server.uri()) {
                if item.attempts >= 1 {
                    retried = Some(item);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let retried = retried.expect("item was never rescheduled");
        assert_eq!(retried.attempts, 1);
        assert!(retried.next_attempt >= Utc::now() + chrono::Duration::minutes(1));
    }
}
