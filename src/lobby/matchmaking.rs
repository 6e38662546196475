//! Matchmaking Queue
//!
//! Holds waiting participants and pairs them by rating proximity, widening
//! the acceptable gap the longer a pair has waited. A pairing pass runs on
//! a fixed interval and additionally as soon as the queue holds two or more
//! entries. The pairing callback re-validates everything before a session
//! is constructed; the queue itself only decides who plays whom.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::game::ParticipantId;
use crate::network::connection::ConnectionHandle;

/// Base allowed rating gap, and its growth per widening step.
pub const RATING_GAP_INCREMENT: u32 = 100;

/// Allowed rating gap never widens beyond this.
pub const RATING_GAP_MAX: u32 = 500;

/// Average wait needed to widen the allowed gap by one increment.
pub const GAP_WIDEN_STEP: Duration = Duration::from_secs(5);

/// Interval between scheduled pairing passes.
pub const PAIRING_INTERVAL: Duration = Duration::from_secs(3);

/// A participant waiting for an opponent.
#[derive(Clone)]
pub struct QueueEntry {
    /// Participant identifier. Unique within the queue.
    pub participant_id: ParticipantId,
    /// Rating at enqueue time.
    pub rating: u32,
    /// Active deck id at enqueue time.
    pub deck_id: String,
    /// The participant's matchmaking connection.
    pub conn: ConnectionHandle,
    /// When the participant entered the queue. Survives re-enqueues so
    /// accumulated wait keeps widening the allowed gap.
    pub enqueued_at: Instant,
}

/// Callback invoked once per formed pair, outside the queue lock.
pub type PairHandler = Arc<dyn Fn(QueueEntry, QueueEntry) + Send + Sync>;

/// The rating-based matchmaking queue.
pub struct MatchmakingQueue {
    entries: Mutex<Vec<QueueEntry>>,
    on_pair: PairHandler,
}

impl MatchmakingQueue {
    /// Build a queue that hands formed pairs to `on_pair`.
    pub fn new(on_pair: PairHandler) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            on_pair,
        }
    }

    fn locked(&self) -> MutexGuard<'_, Vec<QueueEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a participant, replacing any previous entry with the same id.
    ///
    /// A replacement refreshes the connection handle and rating but keeps
    /// the original enqueue timestamp. Triggers an immediate pairing pass
    /// once two entries are waiting.
    pub fn enqueue(&self, entry: QueueEntry) {
        let queue_len = {
            let mut queue = self.locked();
            if let Some(existing) = queue
                .iter_mut()
                .find(|e| e.participant_id == entry.participant_id)
            {
                let original_wait = existing.enqueued_at;
                *existing = entry;
                existing.enqueued_at = original_wait;
                debug!(participant = %existing.participant_id, "refreshed queue entry");
            } else {
                info!(participant = %entry.participant_id, rating = entry.rating, "participant queued");
                queue.push(entry);
            }
            queue.len()
        };
        if queue_len >= 2 {
            self.pair_pass();
        }
    }

    /// Remove a participant. Returns whether an entry was removed.
    pub fn cancel(&self, participant: &ParticipantId) -> bool {
        let mut queue = self.locked();
        let before = queue.len();
        queue.retain(|e| e.participant_id != *participant);
        if queue.len() < before {
            info!(participant = %participant, "participant left the queue");
            true
        } else {
            false
        }
    }

    /// Number of waiting entries.
    pub fn len(&self) -> usize {
        self.locked().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }

    /// Allowed rating gap for a pair that has waited `average_wait` on
    /// average: one increment immediately, one more per widening step,
    /// capped.
    pub fn allowed_gap(average_wait: Duration) -> u32 {
        let steps = (average_wait.as_millis() / GAP_WIDEN_STEP.as_millis()) as u32;
        RATING_GAP_INCREMENT
            .saturating_add(steps.saturating_mul(RATING_GAP_INCREMENT))
            .min(RATING_GAP_MAX)
    }

    /// One full pairing pass: sort by rating then wait, greedily pair
    /// entries whose rating difference fits the widened gap, remove every
    /// matched entry, then hand the pairs to the callback.
    pub fn pair_pass(&self) {
        let pairs = {
            let mut queue = self.locked();
            if queue.len() < 2 {
                return;
            }
            queue.sort_by(|a, b| {
                a.rating
                    .cmp(&b.rating)
                    .then(a.enqueued_at.cmp(&b.enqueued_at))
            });

            let now = Instant::now();
            let mut matched = vec![false; queue.len()];
            let mut pairs = Vec::new();
            for i in 0..queue.len() {
                if matched[i] {
                    continue;
                }
                for j in (i + 1)..queue.len() {
                    if matched[j] {
                        continue;
                    }
                    let wait_i = now.saturating_duration_since(queue[i].enqueued_at);
                    let wait_j = now.saturating_duration_since(queue[j].enqueued_at);
                    let allowed = Self::allowed_gap((wait_i + wait_j) / 2);
                    let difference = queue[i].rating.abs_diff(queue[j].rating);
                    if difference <= allowed {
                        debug!(
                            first = %queue[i].participant_id,
                            second = %queue[j].participant_id,
                            difference,
                            allowed,
                            "pair formed"
                        );
                        matched[i] = true;
                        matched[j] = true;
                        pairs.push((queue[i].clone(), queue[j].clone()));
                        break;
                    }
                }
            }

            let mut index = 0;
            queue.retain(|_| {
                let keep = !matched[index];
                index += 1;
                keep
            });
            pairs
        };

        for (first, second) in pairs {
            info!(
                first = %first.participant_id,
                second = %second.participant_id,
                "match found"
            );
            (self.on_pair)(first, second);
        }
    }

    /// Spawn the periodic pairing task.
    pub fn spawn_pairing_task(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PAIRING_INTERVAL);
            loop {
                ticker.tick().await;
                queue.pair_pass();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn entry(id: &str, rating: u32, waited: Duration) -> QueueEntry {
        let (conn, rx) = ConnectionHandle::channel(4);
        // Keep the receiver alive for the duration of the test entry.
        std::mem::forget(rx);
        QueueEntry {
            participant_id: ParticipantId::from(id),
            rating,
            deck_id: format!("deck_{id}"),
            conn,
            enqueued_at: Instant::now() - waited,
        }
    }

    fn collecting_queue() -> (Arc<MatchmakingQueue>, Arc<StdMutex<Vec<(String, String)>>>) {
        let pairs = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&pairs);
        let queue = Arc::new(MatchmakingQueue::new(Arc::new(move |a, b| {
            sink.lock().unwrap().push((
                a.participant_id.as_str().to_string(),
                b.participant_id.as_str().to_string(),
            ));
        })));
        (queue, pairs)
    }

    #[test]
    fn equal_ratings_pair_immediately() {
        let (queue, pairs) = collecting_queue();
        queue.enqueue(entry("a", 1000, Duration::ZERO));
        queue.enqueue(entry("b", 1000, Duration::ZERO));

        let pairs = pairs.lock().unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn distant_ratings_wait_for_the_gap_to_widen() {
        let (queue, pairs) = collecting_queue();
        queue.enqueue(entry("a", 1000, Duration::ZERO));
        queue.enqueue(entry("b", 1250, Duration::ZERO));

        assert!(pairs.lock().unwrap().is_empty());
        assert_eq!(queue.len(), 2);

        // Simulate accumulated wait by re-running the pass against
        // backdated entries.
        queue.cancel(&ParticipantId::from("a"));
        queue.cancel(&ParticipantId::from("b"));
        queue.enqueue(entry("a", 1000, Duration::from_secs(10)));
        queue.enqueue(entry("b", 1250, Duration::from_secs(10)));

        assert_eq!(pairs.lock().unwrap().len(), 1);
    }

    #[test]
    fn gap_widens_with_wait_and_caps() {
        assert_eq!(MatchmakingQueue::allowed_gap(Duration::ZERO), 100);
        assert_eq!(MatchmakingQueue::allowed_gap(Duration::from_secs(4)), 100);
        assert_eq!(MatchmakingQueue::allowed_gap(Duration::from_secs(5)), 200);
        assert_eq!(MatchmakingQueue::allowed_gap(Duration::from_secs(12)), 300);
        assert_eq!(
            MatchmakingQueue::allowed_gap(Duration::from_secs(3600)),
            RATING_GAP_MAX
        );
    }

    #[test]
    fn paired_gap_never_exceeds_allowance() {
        let (queue, pairs) = collecting_queue();
        queue.enqueue(entry("a", 1000, Duration::from_secs(2)));
        queue.enqueue(entry("b", 1101, Duration::from_secs(2)));
        // 101 > 100 at under one widening step.
        assert!(pairs.lock().unwrap().is_empty());

        queue.enqueue(entry("c", 1100, Duration::ZERO));
        // a and c differ by exactly the base gap: they pair; b keeps waiting.
        let formed = pairs.lock().unwrap();
        assert_eq!(formed.len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn closest_ratings_pair_first() {
        let (queue, pairs) = collecting_queue();
        queue.enqueue(entry("low", 900, Duration::ZERO));
        queue.enqueue(entry("mid", 950, Duration::ZERO));
        let formed = pairs.lock().unwrap().clone();
        assert_eq!(formed.len(), 1);
        assert_eq!(formed[0], ("low".to_string(), "mid".to_string()));
    }

    #[test]
    fn re_enqueue_replaces_entry_and_keeps_wait_credit() {
        let (queue, _pairs) = collecting_queue();
        queue.enqueue(entry("a", 1000, Duration::from_secs(20)));
        queue.enqueue(entry("a", 1000, Duration::ZERO));

        assert_eq!(queue.len(), 1, "re-enqueue must not duplicate");
        let waited = {
            let entries = queue.locked();
            Instant::now().saturating_duration_since(entries[0].enqueued_at)
        };
        assert!(
            waited >= Duration::from_secs(19),
            "original wait credit was lost"
        );
    }

    #[test]
    fn cancel_removes_the_entry() {
        let (queue, _pairs) = collecting_queue();
        queue.enqueue(entry("a", 1000, Duration::ZERO));
        assert!(queue.cancel(&ParticipantId::from("a")));
        assert!(!queue.cancel(&ParticipantId::from("a")));
        assert!(queue.is_empty());
    }

    #[test]
    fn one_pass_can_form_multiple_pairs() {
        let (queue, pairs) = collecting_queue();
        {
            let mut entries = queue.locked();
            entries.push(entry("a", 1000, Duration::ZERO));
            entries.push(entry("b", 1010, Duration::ZERO));
            entries.push(entry("c", 2000, Duration::ZERO));
            entries.push(entry("d", 2020, Duration::ZERO));
        }
        queue.pair_pass();

        assert_eq!(pairs.lock().unwrap().len(), 2);
        assert!(queue.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn allowed_gap_is_monotonic_and_capped(a in 0u64..10_000, b in 0u64..10_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let gap_lo = MatchmakingQueue::allowed_gap(Duration::from_millis(lo));
            let gap_hi = MatchmakingQueue::allowed_gap(Duration::from_millis(hi));
            proptest::prop_assert!(gap_lo <= gap_hi);
            proptest::prop_assert!(gap_hi <= RATING_GAP_MAX);
            proptest::prop_assert!(gap_lo >= RATING_GAP_INCREMENT);
        }
    }
}
