//! The worker queue: an ordered, FIFO-dispatched set of live workers.
//!
//! A plain `Vec` scanned linearly on every operation, per the design
//! notes: queue length is bounded by the operator's worker fleet (tens,
//! not thousands), so O(n) append/delete/refresh/dequeue/purge is the
//! right tradeoff against a hash-indexed structure. The queue is owned
//! exclusively by the broker's single execution context - no lock here,
//! matching the concurrency model's "no locks are needed" requirement.

use std::sync::Arc;
use tracing::{debug, warn};

use pp_transport::Clock;

/// How many heartbeat intervals of silence a worker tolerates before
/// being declared dead.
pub const LIVENESS: i64 = 3;

/// Heartbeat period in milliseconds.
pub const INTERVAL_MS: i64 = 1000;

/// An active worker as tracked by the broker: its readable identity and
/// the absolute monotonic-millisecond deadline after which it's dead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    pub identity: String,
    pub expiry: i64,
}

/// Ordered set of live workers with uniqueness and FIFO dispatch.
pub struct WorkerQueue {
    workers: Vec<Worker>,
    clock: Arc<dyn Clock>,
}

impl WorkerQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            workers: Vec::new(),
            clock,
        }
    }

    fn expiry_from_now(&self) -> i64 {
        self.clock.now_ms() + LIVENESS * INTERVAL_MS
    }

    fn position(&self, identity: &str) -> Option<usize> {
        self.workers.iter().position(|w| w.identity == identity)
    }

    /// Insert a worker at the tail with a fresh expiry. Rejects (logs,
    /// no-ops) if the identity is already present - callers that want a
    /// reset semantics (a duplicate `READY`) must `delete` first.
    pub fn append(&mut self, identity: &str) {
        if self.position(identity).is_some() {
            warn!(identity, "duplicate worker identity");
            return;
        }
        self.workers.push(Worker {
            identity: identity.to_string(),
            expiry: self.expiry_from_now(),
        });
    }

    /// Remove a worker if present; a no-op otherwise.
    pub fn delete(&mut self, identity: &str) {
        if let Some(idx) = self.position(identity) {
            self.workers.remove(idx);
        }
    }

    /// Reset a present worker's expiry; logs and does nothing if the
    /// worker isn't in the queue (it is not inserted as a side effect).
    pub fn refresh(&mut self, identity: &str) {
        let expiry = self.expiry_from_now();
        match self.position(identity) {
            Some(idx) => self.workers[idx].expiry = expiry,
            None => warn!(identity, "worker not ready"),
        }
    }

    /// Pop the head (oldest-appended) worker's identity. `None` if the
    /// queue is empty - callers are expected to have checked non-empty
    /// first (the broker only calls this when admission control has
    /// already verified the queue is non-empty).
    pub fn dequeue(&mut self) -> Option<String> {
        if self.workers.is_empty() {
            return None;
        }
        Some(self.workers.remove(0).identity)
    }

    /// Drop every worker whose expiry is in the past. `Vec::retain`
    /// visits each element exactly once, unlike the erase-in-a-loop
    /// pattern in the source this broker is modelled on, which could
    /// skip the element following an erasure.
    pub fn purge(&mut self) {
        let now = self.clock.now_ms();
        let before = self.workers.len();
        self.workers.retain(|w| w.expiry >= now);
        let purged = before - self.workers.len();
        if purged > 0 {
            debug!(purged, "purged expired workers");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.position(identity).is_some()
    }

    /// Iterate over every currently-queued worker identity, in FIFO
    /// order - used to fan out heartbeats.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(|w| w.identity.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_transport::FakeClock;
    use pretty_assertions::assert_eq;

    fn queue() -> (WorkerQueue, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new());
        (WorkerQueue::new(clock.clone()), clock)
    }

    #[test]
    fn append_then_dequeue_is_fifo() {
        let (mut q, _clock) = queue();
        q.append("@W1");
        q.append("@W2");
        assert_eq!(q.len(), 2);
        assert_eq!(q.dequeue(), Some("@W1".to_string()));
        assert_eq!(q.dequeue(), Some("@W2".to_string()));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn duplicate_append_is_rejected() {
        let (mut q, _clock) = queue();
        q.append("@W1");
        q.append("@W1");
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn delete_is_noop_if_absent() {
        let (mut q, _clock) = queue();
        q.delete("@missing");
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn refresh_updates_expiry_of_present_worker() {
        let (mut q, clock) = queue();
        q.append("@W1");
        clock.advance(500);
        q.refresh("@W1");
        // expiry should be now (500) + LIVENESS*INTERVAL
        assert_eq!(q.workers[0].expiry, 500 + LIVENESS * INTERVAL_MS);
    }

    #[test]
    fn refresh_does_not_insert_absent_worker() {
        let (mut q, _clock) = queue();
        q.refresh("@never-readied");
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let (mut q, clock) = queue();
        q.append("@W1"); // expiry = 0 + 3000 = 3000
        clock.advance(3001);
        q.append("@W2"); // expiry = 3001 + 3000 = 6001
        q.purge();
        assert_eq!(q.len(), 1);
        assert!(q.contains("@W2"));
        assert!(!q.contains("@W1"));
    }

    #[test]
    fn heartbeat_expiry_is_exactly_three_intervals_out() {
        let (mut q, clock) = queue();
        clock.set(10_000);
        q.append("@W1");
        assert_eq!(q.workers[0].expiry, 10_000 + 3000);
    }

    #[test]
    fn identities_iterates_in_fifo_order() {
        let (mut q, _clock) = queue();
        q.append("@W1");
        q.append("@W2");
        let ids: Vec<&str> = q.identities().collect();
        assert_eq!(ids, vec!["@W1", "@W2"]);
    }
}
