//! The broker state machine: pure message-rewriting and queue-discipline
//! logic, decoupled from the actual socket I/O so it can be exercised
//! directly against the seed scenarios and quantified invariants.
//!
//! The main loop (in `src/bin/pp-broker.rs`) is the only caller that
//! touches real sockets; everything here operates on already-received
//! frame vectors and returns frame vectors to be sent, matching the
//! "single execution context, no locks" concurrency model.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use pp_proto::{encode_uuid, ControlCommand, ControlEnvelope, FrameError, RequestEnvelope};
use pp_transport::Clock;

use crate::worker_queue::{WorkerQueue, INTERVAL_MS};

/// Outcome of handling one backend-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    /// A control message was processed; nothing to forward.
    Control,
    /// A worker response was rewritten for delivery to the frontend.
    ForwardToFrontend(Vec<Bytes>),
    /// The message was malformed and was dropped.
    Dropped,
}

pub struct Broker {
    queue: WorkerQueue,
    clock: Arc<dyn Clock>,
    heartbeat_at: i64,
}

impl Broker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let heartbeat_at = clock.now_ms() + INTERVAL_MS;
        Self {
            queue: WorkerQueue::new(clock.clone()),
            clock,
            heartbeat_at,
        }
    }

    /// Admission control: the frontend is only worth polling when a
    /// worker could actually take the work.
    pub fn should_poll_frontend(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.queue.len()
    }

    /// Handle one message received on the backend socket. `frames[0]`
    /// must already be the worker's *binary* identity as delivered by
    /// the transport (ROUTER's auto-prepended connection id, for a
    /// socket that connects rather than binds, or the raw identity
    /// frame for one that binds).
    pub fn handle_backend(&mut self, frames: &[Bytes]) -> BackendOutcome {
        match frames.len() {
            2 => {
                let identity = match encode_uuid(&frames[0]) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(error = %e, "malformed worker identity on backend");
                        return BackendOutcome::Dropped;
                    }
                };
                match ControlEnvelope::from_frames(frames) {
                    Ok(env) => {
                        match env.command {
                            ControlCommand::Ready => {
                                self.queue.delete(&identity);
                                self.queue.append(&identity);
                                info!(identity = %identity, "worker ready");
                            }
                            ControlCommand::Heartbeat => {
                                self.queue.refresh(&identity);
                            }
                        }
                        BackendOutcome::Control
                    }
                    Err(FrameError::UnknownCommand(cmd)) => {
                        warn!(identity = %identity, command = ?String::from_utf8_lossy(&cmd), "invalid control command");
                        BackendOutcome::Dropped
                    }
                    Err(e) => {
                        warn!(error = %e, "malformed backend control message");
                        BackendOutcome::Dropped
                    }
                }
            }
            6 => {
                let identity = match encode_uuid(&frames[0]) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(error = %e, "malformed worker identity on backend response");
                        return BackendOutcome::Dropped;
                    }
                };
                let env = match RequestEnvelope::from_backend_frames(frames) {
                    Ok(env) => env,
                    Err(e) => {
                        warn!(error = %e, "malformed backend response");
                        return BackendOutcome::Dropped;
                    }
                };
                // passback_response: swap worker/client back for the
                // frontend and return the worker to the pool. A
                // round-robin-dequeued worker re-enters at the tail; a
                // directed-routed worker never left the queue, so this
                // is a refresh, not an insert - `append` alone would log
                // a spurious "duplicate" warning on every directed
                // round-trip.
                let out = env.to_frames_swapped();
                if self.queue.contains(&identity) {
                    self.queue.refresh(&identity);
                } else {
                    self.queue.append(&identity);
                }
                BackendOutcome::ForwardToFrontend(out)
            }
            n => {
                warn!(frame_count = n, "wrong sized message on backend");
                BackendOutcome::Dropped
            }
        }
    }

    /// Handle one message received on the frontend socket. Returns the
    /// frames to forward on the backend, or `None` if the message was
    /// dropped. Callers must only invoke this when
    /// `should_poll_frontend()` held at poll time.
    pub fn handle_frontend(&mut self, frames: &[Bytes]) -> Option<Vec<Bytes>> {
        let env = match RequestEnvelope::from_frontend_frames(frames) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "malformed frontend message");
                return None;
            }
        };

        let worker_binary: Bytes = if env.second.is_empty() {
            let identity = self.queue.dequeue().expect(
                "handle_frontend called only when should_poll_frontend() held at poll time",
            );
            // identity is readable form; decode back to wire bytes.
            let binary = pp_proto::decode_uuid(&identity).expect("queue holds only valid ids");
            Bytes::from(binary)
        } else {
            // Client-directed routing: trusted as-is, no membership
            // check. See design notes - this is intentionally preserved
            // "best effort" behavior from the source, not a gap to fix.
            env.second.clone()
        };

        Some(vec![
            worker_binary,
            env.first.clone(),
            env.f2.clone(),
            env.f3.clone(),
            env.f4.clone(),
            env.f5.clone(),
        ])
    }

    /// Called after every poll return: emits due heartbeats and purges
    /// expired workers. Returns the heartbeat frame sets to send, one
    /// per currently-queued worker, if a heartbeat was due this tick.
    pub fn tick(&mut self) -> Option<Vec<Vec<Bytes>>> {
        let now = self.clock.now_ms();
        let heartbeats = if now >= self.heartbeat_at {
            let frames = self
                .queue
                .identities()
                .map(|identity| {
                    let binary = pp_proto::decode_uuid(identity).expect("queue holds only valid ids");
                    pp_proto::heartbeat_frames(&binary)
                })
                .collect();
            self.heartbeat_at = now + INTERVAL_MS;
            Some(frames)
        } else {
            None
        };
        self.queue.purge();
        heartbeats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_transport::FakeClock;
    use pretty_assertions::assert_eq;

    fn binary_id() -> Vec<u8> {
        pp_proto::new_binary_identity()
    }

    fn ready_frames(worker: &[u8]) -> Vec<Bytes> {
        vec![
            Bytes::copy_from_slice(worker),
            Bytes::from_static(b"READY"),
        ]
    }

    fn broker_with_clock() -> (Broker, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new());
        (Broker::new(clock.clone()), clock)
    }

    #[test]
    fn cold_start_single_worker_round_trip() {
        let (mut broker, _clock) = broker_with_clock();
        let worker = binary_id();
        let client = binary_id();

        assert_eq!(broker.handle_backend(&ready_frames(&worker)), BackendOutcome::Control);
        assert!(broker.should_poll_frontend());

        let request = vec![
            Bytes::copy_from_slice(&client),
            Bytes::new(),
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
            Bytes::from_static(b"d"),
        ];
        let forwarded = broker.handle_frontend(&request).unwrap();
        assert_eq!(forwarded[0].as_ref(), worker.as_slice());
        assert_eq!(forwarded[1].as_ref(), client.as_slice());
        assert_eq!(&forwarded[2..], &request[2..]);

        // Queue is now empty: worker was dequeued for dispatch.
        assert!(!broker.should_poll_frontend());

        let response = vec![
            Bytes::copy_from_slice(&worker),
            Bytes::copy_from_slice(&client),
            Bytes::from_static(b"r1"),
            Bytes::from_static(b"r2"),
            Bytes::from_static(b"r3"),
            Bytes::from_static(b"r4"),
        ];
        match broker.handle_backend(&response) {
            BackendOutcome::ForwardToFrontend(out) => {
                assert_eq!(out[0].as_ref(), client.as_slice());
                assert_eq!(out[1].as_ref(), worker.as_slice());
                assert_eq!(&out[2..], &response[2..]);
            }
            other => panic!("expected ForwardToFrontend, got {other:?}"),
        }
        // Worker is back in the pool.
        assert!(broker.should_poll_frontend());
        assert_eq!(broker.worker_count(), 1);
    }

    #[test]
    fn round_robin_across_two_workers() {
        let (mut broker, _clock) = broker_with_clock();
        let w1 = binary_id();
        let w2 = binary_id();
        broker.handle_backend(&ready_frames(&w1));
        broker.handle_backend(&ready_frames(&w2));

        let req = |client: &[u8]| {
            vec![
                Bytes::copy_from_slice(client),
                Bytes::new(),
                Bytes::from_static(b"a"),
                Bytes::from_static(b"b"),
                Bytes::from_static(b"c"),
                Bytes::from_static(b"d"),
            ]
        };

        let c1 = binary_id();
        let c2 = binary_id();
        let first = broker.handle_frontend(&req(&c1)).unwrap();
        let second = broker.handle_frontend(&req(&c2)).unwrap();

        assert_eq!(first[0].as_ref(), w1.as_slice());
        assert_eq!(second[0].as_ref(), w2.as_slice());
    }

    #[test]
    fn directed_routing_does_not_touch_queue_order() {
        let (mut broker, _clock) = broker_with_clock();
        let w1 = binary_id();
        let w2 = binary_id();
        broker.handle_backend(&ready_frames(&w1));
        broker.handle_backend(&ready_frames(&w2));

        let client = binary_id();
        let directed = vec![
            Bytes::copy_from_slice(&client),
            Bytes::copy_from_slice(&w2),
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
            Bytes::from_static(b"d"),
        ];
        let forwarded = broker.handle_frontend(&directed).unwrap();
        assert_eq!(forwarded[0].as_ref(), w2.as_slice());
        // Queue untouched: both workers still present, W1 still head.
        assert_eq!(broker.worker_count(), 2);
    }

    #[test]
    fn directed_routing_response_refreshes_rather_than_duplicates() {
        let (mut broker, _clock) = broker_with_clock();
        let w1 = binary_id();
        let w2 = binary_id();
        broker.handle_backend(&ready_frames(&w1));
        broker.handle_backend(&ready_frames(&w2));

        let client = binary_id();
        let directed = vec![
            Bytes::copy_from_slice(&client),
            Bytes::copy_from_slice(&w2),
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
            Bytes::from_static(b"d"),
        ];
        broker.handle_frontend(&directed).unwrap();
        assert_eq!(broker.worker_count(), 2);

        let response = vec![
            Bytes::copy_from_slice(&w2),
            Bytes::copy_from_slice(&client),
            Bytes::from_static(b"r1"),
            Bytes::from_static(b"r2"),
            Bytes::from_static(b"r3"),
            Bytes::from_static(b"r4"),
        ];
        broker.handle_backend(&response);
        // Still exactly two workers - no duplicate entry was created.
        assert_eq!(broker.worker_count(), 2);
    }

    #[test]
    fn directed_routing_to_unknown_worker_is_not_validated() {
        // Open question #3: directed routing is best-effort, no membership check.
        let (mut broker, _clock) = broker_with_clock();
        let w1 = binary_id();
        broker.handle_backend(&ready_frames(&w1));

        let client = binary_id();
        let phantom_worker = binary_id();
        let directed = vec![
            Bytes::copy_from_slice(&client),
            Bytes::copy_from_slice(&phantom_worker),
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
            Bytes::from_static(b"d"),
        ];
        let forwarded = broker.handle_frontend(&directed).unwrap();
        assert_eq!(forwarded[0].as_ref(), phantom_worker.as_slice());
        // W1 untouched in the queue.
        assert_eq!(broker.worker_count(), 1);
    }

    #[test]
    fn heartbeat_liveness_expiry_empties_queue() {
        let (mut broker, clock) = broker_with_clock();
        let worker = binary_id();
        broker.handle_backend(&ready_frames(&worker));
        assert!(broker.should_poll_frontend());

        clock.advance(3001);
        broker.tick();
        assert!(!broker.should_poll_frontend());
    }

    #[test]
    fn heartbeat_emission_is_due_every_interval() {
        let (mut broker, clock) = broker_with_clock();
        let worker = binary_id();
        broker.handle_backend(&ready_frames(&worker));

        // Not due yet.
        assert!(broker.tick().is_none());

        clock.advance(1000);
        let heartbeats = broker.tick().expect("heartbeat due after one interval");
        assert_eq!(heartbeats.len(), 1);
        assert_eq!(heartbeats[0][0].as_ref(), worker.as_slice());
        assert_eq!(heartbeats[0][1].as_ref(), b"HEARTBEAT");
    }

    #[test]
    fn malformed_frontend_message_is_dropped_without_side_effects() {
        let (mut broker, _clock) = broker_with_clock();
        let worker = binary_id();
        broker.handle_backend(&ready_frames(&worker));

        let malformed = vec![
            binary_id(),
            Bytes::new(),
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
        ];
        assert_eq!(malformed.len(), 5);
        assert!(broker.handle_frontend(&malformed).is_none());
        assert_eq!(broker.worker_count(), 1);
    }

    #[test]
    fn heartbeat_from_unknown_worker_is_dropped_without_inserting() {
        let (mut broker, _clock) = broker_with_clock();
        let worker = binary_id();
        let frames = vec![
            Bytes::copy_from_slice(&worker),
            Bytes::from_static(b"HEARTBEAT"),
        ];
        assert_eq!(broker.handle_backend(&frames), BackendOutcome::Control);
        assert_eq!(broker.worker_count(), 0);
    }

    #[test]
    fn duplicate_ready_resets_position() {
        let (mut broker, _clock) = broker_with_clock();
        let worker = binary_id();
        broker.handle_backend(&ready_frames(&worker));
        broker.handle_backend(&ready_frames(&worker));
        assert_eq!(broker.worker_count(), 1);
    }

    #[test]
    fn invalid_backend_frame_count_is_dropped() {
        let (mut broker, _clock) = broker_with_clock();
        let bogus = vec![Bytes::from_static(b"only one frame")];
        assert_eq!(broker.handle_backend(&bogus), BackendOutcome::Dropped);
    }
}
