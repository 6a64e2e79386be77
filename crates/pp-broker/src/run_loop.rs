//! The broker's event loop, factored out of the `pp-broker` binary so it
//! can be driven against real (if `inproc://`) sockets from integration
//! tests as well as from `main`.
//!
//! Ownership and locking match the concurrency model: `frontend`/`backend`
//! are each split into a `tx`/`rx` half behind a `Mutex` purely to satisfy
//! `Send` bounds for `tokio::select!`, not for cross-task sharing - this
//! loop is the only task that ever touches either mutex.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tracing::error;

use pp_transport::async_router::{frames_to_multipart, multipart_to_frames, SplitRouter};
use pp_transport::Clock;

use crate::broker::BackendOutcome;
use crate::worker_queue::INTERVAL_MS;
use crate::Broker;

/// Run the broker loop until either router socket's stream ends.
///
/// Polls backend unconditionally and frontend only while
/// `broker.should_poll_frontend()` holds, ticks heartbeats/purge on a
/// fixed `INTERVAL_MS` timer, exactly per the main-loop steps in the
/// broker's operation contract.
pub async fn run(frontend: SplitRouter, backend: SplitRouter, clock: Arc<dyn Clock>) -> Result<()> {
    let mut broker = Broker::new(clock);
    let mut heartbeat_timer =
        tokio::time::interval(std::time::Duration::from_millis(INTERVAL_MS as u64));

    let mut frontend_rx = frontend.rx.lock().await;
    let mut backend_rx = backend.rx.lock().await;

    loop {
        let poll_frontend = broker.should_poll_frontend();
        tokio::select! {
            biased;

            backend_msg = backend_rx.next() => {
                let Some(msg) = backend_msg else {
                    error!("backend socket closed");
                    return Ok(());
                };
                let frames = multipart_to_frames(msg.context("backend recv error")?);
                if let BackendOutcome::ForwardToFrontend(out) = broker.handle_backend(&frames) {
                    let mut tx = frontend.tx.lock().await;
                    if let Err(e) = tx.send(frames_to_multipart(out)).await {
                        error!(error = %e, "failed to forward response to frontend");
                    }
                }
            }

            frontend_msg = frontend_rx.next(), if poll_frontend => {
                let Some(msg) = frontend_msg else {
                    error!("frontend socket closed");
                    return Ok(());
                };
                let frames = multipart_to_frames(msg.context("frontend recv error")?);
                if let Some(out) = broker.handle_frontend(&frames) {
                    let mut tx = backend.tx.lock().await;
                    if let Err(e) = tx.send(frames_to_multipart(out)).await {
                        error!(error = %e, "failed to forward request to backend");
                    }
                }
            }

            _ = heartbeat_timer.tick() => {
                if let Some(heartbeats) = broker.tick() {
                    let mut tx = backend.tx.lock().await;
                    for frames in heartbeats {
                        if let Err(e) = tx.send(frames_to_multipart(frames)).await {
                            error!(error = %e, "failed to send heartbeat");
                        }
                    }
                }
            }
        }
    }
}
