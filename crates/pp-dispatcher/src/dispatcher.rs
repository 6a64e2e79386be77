//! The dispatcher's poll loop: receive one request, validate, route to
//! a handler, drain whatever replies it produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use pp_proto::{ApplicationRequest, ControlCommand};
use pp_transport::sync_router::{poll_recv, BROKER_RID};
use pp_transport::Clock;

use crate::handler::{build_reply_frames, HandlerTable, Request, Sender};

/// How long to block on each poll iteration before checking the stop
/// flag again. The dispatcher never busy-spins.
const POLL_TIMEOUT_MS: i64 = 250;

/// Heartbeat cadence, matching the broker's `INTERVAL`.
const HEARTBEAT_INTERVAL_MS: i64 = 1000;

pub const BAD_STREAM: &str = "bad_stream";
pub const NOT_FOUND: &str = "not_found";

pub struct QueryDispatcher {
    handlers: HandlerTable,
    socket: zmq::Socket,
    clock: Arc<dyn Clock>,
    next_heartbeat_at: i64,
    outbound_tx: mpsc::Sender<crate::handler::OutboundFrames>,
    outbound_rx: mpsc::Receiver<crate::handler::OutboundFrames>,
}

impl QueryDispatcher {
    /// `socket` must already be connected and identified (see
    /// [`pp_transport::sync_router::connect_router`]); this constructor
    /// immediately announces `READY` on it before returning, so the
    /// first `poll_once` call happens against a broker that already
    /// knows about this worker.
    pub fn new(handlers: HandlerTable, socket: zmq::Socket, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let (outbound_tx, outbound_rx) = mpsc::channel();
        let mut dispatcher = Self {
            handlers,
            socket,
            next_heartbeat_at: clock.now_ms() + HEARTBEAT_INTERVAL_MS,
            clock,
            outbound_tx,
            outbound_rx,
        };
        dispatcher.send_control(ControlCommand::Ready)?;
        Ok(dispatcher)
    }

    /// Run until `stop` is observed set. Checked once per poll timeout,
    /// so shutdown latency is bounded by `POLL_TIMEOUT_MS`.
    pub fn run(&mut self, stop: &AtomicBool) -> anyhow::Result<()> {
        while !stop.load(Ordering::Relaxed) {
            self.poll_once()?;
        }
        Ok(())
    }

    /// One iteration: poll, and if a message arrived, handle it and
    /// flush any replies the handler produced. Sends a `HEARTBEAT` if
    /// one is due, regardless of whether a message arrived this round -
    /// liveness must keep flowing even on an idle worker. Exposed
    /// separately from `run` so tests can drive it deterministically.
    pub fn poll_once(&mut self) -> anyhow::Result<()> {
        let Some(frames) = poll_recv(&self.socket, POLL_TIMEOUT_MS)? else {
            self.maybe_send_heartbeat()?;
            return Ok(());
        };
        self.handle_message(frames);
        self.flush_outbound()?;
        self.maybe_send_heartbeat()?;
        Ok(())
    }

    fn maybe_send_heartbeat(&mut self) -> anyhow::Result<()> {
        if self.clock.now_ms() >= self.next_heartbeat_at {
            self.send_control(ControlCommand::Heartbeat)?;
            self.next_heartbeat_at = self.clock.now_ms() + HEARTBEAT_INTERVAL_MS;
        }
        Ok(())
    }

    /// Send a control frame (`READY`/`HEARTBEAT`) to the broker on the
    /// same socket the dispatcher polls - the broker is addressed via
    /// the `CONNECT_RID` sentinel set up at connect time, not by any
    /// identity of ours (that's ZMQ_IDENTITY's job, on the receive side).
    fn send_control(&self, command: ControlCommand) -> anyhow::Result<()> {
        self.socket
            .send_multipart([BROKER_RID, command.as_str().as_bytes()], 0)
            .map_err(anyhow::Error::from)
    }

    fn handle_message(&mut self, frames: Vec<Vec<u8>>) {
        // [routing_token, client_id, f2, f3, f4, f5]
        if frames.len() != 6 {
            warn!(frame_count = frames.len(), "wrong sized message at dispatcher");
            return;
        }
        let routing_token = frames[0].clone();
        let client_id = frames[1].clone();
        let f2 = Bytes::copy_from_slice(&frames[2]);
        let f3 = Bytes::copy_from_slice(&frames[3]);
        let f4 = Bytes::copy_from_slice(&frames[4]);
        let f5 = Bytes::copy_from_slice(&frames[5]);

        let app = match ApplicationRequest::from_opaque_frames(&f2, &f3, &f4, &f5) {
            Ok(app) => app,
            Err(e) => {
                warn!(error = %e, "malformed request at dispatcher");
                let reply = build_reply_frames(
                    &routing_token,
                    &client_id,
                    Uuid::nil(),
                    BAD_STREAM,
                    None,
                    &Bytes::new(),
                );
                let _ = self.outbound_tx.send(reply);
                return;
            }
        };

        let request = Request {
            routing_token,
            client_id,
            request_id: app.request_id,
            command: app.command,
            traceparent: app.traceparent,
            payload: app.payload,
        };

        match self.handlers.get(&request.command) {
            Some(handler) => {
                debug!(command = %request.command, request_id = %request.request_id, "dispatching");
                let sender = Sender::new(&request, self.outbound_tx.clone());
                handler(request, sender);
            }
            None => {
                warn!(command = %request.command, "no handler registered");
                let reply = build_reply_frames(
                    &request.routing_token,
                    &request.client_id,
                    request.request_id,
                    NOT_FOUND,
                    request.traceparent.as_deref(),
                    &Bytes::from(request.command.clone()),
                );
                let _ = self.outbound_tx.send(reply);
            }
        }
    }

    fn flush_outbound(&self) -> anyhow::Result<()> {
        for frames in self.outbound_rx.try_iter() {
            self.socket.send_multipart(frames, 0)?;
        }
        Ok(())
    }
}
