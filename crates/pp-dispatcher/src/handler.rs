//! The dispatcher's handler table and the request/reply types handlers
//! see. A handler is a single opaque capability keyed by a dotted
//! command string (`class.method`); capability naming conventions
//! (`blockchain.*`, `address.*`, ...) are just string content to this
//! layer.

use std::collections::HashMap;
use std::sync::mpsc;

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

/// One inbound request, already stripped of routing frames. `routing_token`
/// is the broker's connection identity as handed back by the worker's
/// connected ROUTER socket on receive - opaque, kept only to address the
/// reply back through the same peer, never interpreted.
#[derive(Debug, Clone)]
pub struct Request {
    pub routing_token: Vec<u8>,
    pub client_id: Vec<u8>,
    pub request_id: Uuid,
    pub command: String,
    pub traceparent: Option<String>,
    pub payload: Bytes,
}

/// A handler's outgoing message. `request_id` and routing are filled in
/// by the `Sender` that produced this from the originating `Request`;
/// handlers only choose the command tag, optional traceparent, and payload.
#[derive(Debug, Clone)]
pub struct Reply {
    pub command: String,
    pub traceparent: Option<String>,
    pub payload: Bytes,
}

impl Reply {
    pub fn new(command: impl Into<String>, payload: Bytes) -> Self {
        Self {
            command: command.into(),
            traceparent: None,
            payload,
        }
    }
}

/// One frame set ready to hand to the socket: `[routing_token, client_id,
/// request_id, command, traceparent, payload]`.
pub type OutboundFrames = Vec<Vec<u8>>;

/// Callable a handler uses to transmit a reply. Cheap to clone and safe
/// to stash past the handler call returning - replies are pushed onto a
/// channel drained by the dispatcher's own poll loop, so a handler may
/// send zero, one, or many times (the "subscription" case) without ever
/// touching the socket itself.
#[derive(Clone)]
pub struct Sender {
    routing_token: Vec<u8>,
    client_id: Vec<u8>,
    request_id: Uuid,
    tx: mpsc::Sender<OutboundFrames>,
}

impl Sender {
    pub(crate) fn new(request: &Request, tx: mpsc::Sender<OutboundFrames>) -> Self {
        Self {
            routing_token: request.routing_token.clone(),
            client_id: request.client_id.clone(),
            request_id: request.request_id,
            tx,
        }
    }

    pub fn send(&self, reply: Reply) {
        let frames = build_reply_frames(
            &self.routing_token,
            &self.client_id,
            self.request_id,
            &reply.command,
            reply.traceparent.as_deref(),
            &reply.payload,
        );
        if self.tx.send(frames).is_err() {
            warn!("dispatcher outbound channel closed, dropping reply");
        }
    }
}

pub(crate) fn build_reply_frames(
    routing_token: &[u8],
    client_id: &[u8],
    request_id: Uuid,
    command: &str,
    traceparent: Option<&str>,
    payload: &Bytes,
) -> OutboundFrames {
    vec![
        routing_token.to_vec(),
        client_id.to_vec(),
        request_id.as_bytes().to_vec(),
        command.as_bytes().to_vec(),
        traceparent.map(str::as_bytes).unwrap_or(&[]).to_vec(),
        payload.to_vec(),
    ]
}

type Handler = Box<dyn Fn(Request, Sender) + Send + Sync>;

/// Maps command names to handlers. Fixed once the dispatcher starts
/// polling: registration only happens during setup.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handler under `command`. Last write wins, matching the
    /// wire contract's case-sensitive exact-string match.
    pub fn register<F>(&mut self, command: impl Into<String>, handler: F)
    where
        F: Fn(Request, Sender) + Send + Sync + 'static,
    {
        self.handlers.insert(command.into(), Box::new(handler));
    }

    pub fn get(&self, command: &str) -> Option<&Handler> {
        self.handlers.get(command)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
