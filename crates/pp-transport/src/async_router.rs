//! Async ROUTER socket configuration for the broker.
//!
//! The broker owns two ROUTER sockets (frontend, backend) for its
//! entire lifetime and polls both from a single task, so the sockets
//! are wrapped as split sink/stream halves behind a `Mutex` purely to
//! satisfy `Send` bounds on the halves, not for cross-task sharing -
//! see the concurrency notes on the broker itself.
//!
//! tmq doesn't expose a concrete socket type, so callers that need to
//! store a bound socket use the `RouterSocket` trait bound below rather
//! than naming tmq's internal type.

use std::pin::Pin;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use futures::Sink;
use tmq::{router, Message, TmqError};
use tokio::sync::Mutex;

pub use tmq::Context as ZmqContext;
pub use tmq::Multipart;

/// Convert a received `Multipart` into owned frame buffers for the
/// broker's socket-agnostic message handling.
pub fn multipart_to_frames(mp: Multipart) -> Vec<Bytes> {
    mp.into_iter().map(|m| Bytes::copy_from_slice(&m)).collect()
}

/// Convert outbound frame buffers into a `Multipart` ready to send.
pub fn frames_to_multipart(frames: Vec<Bytes>) -> Multipart {
    frames
        .into_iter()
        .map(|b| Message::from(b.as_ref()))
        .collect::<Vec<Message>>()
        .into()
}

/// Reconnect interval for the frontend/backend sockets. Mostly academic
/// for a bound ROUTER (it never initiates outbound connections), kept
/// for parity with the connecting sockets on the worker side.
pub const DEFAULT_RECONNECT_IVL_MS: i32 = 1000;
pub const DEFAULT_RECONNECT_IVL_MAX_MS: i32 = 60_000;

/// Trait bound for ROUTER sockets (send and receive with identities).
pub trait RouterSocket:
    Stream<Item = Result<Multipart, TmqError>> + Sink<Multipart, Error = TmqError> + Unpin + Send
{
}
impl<T> RouterSocket for T where
    T: Stream<Item = Result<Multipart, TmqError>> + Sink<Multipart, Error = TmqError> + Unpin + Send
{
}

type BoxedSink = Pin<Box<dyn Sink<Multipart, Error = TmqError> + Send>>;
type BoxedStream = Pin<Box<dyn Stream<Item = Result<Multipart, TmqError>> + Send>>;

/// A bound ROUTER socket, split into independently-lockable tx/rx halves.
pub struct SplitRouter {
    pub tx: Mutex<BoxedSink>,
    pub rx: Mutex<BoxedStream>,
}

fn split_router<S>(socket: S) -> SplitRouter
where
    S: Stream<Item = Result<Multipart, TmqError>>
        + Sink<Multipart, Error = TmqError>
        + Unpin
        + Send
        + 'static,
{
    let (tx, rx) = socket.split();
    SplitRouter {
        tx: Mutex::new(Box::pin(tx)),
        rx: Mutex::new(Box::pin(rx)),
    }
}

/// Create a configured ROUTER socket bound to `endpoint`.
///
/// Applies `LINGER=0` (don't block on close) and bounded reconnect
/// intervals, matching the configuration convention used across this
/// codebase's other ZMQ sockets.
pub fn bind_router(ctx: &ZmqContext, endpoint: &str, name: &str) -> Result<SplitRouter> {
    let socket = router(ctx)
        .set_linger(0)
        .set_reconnect_ivl(DEFAULT_RECONNECT_IVL_MS)
        .set_reconnect_ivl_max(DEFAULT_RECONNECT_IVL_MAX_MS)
        .bind(endpoint)
        .with_context(|| format!("failed to bind {name} ROUTER to {endpoint}"))?;
    Ok(split_router(socket))
}
