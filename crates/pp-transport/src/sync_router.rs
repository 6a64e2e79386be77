//! Sync ROUTER socket helpers for the query dispatcher.
//!
//! The dispatcher connects a ROUTER socket to the broker's backend
//! endpoint rather than a DEALER: a DEALER silently prepends an empty
//! delimiter frame that the six-frame request/response contract has no
//! room for, and ROUTER gives us the broker's connection identity as
//! frame 0 on receive for free (ZMQ drops messages for peers that have
//! gone away or hit the high-water mark, same as the broker's sockets).
//!
//! A ROUTER that *connects* (rather than binds) can't address its lone
//! peer until it has received at least one message from it - there is
//! no "the" peer identity to route outbound frames to otherwise. We
//! sidestep that by pre-arming `ZMQ_CONNECT_RID` with a fixed sentinel
//! before connecting, so the worker can address the broker from the
//! very first send, and by setting our own `ZMQ_IDENTITY` so the
//! broker's backend socket sees the worker's chosen identity as frame 0
//! without needing a prior handshake either.

use anyhow::{Context, Result};

/// Sentinel routing id the worker addresses the broker by on its own
/// connect-mode ROUTER socket. Never appears on the wire or in logs;
/// it only selects a local routing-table entry.
pub const BROKER_RID: &[u8] = b"broker";

/// Create a configured ROUTER socket, identify it as `identity`, and
/// connect it to `endpoint`.
pub fn connect_router(ctx: &zmq::Context, endpoint: &str, identity: &[u8]) -> Result<zmq::Socket> {
    let socket = ctx
        .socket(zmq::ROUTER)
        .context("failed to create ROUTER socket")?;
    socket.set_linger(0).context("failed to set LINGER")?;
    socket
        .set_reconnect_ivl(1000)
        .context("failed to set RECONNECT_IVL")?;
    socket
        .set_reconnect_ivl_max(60_000)
        .context("failed to set RECONNECT_IVL_MAX")?;
    socket
        .set_identity(identity)
        .context("failed to set ROUTER identity")?;
    socket
        .set_connect_rid(BROKER_RID)
        .context("failed to set CONNECT_RID")?;
    socket
        .connect(endpoint)
        .with_context(|| format!("failed to connect ROUTER to {endpoint}"))?;
    Ok(socket)
}

/// Receive one multipart message, blocking until one is available or
/// `timeout_ms` elapses (negative means block forever, matching the
/// `zmq::poll` convention this mirrors).
pub fn poll_recv(
    socket: &zmq::Socket,
    timeout_ms: i64,
) -> Result<Option<Vec<Vec<u8>>>> {
    let mut items = [socket.as_poll_item(zmq::POLLIN)];
    let rc = zmq::poll(&mut items, timeout_ms).context("zmq::poll failed")?;
    if rc == 0 || !items[0].is_readable() {
        return Ok(None);
    }
    let msg = socket
        .recv_multipart(0)
        .context("failed to receive multipart message")?;
    Ok(Some(msg))
}
