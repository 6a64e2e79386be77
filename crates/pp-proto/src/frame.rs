//! Frame-level envelope types carried over the frontend/backend router
//! sockets, and the application sub-framing layered on top of the four
//! opaque frames the broker itself never inspects.
//!
//! ## Wire shapes
//!
//! Frontend-facing request (6 frames):
//! `[client_id, worker_id_or_empty, f2, f3, f4, f5]`
//!
//! Backend-facing request (6 frames, frames 0/1 swapped):
//! `[worker_id, client_id, f2, f3, f4, f5]`
//!
//! Backend-facing control (2 frames):
//! `[worker_id, command]` where command is ASCII `READY` or `HEARTBEAT`.
//!
//! `f2..f5` are opaque to the broker. The Query Dispatcher further
//! structures them as request id / command / traceparent / payload.

use bytes::Bytes;
use uuid::Uuid;

/// A worker's control message to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Ready,
    Heartbeat,
}

impl ControlCommand {
    pub const READY: &'static str = "READY";
    pub const HEARTBEAT: &'static str = "HEARTBEAT";

    pub fn as_str(self) -> &'static str {
        match self {
            ControlCommand::Ready => Self::READY,
            ControlCommand::Heartbeat => Self::HEARTBEAT,
        }
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"READY" => Some(ControlCommand::Ready),
            b"HEARTBEAT" => Some(ControlCommand::Heartbeat),
            _ => None,
        }
    }
}

/// Errors raised while validating frames arriving on either router socket.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("expected {expected} frames, got {actual}")]
    WrongFrameCount { expected: &'static str, actual: usize },
    #[error("identity frame malformed: {0}")]
    BadIdentity(String),
    #[error("unknown control command {0:?}")]
    UnknownCommand(Vec<u8>),
}

/// A six-frame request/response envelope as it travels over either
/// router socket. Which of `first`/`second` holds the client vs. the
/// worker identity depends on whether this was parsed from the frontend
/// or the backend side — callers swap the two fields when rewriting the
/// envelope for the other socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub first: Bytes,
    pub second: Bytes,
    pub f2: Bytes,
    pub f3: Bytes,
    pub f4: Bytes,
    pub f5: Bytes,
}

impl RequestEnvelope {
    /// Parse a frontend-facing message: exactly 6 frames, frame 0 a
    /// 17-byte identity, frame 1 a 17-byte identity or empty.
    pub fn from_frontend_frames(frames: &[Bytes]) -> Result<Self, FrameError> {
        if frames.len() != 6 {
            return Err(FrameError::WrongFrameCount {
                expected: "6",
                actual: frames.len(),
            });
        }
        if !crate::identity::is_valid_identity_frame(&frames[0]) {
            return Err(FrameError::BadIdentity("frame 0 (client) malformed".into()));
        }
        if !frames[1].is_empty() && !crate::identity::is_valid_identity_frame(&frames[1]) {
            return Err(FrameError::BadIdentity(
                "frame 1 (preferred worker) malformed".into(),
            ));
        }
        Ok(Self {
            first: frames[0].clone(),
            second: frames[1].clone(),
            f2: frames[2].clone(),
            f3: frames[3].clone(),
            f4: frames[4].clone(),
            f5: frames[5].clone(),
        })
    }

    /// Parse a backend-facing 6-frame worker response. Frame 0 is the
    /// worker identity (already stripped of ROUTER's auto-prepended
    /// connection id by the transport layer), frame 1 the client identity.
    pub fn from_backend_frames(frames: &[Bytes]) -> Result<Self, FrameError> {
        if frames.len() != 6 {
            return Err(FrameError::WrongFrameCount {
                expected: "6",
                actual: frames.len(),
            });
        }
        Ok(Self {
            first: frames[0].clone(),
            second: frames[1].clone(),
            f2: frames[2].clone(),
            f3: frames[3].clone(),
            f4: frames[4].clone(),
            f5: frames[5].clone(),
        })
    }

    /// Serialize back to 6 wire frames, swapping `first`/`second` -
    /// this is how the broker turns a frontend request into a backend
    /// request (and a backend response into a frontend response).
    pub fn to_frames_swapped(&self) -> Vec<Bytes> {
        vec![
            self.second.clone(),
            self.first.clone(),
            self.f2.clone(),
            self.f3.clone(),
            self.f4.clone(),
            self.f5.clone(),
        ]
    }

    /// Serialize without swapping (used when `first`/`second` are
    /// already in the right order for the destination socket).
    pub fn to_frames(&self) -> Vec<Bytes> {
        vec![
            self.first.clone(),
            self.second.clone(),
            self.f2.clone(),
            self.f3.clone(),
            self.f4.clone(),
            self.f5.clone(),
        ]
    }
}

/// A two-frame control message from worker to broker: `[worker_id, command]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEnvelope {
    pub worker_id: Bytes,
    pub command: ControlCommand,
}

impl ControlEnvelope {
    pub fn from_frames(frames: &[Bytes]) -> Result<Self, FrameError> {
        if frames.len() != 2 {
            return Err(FrameError::WrongFrameCount {
                expected: "2",
                actual: frames.len(),
            });
        }
        let command = ControlCommand::parse(&frames[1])
            .ok_or_else(|| FrameError::UnknownCommand(frames[1].to_vec()))?;
        Ok(Self {
            worker_id: frames[0].clone(),
            command,
        })
    }
}

/// Build a `[worker_id, "HEARTBEAT"]` frame pair sent from broker to worker.
pub fn heartbeat_frames(worker_id: &[u8]) -> Vec<Bytes> {
    vec![
        Bytes::copy_from_slice(worker_id),
        Bytes::from_static(ControlCommand::HEARTBEAT.as_bytes()),
    ]
}

/// Application-level sub-framing of `f2..f5`, the contract between
/// clients and the Query Dispatcher. The broker never constructs or
/// parses this type; it only ever sees the four frames as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRequest {
    pub request_id: Uuid,
    pub command: String,
    pub traceparent: Option<String>,
    pub payload: Bytes,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ApplicationFrameError {
    #[error("request id frame must be 16 bytes, got {0}")]
    BadRequestId(usize),
    #[error("command frame is not valid UTF-8")]
    BadCommandUtf8,
    #[error("traceparent frame is not valid UTF-8")]
    BadTraceparentUtf8,
}

impl ApplicationRequest {
    pub fn from_opaque_frames(
        f2: &Bytes,
        f3: &Bytes,
        f4: &Bytes,
        f5: &Bytes,
    ) -> Result<Self, ApplicationFrameError> {
        if f2.len() != 16 {
            return Err(ApplicationFrameError::BadRequestId(f2.len()));
        }
        let request_id = Uuid::from_slice(f2).expect("length checked above");
        let command =
            std::str::from_utf8(f3).map_err(|_| ApplicationFrameError::BadCommandUtf8)?;
        let traceparent = if f4.is_empty() {
            None
        } else {
            Some(
                std::str::from_utf8(f4)
                    .map_err(|_| ApplicationFrameError::BadTraceparentUtf8)?
                    .to_string(),
            )
        };
        Ok(Self {
            request_id,
            command: command.to_string(),
            traceparent,
            payload: f5.clone(),
        })
    }

    pub fn to_opaque_frames(&self) -> (Bytes, Bytes, Bytes, Bytes) {
        (
            Bytes::copy_from_slice(self.request_id.as_bytes()),
            Bytes::from(self.command.clone()),
            self.traceparent
                .as_ref()
                .map(|t| Bytes::from(t.clone()))
                .unwrap_or_else(Bytes::new),
            self.payload.clone(),
        )
    }
}
