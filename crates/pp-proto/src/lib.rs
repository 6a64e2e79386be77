//! Wire types shared by the broker and the query dispatcher: peer
//! identities and the frame envelopes that travel over the frontend and
//! backend router sockets.

pub mod frame;
pub mod identity;

pub use frame::{
    heartbeat_frames, ApplicationFrameError, ApplicationRequest, ControlCommand, ControlEnvelope,
    FrameError, RequestEnvelope,
};
pub use identity::{decode_uuid, encode_uuid, new_binary_identity, IdentityError};
