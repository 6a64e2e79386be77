//! Query dispatcher: a router-style socket connected to the broker's
//! backend endpoint, paired with a handler table keyed on dotted
//! command strings.

pub mod dispatcher;
pub mod handler;
pub mod handlers;

pub use dispatcher::{QueryDispatcher, BAD_STREAM, NOT_FOUND};
pub use handler::{HandlerTable, Reply, Request, Sender};
pub use handlers::register_bundled;
