//! Bundled node-introspection handlers, registered regardless of what
//! application-specific handlers a consuming binary attaches.

use crate::handler::{HandlerTable, Reply};

pub const NODE_PING: &str = "node.ping";
pub const NODE_VERSION: &str = "node.version";

/// Register the always-available handlers into `table`.
pub fn register_bundled(table: &mut HandlerTable) {
    table.register(NODE_PING, |req, sender| {
        sender.send(Reply::new(NODE_PING, req.payload));
    });
    table.register(NODE_VERSION, |_req, sender| {
        sender.send(Reply::new(
            NODE_VERSION,
            bytes::Bytes::from_static(env!("CARGO_PKG_VERSION").as_bytes()),
        ));
    });
}
