//! Bidirectional invoke/handle and event dispatch over a line stream.
//!
//! This is the "just works" layer. Wrap any pair of byte streams in a
//! [`Peer`], register handlers and listeners on named channels, and invoke
//! or notify the other side. Both sides run the same code: each can serve
//! handlers and invoke the peer's handlers at the same time.

pub mod config;
pub mod connector;
pub mod correlator;
mod dispatcher;
pub mod error;
pub mod id;
pub mod peer;
pub mod registry;

pub use config::{
    PeerConfig, DEFAULT_INVOKE_TIMEOUT, DEFAULT_OUTBOUND_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use connector::{serve_stdio, spawn_child, spawn_command};
pub use correlator::{Correlator, PendingInvocation};
pub use error::{PeerError, Result};
pub use id::new_message_id;
pub use peer::{Peer, PeerBuilder};
pub use registry::{
    ChannelRegistry, Handler, HandlerError, HandlerFuture, HandlerResult, Listener,
};

#[cfg(feature = "schema")]
pub use linerpc_schema::SchemaRegistry;
