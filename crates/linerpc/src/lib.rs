//! Line-delimited JSON messaging between a parent process and its child.
//!
//! linerpc connects two processes over a pair of byte streams (usually the
//! child's stdin/stdout) and lets either side invoke named handlers on the
//! other and await their result, or fire events at the other side's
//! listeners. Every message is one JSON object on one line.
//!
//! # Crate Structure
//!
//! - [`transport`]: Stream endpoints (child stdio, own stdio, in-memory pairs)
//! - [`frame`]: Message model, line codec, line reader and message writer
//! - [`schema`]: Optional JSON Schema validation of `args` (behind `schema` feature)
//! - [`peer`]: Invoke/handle and event dispatch (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use linerpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use linerpc_frame::*;
}

/// Re-export schema types (requires `schema` feature).
#[cfg(feature = "schema")]
pub mod schema {
    pub use linerpc_schema::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use linerpc_peer::*;
}
