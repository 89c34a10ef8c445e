//! Stream endpoints for linerpc.
//!
//! The protocol runs over any pair of unidirectional byte streams. This crate
//! provides the pairs the rest of the workspace uses:
//! - Piped stdin/stdout of a spawned child process (parent side)
//! - The current process's own stdin/stdout (child side)
//! - Connected in-memory pairs (tests, in-process peers)
//!
//! This is the lowest layer of linerpc. Everything else builds on top of
//! the [`StreamPair`] type provided here.

pub mod child;
pub mod error;
pub mod streams;

pub use child::{ChildProcess, ChildStreams, DEFAULT_TERMINATE_GRACE};
pub use error::{Result, TransportError};
pub use streams::{
    memory_pair, memory_pair_with_capacity, stdio, MemoryStreams, StdioStreams, StreamPair,
};
