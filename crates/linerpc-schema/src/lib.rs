//! Optional JSON Schema validation of channel arguments.
//!
//! Each channel may carry a JSON Schema that its `args` array must satisfy.
//! Violations are caught at the protocol boundary, before a handler or
//! listener ever sees the values.
//!
//! This crate is optional: enable the `schema` feature of `linerpc-peer`
//! to use it.

pub mod config;
pub mod error;
pub mod registry;
pub mod validator;

pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use registry::{SchemaRegistry, SCHEMA_FILE_SUFFIX};
