use std::time::Duration;

/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] linerpc_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] linerpc_frame::FrameError),

    /// The connection to the peer is gone.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// No response arrived in time.
    #[error("invoke timed out after {0:?}")]
    Timeout(Duration),

    /// The remote handler failed.
    #[error("handler for channel {channel:?} failed: {message}")]
    Remote { channel: String, message: String },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema validation error.
    #[cfg(feature = "schema")]
    #[error("schema validation error: {0}")]
    Schema(#[from] linerpc_schema::SchemaError),
}

pub type Result<T> = std::result::Result<T, PeerError>;
