/// Reasons a single line could not be turned into a [`Message`](crate::Message).
///
/// These never end the stream: the offending line is dropped and reading
/// continues.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The line is not well-formed JSON.
    #[error("line is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The line is JSON, but not an object.
    #[error("top-level JSON value is not an object")]
    NotAnObject,

    /// The object has no string `type` field.
    #[error("message has no \"type\" tag")]
    MissingType,

    /// The `type` tag is not one of `send`, `invoke`, `handle`.
    #[error("unrecognized message type {0:?}")]
    UnknownType(String),

    /// A known field has the wrong JSON type.
    #[error("malformed {kind} message: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur while reading or writing lines.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A line exceeds the configured maximum length.
    #[error("line too long ({size} bytes, max {max})")]
    LineTooLong { size: usize, max: usize },

    /// A message could not be serialized.
    #[error("message encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing lines.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
