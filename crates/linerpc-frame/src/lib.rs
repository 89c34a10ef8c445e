//! Newline-delimited JSON message framing for linerpc.
//!
//! Every message is one line of UTF-8 text holding a JSON object:
//! - A `type` tag: `send`, `invoke` or `handle`
//! - An opaque `id` correlating an `invoke` with its `handle`
//! - A `channel` name plus `args` (requests) or `return` (responses)
//!
//! No length prefix and no framing byte beyond `\n`. Partial reads are
//! buffered internally; callers always see whole lines.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_line, decode_message, encode_line, encode_message, FrameConfig, LineCodec,
    DEFAULT_MAX_LINE_LENGTH,
};
pub use error::{DecodeError, FrameError, Result};
pub use message::{Message, MessageKind};
pub use reader::LineReader;
pub use writer::MessageWriter;
