use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::error::{DecodeError, FrameError, Result};
use crate::message::{Message, MessageKind};

/// Line terminator.
pub const NEWLINE: u8 = b'\n';

/// Default maximum line length: 16 MiB.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Configuration for line framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum line length in bytes, excluding the terminator. Default: 16 MiB.
    pub max_line_length: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Encode a message as one JSON line into `dst`.
///
/// Wire format:
/// ```text
/// {"type":"invoke","id":"<uuid>","channel":"echo","args":["hoge"]}\n
/// {"type":"handle","id":"<uuid>","channel":"echo","return":"hoge"}\n
/// ```
///
/// Newlines inside string values are escaped by the JSON encoder, so the
/// only raw `\n` is the terminator.
pub fn encode_message(message: &Message, dst: &mut BytesMut) -> Result<()> {
    let json = serde_json::to_vec(message)?;
    dst.reserve(json.len() + 1);
    dst.put_slice(&json);
    dst.put_u8(NEWLINE);
    Ok(())
}

/// Encode a message as a newline-terminated string.
pub fn encode_line(message: &Message) -> Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Decode one line (without its terminator) into a message.
///
/// Rejects non-JSON, non-object values and unrecognized `type` tags.
/// Missing `id`/`channel` decode as empty strings, missing `args` as an
/// empty list and a missing `return` as `null`.
pub fn decode_message(line: &str) -> std::result::Result<Message, DecodeError> {
    let value: Value = serde_json::from_str(line).map_err(DecodeError::InvalidJson)?;

    let kind = match &value {
        Value::Object(map) => match map.get("type") {
            Some(Value::String(tag)) => {
                MessageKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownType(tag.clone()))?
            }
            _ => return Err(DecodeError::MissingType),
        },
        _ => return Err(DecodeError::NotAnObject),
    };

    serde_json::from_value(value).map_err(|source| DecodeError::Malformed {
        kind: kind.as_str(),
        source,
    })
}

/// Split one complete line off the front of `src`.
///
/// Returns `Ok(None)` if `src` holds no terminator yet. On success,
/// consumes the line and its terminator; a trailing `\r` is stripped.
pub fn decode_line(src: &mut BytesMut, max_line_length: usize) -> Result<Option<String>> {
    let mut codec = LineCodec::new(max_line_length);
    codec.decode(src)
}

/// `tokio_util` codec: lines in, messages out.
///
/// Decoding yields raw lines so that a malformed message can be dropped
/// without ending the stream; [`decode_message`] is applied by the caller.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_line_length: usize,
    // Bytes of the buffer already searched for a terminator.
    scanned: usize,
}

impl LineCodec {
    /// Codec with an explicit maximum line length.
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            scanned: 0,
        }
    }

    /// Codec from frame configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self::new(config.max_line_length)
    }

    /// Configured maximum line length.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::with_config(FrameConfig::default())
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        let start = self.scanned.min(src.len());
        let Some(offset) = src[start..].iter().position(|b| *b == NEWLINE) else {
            self.scanned = src.len();
            if src.len() > self.max_line_length {
                return Err(FrameError::LineTooLong {
                    size: src.len(),
                    max: self.max_line_length,
                });
            }
            return Ok(None); // Need more data
        };

        let end = start + offset;
        self.scanned = 0;

        let mut line = src.split_to(end + 1);
        line.truncate(end);
        if line.last() == Some(&b'\r') {
            line.truncate(end - 1);
        }

        if line.len() > self.max_line_length {
            return Err(FrameError::LineTooLong {
                size: line.len(),
                max: self.max_line_length,
            });
        }

        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            debug!(
                bytes = src.len(),
                "dropping unterminated trailing line at end of stream"
            );
            src.advance(src.len());
        }
        self.scanned = 0;
        Ok(None)
    }
}

impl Encoder<Message> for LineCodec {
    type Error = FrameError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<()> {
        Encoder::<&Message>::encode(self, &message, dst)
    }
}

impl Encoder<&Message> for LineCodec {
    type Error = FrameError;

    fn encode(&mut self, message: &Message, dst: &mut BytesMut) -> Result<()> {
        let json = serde_json::to_vec(message)?;
        if json.len() > self.max_line_length {
            return Err(FrameError::LineTooLong {
                size: json.len(),
                max: self.max_line_length,
            });
        }
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(NEWLINE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let messages = [
            Message::send("s-1", "events", vec![json!("a"), json!({ "n": 1 })]),
            Message::invoke("i-1", "echo", vec![json!("hoge")]),
            Message::handle("i-1", "echo", json!([1, 2, 3])),
            Message::handle("i-2", "void", Value::Null),
            Message::handle_error("i-3", "boom", "handler failed"),
        ];

        for message in messages {
            let mut buf = BytesMut::new();
            encode_message(&message, &mut buf).unwrap();
            assert_eq!(buf.last(), Some(&NEWLINE));

            let line = decode_line(&mut buf, DEFAULT_MAX_LINE_LENGTH)
                .unwrap()
                .unwrap();
            assert!(buf.is_empty());
            assert_eq!(decode_message(&line).unwrap(), message);
        }
    }

    #[test]
    fn test_embedded_newline_is_escaped() {
        let message = Message::send("s", "log", vec![json!("line one\nline two")]);
        let line = encode_line(&message).unwrap();

        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with('\n'));
        assert_eq!(decode_message(line.trim_end()).unwrap(), message);
    }

    #[test]
    fn test_decode_incomplete_line() {
        let mut buf = BytesMut::from(&b"{\"type\":\"send\""[..]);
        assert!(decode_line(&mut buf, DEFAULT_MAX_LINE_LENGTH)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 14);
    }

    #[test]
    fn test_decode_strips_carriage_return() {
        let mut buf = BytesMut::from(&b"{}\r\nnext"[..]);
        let line = decode_line(&mut buf, DEFAULT_MAX_LINE_LENGTH)
            .unwrap()
            .unwrap();
        assert_eq!(line, "{}");
        assert_eq!(buf.as_ref(), b"next");
    }

    #[test]
    fn test_multiple_lines() {
        let mut buf = BytesMut::new();
        encode_message(&Message::send("1", "first", vec![]), &mut buf).unwrap();
        encode_message(&Message::send("2", "second", vec![]), &mut buf).unwrap();

        let mut codec = LineCodec::default();
        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decode_message(&first).unwrap().channel(), "first");
        assert_eq!(decode_message(&second).unwrap().channel(), "second");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"{\"type\":\"in"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"voke\",\"channel\":\"x\"}\n");
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line, "{\"type\":\"invoke\",\"channel\":\"x\"}");
    }

    #[test]
    fn test_line_too_long() {
        let mut codec = LineCodec::new(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { size: 10, max: 8 }));
    }

    #[test]
    fn test_encode_rejects_oversized_message() {
        let mut codec = LineCodec::new(16);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(
                Message::send("id", "channel", vec![json!("payload")]),
                &mut buf,
            )
            .unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_eof_drops_partial_line() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"{\"type\":\"send\"}\n{\"type\":"[..]);

        let line = codec.decode_eof(&mut buf).unwrap();
        assert_eq!(line.as_deref(), Some("{\"type\":\"send\"}"));

        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_message_rejects_non_json() {
        let err = decode_message("not json").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    #[test]
    fn test_decode_message_rejects_non_object() {
        for line in ["[\"send\", \"id\", \"ch\", []]", "42", "\"invoke\"", "null"] {
            let err = decode_message(line).unwrap_err();
            assert!(matches!(err, DecodeError::NotAnObject), "{line}");
        }
    }

    #[test]
    fn test_decode_message_rejects_unknown_type() {
        let err = decode_message(r#"{"type":"notify","channel":"x"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(tag) if tag == "notify"));

        let err = decode_message(r#"{"channel":"x","args":[]}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingType));
    }

    #[test]
    fn test_decode_message_rejects_wrong_field_types() {
        let err = decode_message(r#"{"type":"invoke","id":"1","channel":"x","args":"oops"}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { kind: "invoke", .. }));

        let err = decode_message(r#"{"type":"send","channel":7}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { kind: "send", .. }));
    }

    #[test]
    fn test_decode_message_fills_missing_fields() {
        let msg = decode_message(r#"{"type":"send"}"#).unwrap();
        assert_eq!(msg, Message::send("", "", vec![]));

        let msg = decode_message(r#"{"type":"invoke","id":"1","channel":"x","args":null}"#)
            .unwrap();
        assert_eq!(msg, Message::invoke("1", "x", vec![]));

        let msg = decode_message(r#"{"type":"handle","id":"1","channel":"x"}"#).unwrap();
        assert_eq!(msg, Message::handle("1", "x", Value::Null));
    }

    #[test]
    fn test_decode_message_ignores_unknown_fields() {
        let msg =
            decode_message(r#"{"type":"handle","id":"1","channel":"x","return":5,"extra":true}"#)
                .unwrap();
        assert_eq!(msg, Message::handle("1", "x", json!(5)));
    }
}
