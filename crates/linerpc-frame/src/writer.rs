use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::{FrameConfig, LineCodec};
use crate::error::Result;
use crate::message::Message;

/// Writes complete message lines to any `AsyncWrite` stream.
pub struct MessageWriter<W> {
    inner: FramedWrite<W, LineCodec>,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self {
            inner: FramedWrite::new(inner, LineCodec::with_config(config)),
        }
    }

    /// Encode a message as one line, write it and flush.
    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        self.inner.send(message).await
    }

    /// Flush and shut down the write side of the stream.
    pub async fn close(&mut self) -> Result<()> {
        SinkExt::<&Message>::close(&mut self.inner).await
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        self.inner.get_mut()
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use serde_json::json;

    use super::*;
    use crate::codec::decode_message;
    use crate::error::FrameError;
    use crate::reader::LineReader;

    #[tokio::test]
    async fn write_single_message() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));

        writer
            .write_message(&Message::invoke("1", "echo", vec![json!("hoge")]))
            .await
            .unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(
            String::from_utf8(wire).unwrap(),
            "{\"type\":\"invoke\",\"id\":\"1\",\"channel\":\"echo\",\"args\":[\"hoge\"]}\n"
        );
    }

    #[tokio::test]
    async fn write_multiple_messages() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));

        writer
            .write_message(&Message::send("1", "one", vec![]))
            .await
            .unwrap();
        writer
            .write_message(&Message::handle("2", "two", json!([1, 2, 3])))
            .await
            .unwrap();

        let wire = writer.into_inner().into_inner();
        let text = String::from_utf8(wire).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(decode_message(lines[0]).unwrap().channel(), "one");
        assert_eq!(
            decode_message(lines[1]).unwrap(),
            Message::handle("2", "two", json!([1, 2, 3]))
        );
    }

    #[tokio::test]
    async fn oversized_message_rejected() {
        let cfg = FrameConfig { max_line_length: 8 };
        let mut writer = MessageWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer
            .write_message(&Message::send("1", "oversized", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { .. }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[tokio::test]
    async fn written_lines_decode() {
        let (tx, rx) = tokio::io::duplex(1024);
        let mut writer = MessageWriter::new(tx);
        let mut reader = LineReader::new(rx);

        writer
            .write_message(&Message::handle_error("9", "boom", "failed"))
            .await
            .unwrap();
        writer.close().await.unwrap();

        let line = reader.next_line().await.unwrap().unwrap();
        assert_eq!(
            decode_message(&line).unwrap(),
            Message::handle_error("9", "boom", "failed")
        );
        assert!(reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_error_propagates() {
        let mut writer = MessageWriter::new(BrokenPipe);
        let err = writer
            .write_message(&Message::send("1", "x", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn accessors_and_into_inner() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));
        let _ = writer.get_ref();
        let _ = writer.get_mut();
        let _inner = writer.into_inner();
    }

    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe)))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }
}
