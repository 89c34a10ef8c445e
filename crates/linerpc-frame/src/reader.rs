use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::{FrameConfig, LineCodec};
use crate::error::Result;

/// Initial read buffer capacity.
const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads complete lines from any `AsyncRead` stream.
///
/// Handles partial reads internally; callers always get complete lines.
/// Also usable as a [`Stream`] of lines that ends when the source closes.
pub struct LineReader<R> {
    inner: FramedRead<R, LineCodec>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Create a new line reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new line reader with explicit configuration.
    pub fn with_config(inner: R, config: FrameConfig) -> Self {
        Self {
            inner: FramedRead::with_capacity(
                inner,
                LineCodec::with_config(config),
                INITIAL_BUFFER_CAPACITY,
            ),
        }
    }

    /// Read the next complete line.
    ///
    /// Returns `Ok(None)` once the stream has closed. An unterminated final
    /// line is discarded.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        self.inner.next().await.transpose()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }

    /// Consume the reader and return the inner stream.
    ///
    /// Buffered bytes of an incomplete line are lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// Configured maximum line length.
    pub fn max_line_length(&self) -> usize {
        self.inner.decoder().max_line_length()
    }
}

impl<R: AsyncRead + Unpin> Stream for LineReader<R> {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
