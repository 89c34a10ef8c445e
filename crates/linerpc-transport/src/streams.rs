use tokio::io::{DuplexStream, Stdin, Stdout};

/// Default in-memory buffer per direction for [`memory_pair`].
const DEFAULT_MEMORY_CAPACITY: usize = 64 * 1024;

/// A connected pair of byte streams, one per direction.
///
/// `inbound` carries bytes sent by the remote side; `outbound` carries bytes
/// to it. The protocol layer treats both as already connected.
#[derive(Debug)]
pub struct StreamPair<R, W> {
    /// Stream read by this side.
    pub inbound: R,
    /// Stream written by this side.
    pub outbound: W,
}

impl<R, W> StreamPair<R, W> {
    /// Pair up an inbound and an outbound stream.
    pub fn new(inbound: R, outbound: W) -> Self {
        Self { inbound, outbound }
    }

    /// Split into `(inbound, outbound)`.
    pub fn into_split(self) -> (R, W) {
        (self.inbound, self.outbound)
    }
}

/// Streams of the current process: stdin in, stdout out.
pub type StdioStreams = StreamPair<Stdin, Stdout>;

/// One end of an in-memory connection.
pub type MemoryStreams = StreamPair<DuplexStream, DuplexStream>;

/// The current process's standard streams, for the serving side of a
/// parent/child connection.
///
/// Nothing else may write to stdout while these are in use: stdout is the
/// protocol channel. Log to stderr.
pub fn stdio() -> StdioStreams {
    StreamPair::new(tokio::io::stdin(), tokio::io::stdout())
}

/// Two connected in-memory endpoints.
///
/// Bytes written to one side's `outbound` are read from the other side's
/// `inbound`. Dropping one side's `outbound` ends the other side's
/// `inbound`.
pub fn memory_pair() -> (MemoryStreams, MemoryStreams) {
    memory_pair_with_capacity(DEFAULT_MEMORY_CAPACITY)
}

/// [`memory_pair`] with an explicit per-direction buffer size.
pub fn memory_pair_with_capacity(capacity: usize) -> (MemoryStreams, MemoryStreams) {
    // One duplex per direction: dropping a writer ends the matching reader.
    let (left_out, right_in) = tokio::io::duplex(capacity);
    let (right_out, left_in) = tokio::io::duplex(capacity);
    (
        StreamPair::new(left_in, left_out),
        StreamPair::new(right_in, right_out),
    )
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn memory_pair_carries_bytes_both_ways() {
        let (left, right) = memory_pair();
        let (mut left_in, mut left_out) = left.into_split();
        let (mut right_in, mut right_out) = right.into_split();

        left_out.write_all(b"ping\n").await.unwrap();
        let mut buf = [0u8; 5];
        right_in.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\n");

        right_out.write_all(b"pong\n").await.unwrap();
        left_in.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong\n");
    }

    #[tokio::test]
    async fn dropping_outbound_closes_peer_inbound() {
        let (left, right) = memory_pair_with_capacity(16);
        let (_left_in, left_out) = left.into_split();
        let (mut right_in, _right_out) = right.into_split();

        drop(left_out);

        let mut rest = Vec::new();
        let read = right_in.read_to_end(&mut rest).await.unwrap();
        assert_eq!(read, 0);
    }
}
