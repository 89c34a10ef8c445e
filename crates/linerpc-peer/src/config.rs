use std::time::Duration;

use linerpc_frame::FrameConfig;

/// Default time an invocation waits for its response.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of outbound messages queued ahead of the writer.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Default bound on flushing the outbound queue during shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime behavior of a [`Peer`](crate::Peer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerConfig {
    /// How long `invoke` waits for a response. `None` waits forever.
    pub invoke_timeout: Option<Duration>,
    /// Upper bound on handlers running at once. `None` is unbounded.
    pub max_concurrent_handlers: Option<usize>,
    /// Outbound queue depth; senders wait when the queue is full.
    pub outbound_queue_capacity: usize,
    /// How long `shutdown` waits for queued messages to be written before
    /// abandoning them.
    pub shutdown_timeout: Duration,
    /// Line framing limits, applied in both directions.
    pub frame: FrameConfig,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            invoke_timeout: Some(DEFAULT_INVOKE_TIMEOUT),
            max_concurrent_handlers: None,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            frame: FrameConfig::default(),
        }
    }
}
