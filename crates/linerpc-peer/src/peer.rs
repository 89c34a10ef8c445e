use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use linerpc_frame::{LineReader, Message, MessageWriter};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::config::PeerConfig;
use crate::correlator::Correlator;
use crate::dispatcher::{write_loop, Dispatcher};
use crate::error::{PeerError, Result};
use crate::id::new_message_id;
use crate::registry::{ChannelRegistry, Handler, Listener};

#[cfg(feature = "schema")]
use linerpc_schema::SchemaRegistry;

/// Collects handlers, listeners and configuration before a [`Peer`]
/// starts reading.
///
/// Registering up front guarantees nothing that arrives first is dropped
/// for lack of a handler.
#[derive(Default)]
pub struct PeerBuilder {
    registry: ChannelRegistry,
    config: PeerConfig,
    #[cfg(feature = "schema")]
    schemas: Option<SchemaRegistry>,
}

impl PeerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PeerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind the handler for `channel`. A later binding replaces it.
    pub fn handle(self, channel: impl Into<String>, handler: impl Handler) -> Self {
        self.registry.register_handler(channel, handler);
        self
    }

    /// Add a listener for `channel`.
    pub fn on(self, channel: impl Into<String>, listener: impl Listener) -> Self {
        self.registry.register_listener(channel, listener);
        self
    }

    /// Validate inbound `args` against per-channel schemas.
    #[cfg(feature = "schema")]
    pub fn with_schema_registry(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Start the peer on a connected stream pair.
    ///
    /// Spawns the reader and writer tasks, so this must be called from
    /// within a tokio runtime.
    pub fn connect<R, W>(self, reader: R, writer: W) -> Peer
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let config = self.config;
        let registry = Arc::new(self.registry);
        let correlator = Arc::new(Correlator::new());
        let (outbound, rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
        let shutdown = CancellationToken::new();
        let inbound_closed = CancellationToken::new();

        let dispatcher = Dispatcher {
            registry: Arc::clone(&registry),
            correlator: Arc::clone(&correlator),
            outbound: outbound.clone(),
            limiter: config
                .max_concurrent_handlers
                .map(|limit| Arc::new(Semaphore::new(limit.max(1)))),
            handlers: TaskTracker::new(),
            shutdown: shutdown.clone(),
            #[cfg(feature = "schema")]
            schemas: self.schemas.map(Arc::new),
        };

        let reader_task = {
            let reader = LineReader::with_config(reader, config.frame);
            let inbound_closed = inbound_closed.clone();
            tokio::spawn(async move {
                dispatcher.run(reader).await;
                inbound_closed.cancel();
            })
        };

        let writer_task = tokio::spawn(write_loop(
            MessageWriter::with_config(writer, config.frame),
            rx,
            Arc::clone(&correlator),
            shutdown.clone(),
        ));

        debug!(?config, "peer connected");

        Peer {
            inner: Arc::new(PeerInner {
                registry,
                correlator,
                outbound,
                config,
                shutdown,
                inbound_closed,
                tasks: Mutex::new(Some((reader_task, writer_task))),
            }),
        }
    }
}

/// One endpoint of a line-delimited JSON connection.
///
/// Serves handlers and listeners registered on it, and invokes or notifies
/// the other side. Clones share the same connection. Both ends of a
/// connection are symmetric.
///
/// ```no_run
/// # async fn demo() -> linerpc_peer::Result<()> {
/// use linerpc_peer::Peer;
/// use serde_json::json;
///
/// let (ours, _theirs) = linerpc_transport::memory_pair();
/// let peer = Peer::new(ours.inbound, ours.outbound);
/// let echoed = peer.invoke("echo", vec![json!("hoge")]).await?;
/// println!("{echoed}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Peer {
    inner: Arc<PeerInner>,
}

struct PeerInner {
    registry: Arc<ChannelRegistry>,
    correlator: Arc<Correlator>,
    outbound: mpsc::Sender<Message>,
    config: PeerConfig,
    shutdown: CancellationToken,
    inbound_closed: CancellationToken,
    tasks: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl Drop for PeerInner {
    fn drop(&mut self) {
        let tasks = self
            .tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((reader, writer)) = tasks {
            reader.abort();
            writer.abort();
        }
        self.shutdown.cancel();
    }
}

impl Peer {
    /// Start a peer with default configuration and no bindings.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        PeerBuilder::new().connect(reader, writer)
    }

    /// Start a peer with explicit configuration.
    pub fn with_config<R, W>(reader: R, writer: W, config: PeerConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        PeerBuilder::new().with_config(config).connect(reader, writer)
    }

    /// Start building a peer.
    pub fn builder() -> PeerBuilder {
        PeerBuilder::new()
    }

    /// Bind the handler for `channel`. A later binding replaces it.
    pub fn handle(&self, channel: impl Into<String>, handler: impl Handler) {
        self.inner.registry.register_handler(channel, handler);
    }

    /// Add a listener for `channel`.
    pub fn on(&self, channel: impl Into<String>, listener: impl Listener) {
        self.inner.registry.register_listener(channel, listener);
    }

    /// Invoke the remote handler for `channel` and wait for its value.
    ///
    /// Waits at most the configured `invoke_timeout`.
    pub async fn invoke(&self, channel: &str, args: Vec<Value>) -> Result<Value> {
        self.invoke_with_timeout(channel, args, self.inner.config.invoke_timeout)
            .await
    }

    /// [`invoke`](Self::invoke) with an explicit timeout. `None` waits
    /// until a response arrives or the connection closes.
    pub async fn invoke_with_timeout(
        &self,
        channel: &str,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let id = new_message_id();
        let pending = self.inner.correlator.register(id.as_str(), channel)?;

        debug!(channel, id = %id, "invoke");
        self.enqueue(Message::invoke(id, channel, args)).await?;

        pending.wait(timeout).await
    }

    /// [`invoke`](Self::invoke) and deserialize the value.
    pub async fn invoke_as<T: DeserializeOwned>(
        &self,
        channel: &str,
        args: Vec<Value>,
    ) -> Result<T> {
        let value = self.invoke(channel, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Notify the remote listeners on `channel`. No response is awaited.
    pub async fn send(&self, channel: &str, args: Vec<Value>) -> Result<()> {
        let id = new_message_id();
        debug!(channel, id = %id, "send");
        self.enqueue(Message::send(id, channel, args)).await
    }

    /// Number of invocations waiting for a response.
    pub fn pending_invocations(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Wait until the inbound stream has ended and every handler it
    /// started has queued its response.
    pub async fn closed(&self) {
        self.inner.inbound_closed.cancelled().await;
    }

    /// Check if the inbound stream has ended or the peer was shut down.
    pub fn is_closed(&self) -> bool {
        self.inner.inbound_closed.is_cancelled() || self.inner.shutdown.is_cancelled()
    }

    pub fn config(&self) -> &PeerConfig {
        &self.inner.config
    }

    /// Channel bindings served by this peer.
    pub fn registry(&self) -> &ChannelRegistry {
        &self.inner.registry
    }

    /// Stop the peer.
    ///
    /// Handlers still running are abandoned. Messages already queued are
    /// written for up to `shutdown_timeout`, the outbound stream is closed,
    /// and pending invocations fail with [`PeerError::Disconnected`].
    ///
    /// Await [`closed`](Self::closed) first to let in-flight handlers answer.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let tasks = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((mut reader, mut writer)) = tasks {
            let grace = self.inner.config.shutdown_timeout;
            if tokio::time::timeout(grace, &mut writer).await.is_err() {
                warn!(?grace, "outbound queue not flushed in time, abandoning it");
                writer.abort();
            }
            if tokio::time::timeout(grace, &mut reader).await.is_err() {
                reader.abort();
            }
        }

        self.inner.correlator.fail_all("peer shut down");
        self.inner.inbound_closed.cancel();
    }

    async fn enqueue(&self, message: Message) -> Result<()> {
        if self.is_closed() || self.inner.correlator.is_closed() {
            return Err(PeerError::Disconnected("peer is closed".into()));
        }

        self.inner
            .outbound
            .send(message)
            .await
            .map_err(|_| PeerError::Disconnected("outbound stream closed".into()))
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("pending", &self.inner.correlator.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
