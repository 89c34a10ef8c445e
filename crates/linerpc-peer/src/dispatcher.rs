//! Reader and writer tasks behind a [`Peer`](crate::Peer).

use std::sync::Arc;

use linerpc_frame::{decode_message, FrameError, LineReader, Message, MessageWriter};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

use crate::correlator::Correlator;
use crate::error::PeerError;
use crate::registry::ChannelRegistry;

#[cfg(feature = "schema")]
use linerpc_schema::SchemaRegistry;

/// Routes every inbound line to the registry or the correlator.
pub(crate) struct Dispatcher {
    pub(crate) registry: Arc<ChannelRegistry>,
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) outbound: mpsc::Sender<Message>,
    pub(crate) limiter: Option<Arc<Semaphore>>,
    /// Handler tasks still computing a response.
    pub(crate) handlers: TaskTracker,
    pub(crate) shutdown: CancellationToken,
    #[cfg(feature = "schema")]
    pub(crate) schemas: Option<Arc<SchemaRegistry>>,
}

impl Dispatcher {
    /// Read lines until the stream ends, fails, or `shutdown` fires, then
    /// fail every pending invocation.
    ///
    /// Handlers still running when the stream ends get to queue their
    /// responses before this returns. `shutdown` abandons them.
    pub(crate) async fn run<R>(self, mut reader: LineReader<R>)
    where
        R: AsyncRead + Unpin,
    {
        let reason = loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => break "peer shut down".to_string(),
                next = reader.next_line() => next,
            };

            match next {
                Ok(Some(line)) => self.dispatch_line(&line).await,
                Ok(None) => break "stream closed".to_string(),
                Err(err) => {
                    warn!(error = %err, "inbound stream failed");
                    break format!("inbound stream failed: {err}");
                }
            }
        };

        let failed = self.correlator.fail_all(reason.as_str());
        debug!(reason = %reason, failed, "dispatcher stopped");

        self.handlers.close();
        if !self.handlers.is_empty() {
            debug!(in_flight = self.handlers.len(), "waiting for in-flight handlers");
            tokio::select! {
                _ = self.handlers.wait() => {}
                _ = self.shutdown.cancelled() => {}
            }
        }
    }

    async fn dispatch_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        match decode_message(line) {
            Ok(message) => self.dispatch(message).await,
            Err(err) => debug!(error = %err, len = line.len(), "dropping undecodable line"),
        }
    }

    async fn dispatch(&self, message: Message) {
        trace!(kind = %message.kind(), id = message.id(), channel = message.channel(), "inbound");

        match message {
            Message::Send { id, channel, args } => self.on_send(&id, &channel, &args),
            Message::Invoke { id, channel, args } => self.on_invoke(id, channel, args).await,
            handle @ Message::Handle { .. } => {
                self.correlator.resolve(handle);
            }
        }
    }

    fn on_send(&self, id: &str, channel: &str, args: &[Value]) {
        if channel.is_empty() {
            debug!(id, "dropping send without channel");
            return;
        }
        if let Err(reason) = self.check_args(channel, args) {
            warn!(channel, id, error = %reason, "dropping send with invalid args");
            return;
        }

        if self.registry.dispatch_send(channel, args) == 0 {
            debug!(channel, id, "no listeners for channel");
        }
    }

    async fn on_invoke(&self, id: String, channel: String, args: Vec<Value>) {
        if channel.is_empty() {
            debug!(id = %id, "dropping invoke without channel");
            return;
        }
        if !self.registry.has_handler(&channel) {
            debug!(channel = %channel, id = %id, "no handler for channel, dropping invoke");
            return;
        }
        if let Err(reason) = self.check_args(&channel, &args) {
            warn!(channel = %channel, id = %id, error = %reason, "rejecting invoke with invalid args");
            let response = Message::handle_error(id, channel, reason);
            if self.outbound.send(response).await.is_err() {
                debug!("outbound closed, dropping rejection");
            }
            return;
        }

        let Some(response) = self.registry.dispatch_invoke(id, channel, args) else {
            return;
        };

        let outbound = self.outbound.clone();
        let limiter = self.limiter.clone();
        let shutdown = self.shutdown.clone();
        self.handlers.spawn(async move {
            let answer = async move {
                let _permit = match limiter {
                    Some(limiter) => Some(limiter.acquire_owned().await.ok()?),
                    None => None,
                };
                Some(response.await)
            };

            let response = tokio::select! {
                response = answer => response,
                _ = shutdown.cancelled() => {
                    debug!("peer shut down, abandoning handler");
                    None
                }
            };
            if let Some(response) = response {
                if outbound.send(response).await.is_err() {
                    debug!("outbound closed, dropping response");
                }
            }
        });
    }

    #[cfg(feature = "schema")]
    fn check_args(&self, channel: &str, args: &[Value]) -> Result<(), String> {
        match &self.schemas {
            Some(schemas) => schemas.validate(channel, args).map_err(|err| err.to_string()),
            None => Ok(()),
        }
    }

    #[cfg(not(feature = "schema"))]
    fn check_args(&self, _channel: &str, _args: &[Value]) -> Result<(), String> {
        Ok(())
    }
}

/// Single writer: drains the outbound queue onto the stream.
///
/// After `shutdown` fires, already queued messages are still written before
/// the stream is closed. A failed write fails every pending invocation and
/// stops the writer.
pub(crate) async fn write_loop<W>(
    mut writer: MessageWriter<W>,
    mut rx: mpsc::Receiver<Message>,
    correlator: Arc<Correlator>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    let mut draining = false;

    loop {
        let next = if draining {
            rx.recv().await
        } else {
            tokio::select! {
                next = rx.recv() => next,
                _ = shutdown.cancelled() => {
                    rx.close();
                    draining = true;
                    continue;
                }
            }
        };
        let Some(message) = next else {
            break;
        };

        trace!(kind = %message.kind(), id = message.id(), channel = message.channel(), "outbound");

        match writer.write_message(&message).await {
            Ok(()) => {}
            Err(FrameError::LineTooLong { size, max }) => {
                warn!(size, max, "outbound message exceeds max line length");
                if let Message::Invoke { id, .. } = &message {
                    correlator.fail(id, PeerError::Frame(FrameError::LineTooLong { size, max }));
                }
                if let Some(fallback) = oversize_fallback(&message) {
                    if let Err(err) = writer.write_message(&fallback).await {
                        warn!(error = %err, "write failed, closing outbound stream");
                        rx.close();
                        correlator.fail_all(format!("write failed: {err}"));
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "write failed, closing outbound stream");
                rx.close();
                correlator.fail_all(format!("write failed: {err}"));
                return;
            }
        }
    }

    if let Err(err) = writer.close().await {
        debug!(error = %err, "closing outbound stream failed");
    }
}

/// Error response sent in place of a response too large to frame.
fn oversize_fallback(message: &Message) -> Option<Message> {
    match message {
        Message::Handle { id, channel, .. } => Some(Message::handle_error(
            id.as_str(),
            channel.as_str(),
            "response exceeds max line length",
        )),
        _ => None,
    }
}
