use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use linerpc_frame::Message;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{PeerError, Result};

type Slot = oneshot::Sender<Result<Message>>;

#[derive(Default)]
struct State {
    pending: HashMap<String, Slot>,
    closed: Option<String>,
}

/// Matches `handle` responses to outstanding invocations by message id.
///
/// Each entry moves from registered to resolved or failed exactly once;
/// whichever of response, timeout, cancellation or disconnect comes first
/// wins and later ones are ignored.
#[derive(Default)]
pub struct Correlator {
    state: Mutex<State>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outstanding invocation.
    ///
    /// Fails with [`PeerError::Disconnected`] once the inbound stream is gone.
    pub fn register(
        self: &Arc<Self>,
        id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Result<PendingInvocation> {
        let id = id.into();
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.lock();
            if let Some(reason) = &state.closed {
                return Err(PeerError::Disconnected(reason.clone()));
            }
            state.pending.insert(id.clone(), tx);
        }

        Ok(PendingInvocation {
            id,
            channel: channel.into(),
            rx,
            correlator: Arc::clone(self),
            settled: false,
        })
    }

    /// Deliver a response to its waiting invocation.
    ///
    /// Only `Handle` messages resolve entries. Returns false when nothing was
    /// waiting for the message's id.
    pub fn resolve(&self, message: Message) -> bool {
        if !matches!(message, Message::Handle { .. }) {
            return false;
        }

        let slot = self.lock().pending.remove(message.id());
        match slot {
            Some(tx) => {
                // The waiter may have just given up; nothing to do then.
                let _ = tx.send(Ok(message));
                true
            }
            None => {
                debug!(
                    id = message.id(),
                    channel = message.channel(),
                    "dropping response with no pending invocation"
                );
                false
            }
        }
    }

    /// Forget an entry without resolving it.
    pub fn cancel(&self, id: &str) -> bool {
        self.lock().pending.remove(id).is_some()
    }

    /// Fail one pending entry with a local error, e.g. an unwritable request.
    pub fn fail(&self, id: &str, error: PeerError) -> bool {
        match self.lock().pending.remove(id) {
            Some(tx) => {
                let _ = tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fail every pending entry and refuse new ones.
    ///
    /// Returns how many entries were failed.
    pub fn fail_all(&self, reason: impl Into<String>) -> usize {
        let reason = reason.into();
        let drained: Vec<Slot> = {
            let mut state = self.lock();
            state.closed.get_or_insert_with(|| reason.clone());
            state.pending.drain().map(|(_, tx)| tx).collect()
        };

        let count = drained.len();
        for tx in drained {
            let _ = tx.send(Err(PeerError::Disconnected(reason.clone())));
        }
        if count > 0 {
            debug!(count, reason = %reason, "failed pending invocations");
        }
        count
    }

    /// Number of invocations still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Check if new registrations are refused.
    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Correlator")
            .field("pending", &state.pending.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// An invocation waiting for its response.
///
/// Dropping it before the response arrives removes the entry, so a late
/// response is discarded.
pub struct PendingInvocation {
    id: String,
    channel: String,
    rx: oneshot::Receiver<Result<Message>>,
    correlator: Arc<Correlator>,
    settled: bool,
}

impl PendingInvocation {
    /// Message id this invocation waits on.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Channel that was invoked.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the response value.
    ///
    /// `None` waits until a response arrives or the peer disconnects.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<Value> {
        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.correlator.cancel(&self.id);
                    self.settled = true;
                    debug!(id = %self.id, channel = %self.channel, ?limit, "invoke timed out");
                    return Err(PeerError::Timeout(limit));
                }
            },
            None => (&mut self.rx).await,
        };
        self.settled = true;

        let message = match received {
            Ok(outcome) => outcome?,
            Err(_) => return Err(PeerError::Disconnected("correlator dropped".into())),
        };

        match message {
            Message::Handle {
                error: Some(message),
                ..
            } => Err(PeerError::Remote {
                channel: self.channel.clone(),
                message,
            }),
            Message::Handle { result, .. } => Ok(result),
            other => Err(PeerError::Disconnected(format!(
                "unexpected {} message for invocation {}",
                other.kind(),
                self.id
            ))),
        }
    }
}

impl Drop for PendingInvocation {
    fn drop(&mut self) {
        if !self.settled {
            self.correlator.cancel(&self.id);
        }
    }
}

impl std::fmt::Debug for PendingInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingInvocation")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish()
    }
}
