use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use linerpc_frame::Message;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::PeerError;

/// Outcome of a handler.
pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// Boxed future returned by a [`Handler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Computes the response to `invoke` messages on one channel.
///
/// Implemented for any `Fn(Vec<Value>) -> impl Future<Output = HandlerResult>`,
/// so async closures can be registered directly.
pub trait Handler: Send + Sync + 'static {
    /// Run the handler with the message's positional arguments.
    fn call(&self, args: Vec<Value>) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> HandlerFuture {
        Box::pin(self(args))
    }
}

/// Reacts to `send` messages on one channel. No response is produced.
pub trait Listener: Send + Sync + 'static {
    /// Called with the message's positional arguments.
    fn notify(&self, args: &[Value]);
}

impl<F> Listener for F
where
    F: Fn(&[Value]) + Send + Sync + 'static,
{
    fn notify(&self, args: &[Value]) {
        self(args)
    }
}

/// Failure reported by a handler; its message is sent to the invoking side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("invalid arguments: {err}"))
    }
}

impl From<PeerError> for HandlerError {
    fn from(err: PeerError) -> Self {
        Self::new(err.to_string())
    }
}

/// Per-endpoint channel bindings.
///
/// - channel → one [`Handler`] (last registration wins, no unregister)
/// - channel → ordered [`Listener`]s (all fire, in registration order)
///
/// Locks are held only while looking up bindings, never while a handler or
/// listener runs, so callbacks may register further bindings.
#[derive(Default)]
pub struct ChannelRegistry {
    handlers: Mutex<HashMap<String, Arc<dyn Handler>>>,
    listeners: Mutex<HashMap<String, Vec<Arc<dyn Listener>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `channel`. Returns true if it replaced a binding.
    pub fn register_handler(&self, channel: impl Into<String>, handler: impl Handler) -> bool {
        lock(&self.handlers)
            .insert(channel.into(), Arc::new(handler))
            .is_some()
    }

    /// Append `listener` to `channel`'s listeners.
    pub fn register_listener(&self, channel: impl Into<String>, listener: impl Listener) {
        lock(&self.listeners)
            .entry(channel.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Handler bound to `channel`, if any.
    pub fn handler(&self, channel: &str) -> Option<Arc<dyn Handler>> {
        lock(&self.handlers).get(channel).cloned()
    }

    /// Check if a handler is bound to `channel`.
    pub fn has_handler(&self, channel: &str) -> bool {
        lock(&self.handlers).contains_key(channel)
    }

    /// Number of listeners bound to `channel`.
    pub fn listener_count(&self, channel: &str) -> usize {
        lock(&self.listeners).get(channel).map_or(0, Vec::len)
    }

    /// Channels with a handler, sorted.
    pub fn handler_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = lock(&self.handlers).keys().cloned().collect();
        channels.sort_unstable();
        channels
    }

    /// Deliver a `send` to every listener on `channel`, in order.
    ///
    /// Returns how many listeners ran. Unknown channels are a no-op. A
    /// panicking listener is logged and does not stop the others.
    pub fn dispatch_send(&self, channel: &str, args: &[Value]) -> usize {
        let listeners = match lock(&self.listeners).get(channel) {
            Some(listeners) => listeners.clone(),
            None => return 0,
        };

        for listener in &listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.notify(args))) {
                error!(
                    channel,
                    panic = panic_message(panic.as_ref()),
                    "listener panicked"
                );
            }
        }

        listeners.len()
    }

    /// Prepare the response to an `invoke`.
    ///
    /// Returns `None` when no handler is bound. Otherwise the returned
    /// future runs the handler and always yields a `Handle` message with the
    /// same `id` and `channel`: the handler's value on success, or an error
    /// response if the handler failed or panicked.
    pub fn dispatch_invoke(
        &self,
        id: String,
        channel: String,
        args: Vec<Value>,
    ) -> Option<impl Future<Output = Message> + Send + 'static> {
        let handler = self.handler(&channel)?;

        Some(async move {
            let outcome = AssertUnwindSafe(async move { handler.call(args).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(result)) => Message::handle(id, channel, result),
                Ok(Err(err)) => {
                    warn!(channel = %channel, id = %id, error = %err, "handler failed");
                    Message::handle_error(id, channel, err.message)
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!(channel = %channel, id = %id, panic = reason, "handler panicked");
                    Message::handle_error(id, channel, format!("handler panicked: {reason}"))
                }
            }
        })
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut listener_channels: Vec<String> = lock(&self.listeners).keys().cloned().collect();
        listener_channels.sort_unstable();
        f.debug_struct("ChannelRegistry")
            .field("handlers", &self.handler_channels())
            .field("listeners", &listener_channels)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> impl Listener {
        let log = Arc::clone(log);
        move |args: &[Value]| {
            log.lock().unwrap().push(format!("{tag}:{}", Value::from(args.to_vec())));
        }
    }

    #[test]
    fn listeners_fire_in_registration_order_once_each() {
        let registry = ChannelRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register_listener("evt", recorder(&log, "L1"));
        registry.register_listener("evt", recorder(&log, "L2"));

        let ran = registry.dispatch_send("evt", &[json!(1), json!("a")]);

        assert_eq!(ran, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["L1:[1,\"a\"]".to_string(), "L2:[1,\"a\"]".to_string()]
        );
    }

    #[test]
    fn send_to_unknown_channel_is_noop() {
        let registry = ChannelRegistry::new();
        assert_eq!(registry.dispatch_send("nobody", &[json!(1)]), 0);
        assert_eq!(registry.listener_count("nobody"), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_later_listeners() {
        let registry = ChannelRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.register_listener("evt", |_: &[Value]| panic!("listener bug"));
        let counter = Arc::clone(&hits);
        registry.register_listener("evt", move |_: &[Value]| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.dispatch_send("evt", &[]), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_register_more_listeners() {
        let registry = Arc::new(ChannelRegistry::new());
        let inner = Arc::clone(&registry);
        registry.register_listener("evt", move |_: &[Value]| {
            inner.register_listener("evt", |_: &[Value]| {});
        });

        registry.dispatch_send("evt", &[]);
        assert_eq!(registry.listener_count("evt"), 2);
    }

    #[test]
    fn register_handler_is_last_write_wins() {
        let registry = ChannelRegistry::new();
        assert!(!registry.register_handler("echo", |_args: Vec<Value>| async {
            Ok(json!("first"))
        }));
        assert!(registry.register_handler("echo", |_args: Vec<Value>| async {
            Ok(json!("second"))
        }));
        assert_eq!(registry.handler_channels(), vec!["echo"]);
    }

    #[tokio::test]
    async fn dispatch_invoke_builds_handle_with_same_id_and_channel() {
        let registry = ChannelRegistry::new();
        registry.register_handler("echo", |args: Vec<Value>| async move {
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        });

        let response = registry
            .dispatch_invoke("id-1".into(), "echo".into(), vec![json!("hoge")])
            .expect("handler registered")
            .await;

        assert_eq!(response, Message::handle("id-1", "echo", json!("hoge")));
    }

    #[tokio::test]
    async fn dispatch_invoke_without_handler_returns_none() {
        let registry = ChannelRegistry::new();
        assert!(registry
            .dispatch_invoke("id".into(), "missing".into(), vec![])
            .is_none());
    }

    #[tokio::test]
    async fn handler_error_becomes_error_response() {
        let registry = ChannelRegistry::new();
        registry.register_handler("fail", |_args: Vec<Value>| async {
            Err(HandlerError::new("nope"))
        });

        let response = registry
            .dispatch_invoke("id".into(), "fail".into(), vec![])
            .unwrap()
            .await;

        assert_eq!(response, Message::handle_error("id", "fail", "nope"));
    }

    #[tokio::test]
    async fn handler_panic_becomes_error_response() {
        let registry = ChannelRegistry::new();
        registry.register_handler("boom", |_args: Vec<Value>| async {
            if true {
                panic!("kaboom");
            }
            Ok(Value::Null)
        });

        let response = registry
            .dispatch_invoke("id".into(), "boom".into(), vec![])
            .unwrap()
            .await;

        match response {
            Message::Handle {
                error: Some(error),
                result,
                ..
            } => {
                assert!(error.contains("kaboom"));
                assert_eq!(result, Value::Null);
            }
            other => panic!("expected error handle, got {other:?}"),
        }
    }

    #[test]
    fn handler_error_conversions() {
        assert_eq!(HandlerError::from("x").message(), "x");
        assert_eq!(HandlerError::from(String::from("y")).to_string(), "y");
        let json_err = serde_json::from_str::<u8>("oops").unwrap_err();
        assert!(HandlerError::from(json_err)
            .message()
            .starts_with("invalid arguments"));
    }
}
