use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One protocol message, carried as one line.
///
/// The wire tag is the `type` field; the response payload travels in the
/// `return` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Fire-and-forget event for every listener on `channel`.
    Send {
        #[serde(default)]
        id: String,
        #[serde(default)]
        channel: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        args: Vec<Value>,
    },

    /// Request for the handler on `channel`; answered by a `Handle` with the
    /// same `id`.
    Invoke {
        #[serde(default)]
        id: String,
        #[serde(default)]
        channel: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        args: Vec<Value>,
    },

    /// Response to an `Invoke`.
    Handle {
        #[serde(default)]
        id: String,
        #[serde(default)]
        channel: String,
        #[serde(rename = "return", default)]
        result: Value,
        /// Set when the handler failed; `result` is then `null`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Discriminant of a [`Message`], for logging and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Send,
    Invoke,
    Handle,
}

impl MessageKind {
    /// Wire name of the kind (the `type` tag).
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Send => "send",
            MessageKind::Invoke => "invoke",
            MessageKind::Handle => "handle",
        }
    }

    /// Parse a wire `type` tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "send" => Some(MessageKind::Send),
            "invoke" => Some(MessageKind::Invoke),
            "handle" => Some(MessageKind::Handle),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    /// Build a `Send` event.
    pub fn send(id: impl Into<String>, channel: impl Into<String>, args: Vec<Value>) -> Self {
        Message::Send {
            id: id.into(),
            channel: channel.into(),
            args,
        }
    }

    /// Build an `Invoke` request.
    pub fn invoke(id: impl Into<String>, channel: impl Into<String>, args: Vec<Value>) -> Self {
        Message::Invoke {
            id: id.into(),
            channel: channel.into(),
            args,
        }
    }

    /// Build a successful `Handle` response.
    pub fn handle(id: impl Into<String>, channel: impl Into<String>, result: Value) -> Self {
        Message::Handle {
            id: id.into(),
            channel: channel.into(),
            result,
            error: None,
        }
    }

    /// Build a `Handle` response reporting a handler failure.
    pub fn handle_error(
        id: impl Into<String>,
        channel: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Message::Handle {
            id: id.into(),
            channel: channel.into(),
            result: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Send { .. } => MessageKind::Send,
            Message::Invoke { .. } => MessageKind::Invoke,
            Message::Handle { .. } => MessageKind::Handle,
        }
    }

    /// Correlation id.
    pub fn id(&self) -> &str {
        match self {
            Message::Send { id, .. } | Message::Invoke { id, .. } | Message::Handle { id, .. } => {
                id
            }
        }
    }

    /// Target channel.
    pub fn channel(&self) -> &str {
        match self {
            Message::Send { channel, .. }
            | Message::Invoke { channel, .. }
            | Message::Handle { channel, .. } => channel,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
