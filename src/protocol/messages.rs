//! Wire message shapes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::headers::HeaderList;

/// Correlation id tying a request message to its events on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Marker serialized as the bare string `"abort"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbortSignal {
    Abort,
}

/// Options of an outbound call as they travel over the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub headers: HeaderList,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,

    /// Whether the caller attached a cancellation token.
    #[serde(default)]
    pub signal: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A complete outbound call, consumed exactly once by an executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub target: String,
    pub options: RequestOptions,
}

/// Second element of a request message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Abort(AbortSignal),
    Fetch(Box<RequestDescriptor>),
}

/// Dispatcher → executor frame: `[id, descriptor]` or `[id, "abort"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage(pub RequestId, pub Command);

impl RequestMessage {
    pub fn fetch(id: RequestId, descriptor: RequestDescriptor) -> Self {
        Self(id, Command::Fetch(Box::new(descriptor)))
    }

    pub fn abort(id: RequestId) -> Self {
        Self(id, Command::Abort(AbortSignal::Abort))
    }

    pub fn id(&self) -> RequestId {
        self.0
    }
}

/// Status line and header snapshot carried by the `headers` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHead {
    pub status: u16,
    #[serde(rename = "statusText", default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: HeaderList,
}

/// Executor → dispatcher frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum EventMessage {
    Headers { id: RequestId, data: ResponseHead },
    Body { id: RequestId, data: Vec<u8> },
    End { id: RequestId },
    Error { id: RequestId, data: String },
}

impl EventMessage {
    pub fn id(&self) -> RequestId {
        match self {
            EventMessage::Headers { id, .. }
            | EventMessage::Body { id, .. }
            | EventMessage::End { id }
            | EventMessage::Error { id, .. } => *id,
        }
    }

    /// Event name as it appears on the wire, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            EventMessage::Headers { .. } => "headers",
            EventMessage::Body { .. } => "body",
            EventMessage::End { .. } => "end",
            EventMessage::Error { .. } => "error",
        }
    }
}
