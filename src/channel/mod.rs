//! Persistent duplex channels between a dispatcher and one shard executor.
//!
//! # Data Flow
//! ```text
//! ChannelSender ──(text frame)──▶ transport ──▶ ChannelReceiver
//!
//! transport = in-memory queues (LocalRegistry)
//!           | WebSocket pump tasks (WebSocketRegistry / executor host)
//! ```
//!
//! # Design Decisions
//! - Both transports are reduced to a pair of unbounded mpsc queues of text
//!   frames, so the dispatcher and executor never see the transport
//! - A single writer task per WebSocket keeps frames in FIFO order
//! - Dropping every sender closes the channel; the receiver then yields `None`

pub mod websocket;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{FetchError, FetchResult};

/// Sending half of a channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSender {
    /// Serialize `message` as one JSON frame and queue it.
    pub fn send<T: Serialize>(&self, message: &T) -> FetchResult<()> {
        let frame = serde_json::to_string(message)?;
        self.send_frame(frame)
    }

    /// Queue a pre-encoded frame.
    pub fn send_frame(&self, frame: String) -> FetchResult<()> {
        self.tx.send(frame).map_err(|_| FetchError::ChannelClosed)
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the receiving side has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Receiving half of a channel.
#[derive(Debug)]
pub struct ChannelReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelReceiver {
    /// Next frame, or `None` once the peer is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// One endpoint of a duplex channel.
#[derive(Debug)]
pub struct Channel {
    sender: ChannelSender,
    receiver: ChannelReceiver,
}

impl Channel {
    /// Build an endpoint from raw queues.
    pub fn from_parts(
        tx: mpsc::UnboundedSender<String>,
        rx: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            sender: ChannelSender { tx },
            receiver: ChannelReceiver { rx },
        }
    }

    /// Create two connected in-memory endpoints.
    pub fn pair() -> (Channel, Channel) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Channel::from_parts(a_tx, b_rx), Channel::from_parts(b_tx, a_rx))
    }

    pub fn split(self) -> (ChannelSender, ChannelReceiver) {
        (self.sender, self.receiver)
    }
}
