//! Shard manager: one cached channel per shard index.
//!
//! # Responsibilities
//! - Map the remote-call counter to a shard index
//! - Open a channel the first time a shard index is used, reuse it after
//! - Run the reader task that feeds a channel's events into its pending table
//!
//! # Design Decisions
//! - The in-flight handshake is cached as a shared future per shard, so every
//!   caller that races on a fresh shard awaits the same handshake and sees
//!   the same outcome, success or failure
//! - A failed handshake is evicted once it settles; the next caller retries
//! - A channel whose transport has closed is evicted on next use

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared, TryFutureExt};
use tokio_util::sync::CancellationToken;

use crate::channel::{Channel, ChannelReceiver, ChannelSender};
use crate::dispatch::pending::PendingTable;
use crate::error::{FetchError, FetchResult};
use crate::executor::ExecutorRegistry;
use crate::observability::metrics;
use crate::protocol::{EventMessage, RequestId, RequestMessage};

/// Dispatcher side of one shard's channel.
pub struct ShardLink {
    shard: u64,
    executor: String,
    sender: ChannelSender,
    pending: Arc<PendingTable>,
    closed: CancellationToken,
}

impl ShardLink {
    /// Take ownership of a fresh channel and start its reader task.
    pub fn spawn(shard: u64, executor: String, channel: Channel) -> Arc<Self> {
        let (sender, receiver) = channel.split();
        let link = Arc::new(Self {
            shard,
            executor,
            sender,
            pending: Arc::new(PendingTable::new()),
            closed: CancellationToken::new(),
        });

        tokio::spawn(read_events(
            receiver,
            Arc::clone(&link.pending),
            link.closed.clone(),
            link.executor.clone(),
        ));
        link
    }

    pub fn shard(&self) -> u64 {
        self.shard
    }

    pub fn executor(&self) -> &str {
        &self.executor
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.sender.is_closed()
    }

    pub fn send(&self, message: &RequestMessage) -> FetchResult<()> {
        self.sender.send(message)
    }

    /// Cancel `id` on the executor and fail it locally.
    ///
    /// Does nothing if the call already finished.
    pub fn abort(&self, id: RequestId) {
        if self.pending.fail(id, || FetchError::Aborted) {
            tracing::debug!(shard = self.shard, request_id = %id, "Sending abort");
            if let Err(e) = self.sender.send(&RequestMessage::abort(id)) {
                tracing::debug!(shard = self.shard, request_id = %id, error = %e, "Abort not delivered");
            }
        }
    }
}

async fn read_events(
    mut receiver: ChannelReceiver,
    pending: Arc<PendingTable>,
    closed: CancellationToken,
    executor: String,
) {
    while let Some(frame) = receiver.recv().await {
        match serde_json::from_str::<EventMessage>(&frame) {
            Ok(event) => {
                tracing::trace!(executor = %executor, request_id = %event.id(), event = event.kind(), "Event received");
                pending.apply(event);
            }
            Err(e) => tracing::warn!(executor = %executor, error = %e, "Ignoring malformed event frame"),
        }
    }

    closed.cancel();
    if !pending.is_empty() {
        tracing::warn!(executor = %executor, pending = pending.len(), "Channel lost with calls in flight");
    }
    pending.fail_all(|| FetchError::ChannelClosed);
}

/// A handshake every waiter can await; failures are shared behind an `Arc`.
type Slot = Shared<BoxFuture<'static, Result<Arc<ShardLink>, Arc<FetchError>>>>;

/// Assigns remote calls to shards and keeps one channel per shard.
pub struct ShardManager<R: ExecutorRegistry> {
    registry: Arc<R>,
    /// Prefix of every executor name: `{session}-{name}`.
    prefix: String,
    shard_limit: u64,
    remote_calls: AtomicU64,
    slots: DashMap<u64, Slot>,
}

impl<R: ExecutorRegistry> ShardManager<R> {
    pub fn new(registry: R, session: &str, name: &str, shard_limit: u64) -> Self {
        Self {
            registry: Arc::new(registry),
            prefix: format!("{}-{}", session, name),
            shard_limit: shard_limit.max(1),
            remote_calls: AtomicU64::new(0),
            slots: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Claim the next remote call slot and return its shard index.
    pub fn next_shard(&self) -> u64 {
        self.remote_calls.fetch_add(1, Ordering::SeqCst) / self.shard_limit
    }

    /// Remote calls assigned so far.
    pub fn remote_calls(&self) -> u64 {
        self.remote_calls.load(Ordering::SeqCst)
    }

    /// Stable executor identity for `shard`.
    pub fn executor_name(&self, shard: u64) -> String {
        format!("{}-{}", self.prefix, shard)
    }

    /// Channels currently established.
    pub fn open_channels(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.value().peek(), Some(Ok(link)) if !link.is_closed()))
            .count()
    }

    /// The channel for `shard`, establishing it on first use.
    pub async fn channel(&self, shard: u64) -> FetchResult<Arc<ShardLink>> {
        let link = self.settle(shard).await?;
        if !link.is_closed() {
            return Ok(link);
        }

        tracing::info!(shard, "Shard channel closed, reconnecting");
        self.evict(shard, |current| {
            matches!(current.peek(), Some(Ok(cached)) if Arc::ptr_eq(cached, &link))
        });
        self.settle(shard).await
    }

    /// Await the cached handshake for `shard`, starting one if none exists.
    async fn settle(&self, shard: u64) -> FetchResult<Arc<ShardLink>> {
        let slot = self
            .slots
            .entry(shard)
            .or_insert_with(|| self.connect(shard))
            .clone();

        match slot.clone().await {
            Ok(link) => Ok(link),
            Err(e) => {
                self.evict(shard, |current| current.ptr_eq(&slot));
                Err(FetchError::from_shared(&e))
            }
        }
    }

    /// Drop the slot for `shard` unless someone already replaced it.
    fn evict(&self, shard: u64, stale: impl FnOnce(&Slot) -> bool) {
        self.slots.remove_if(&shard, |_, current| stale(current));
    }

    fn connect(&self, shard: u64) -> Slot {
        establish(Arc::clone(&self.registry), shard, self.executor_name(shard))
            .map_err(Arc::new)
            .boxed()
            .shared()
    }
}

async fn establish<R: ExecutorRegistry>(
    registry: Arc<R>,
    shard: u64,
    name: String,
) -> FetchResult<Arc<ShardLink>> {
    let handle = registry.resolve(&name).await?;
    let channel = registry.open_channel(&handle).await.map_err(|e| {
        tracing::error!(shard, executor = %name, error = %e, "Shard channel handshake failed");
        e
    })?;

    tracing::info!(shard, executor = %name, "Shard channel established");
    metrics::record_channel_opened();
    Ok(ShardLink::spawn(shard, name, channel))
}
