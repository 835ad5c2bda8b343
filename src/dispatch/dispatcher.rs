//! Quota-aware dispatcher, the caller-facing entry point.
//!
//! # Responsibilities
//! - Count every call and run the first `threshold` directly
//! - Route everything after that through the shard manager
//! - Register the pending call before its request frame leaves
//! - Forward cancellation to the exact channel carrying the call

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::validation::validate_dispatch;
use crate::config::DispatchConfig;
use crate::dispatch::shards::{ShardLink, ShardManager};
use crate::error::{FetchError, FetchResult};
use crate::executor::ExecutorRegistry;
use crate::http::request::{PreparedRequest, RequestInit};
use crate::http::response::Response;
use crate::observability::metrics;
use crate::protocol::{RequestId, RequestMessage};

struct Inner<R: ExecutorRegistry> {
    session: String,
    config: DispatchConfig,
    client: Client,
    calls: AtomicU64,
    shards: ShardManager<R>,
}

/// A fetch function that spreads calls over shard executors once the local
/// quota is used up.
///
/// Cloning is cheap; clones share counters, channels and pending calls.
pub struct UnboundFetch<R: ExecutorRegistry> {
    inner: Arc<Inner<R>>,
}

impl<R: ExecutorRegistry> Clone for UnboundFetch<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: ExecutorRegistry> UnboundFetch<R> {
    /// Create a dispatcher with its own session id and a default local client.
    pub fn new(registry: R, config: DispatchConfig) -> FetchResult<Self> {
        Self::with_client(registry, config, Client::new())
    }

    /// Create a dispatcher that uses `client` for local calls.
    pub fn with_client(registry: R, config: DispatchConfig, client: Client) -> FetchResult<Self> {
        validate_dispatch(&config).map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            FetchError::InvalidConfig(messages.join(", "))
        })?;

        let session = Uuid::new_v4().to_string();
        let shards = ShardManager::new(registry, &session, &config.name, config.shard_limit);
        tracing::debug!(
            session = %session,
            name = %config.name,
            threshold = config.threshold,
            shard_limit = config.shard_limit,
            "Dispatcher created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                session,
                config,
                client,
                calls: AtomicU64::new(0),
                shards,
            }),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &R {
        self.inner.shards.registry()
    }

    /// Calls dispatched so far, local and remote.
    pub fn calls(&self) -> u64 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Calls routed through shards so far.
    pub fn remote_calls(&self) -> u64 {
        self.inner.shards.remote_calls()
    }

    /// Shard channels currently established.
    pub fn open_channels(&self) -> usize {
        self.inner.shards.open_channels()
    }

    /// Executor name serving `shard` for this dispatcher.
    pub fn executor_name(&self, shard: u64) -> String {
        self.inner.shards.executor_name(shard)
    }

    /// Issue one call.
    ///
    /// Target, method and headers are validated first; a malformed call fails
    /// without touching the network or the call counter.
    pub async fn fetch(&self, target: impl AsRef<str>, init: RequestInit) -> FetchResult<Response> {
        let prepared = PreparedRequest::new(target.as_ref(), &init)?;
        if init.signal.as_ref().is_some_and(|s| s.is_cancelled()) {
            return Err(FetchError::Aborted);
        }

        let index = self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if index < self.inner.config.threshold {
            metrics::record_dispatch("local");
            return self.fetch_local(prepared, init.signal).await;
        }

        metrics::record_dispatch("remote");
        let shard = self.inner.shards.next_shard();
        let link = self.inner.shards.channel(shard).await?;
        self.fetch_remote(link, prepared, init.signal).await
    }

    async fn fetch_local(
        &self,
        prepared: PreparedRequest,
        signal: Option<CancellationToken>,
    ) -> FetchResult<Response> {
        let request = prepared.build(&self.inner.client)?;
        tracing::debug!(method = %request.method(), url = %request.url(), "Local call");

        let response = match &signal {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => return Err(FetchError::Aborted),
                response = self.inner.client.execute(request) => response?,
            },
            None => self.inner.client.execute(request).await?,
        };
        Ok(Response::direct(response, signal))
    }

    async fn fetch_remote(
        &self,
        link: Arc<ShardLink>,
        prepared: PreparedRequest,
        signal: Option<CancellationToken>,
    ) -> FetchResult<Response> {
        let id = RequestId::new();
        let (respond, response) = oneshot::channel();
        let done = CancellationToken::new();
        link.pending().register(id, respond, done.clone());

        // A deadline aborts the call too, so the executor must keep a controller.
        let deadline = self.inner.config.response_timeout();
        let abortable = signal.is_some() || deadline.is_some();
        let message = RequestMessage::fetch(id, prepared.to_descriptor(abortable));
        if let Err(e) = link.send(&message) {
            link.pending().fail(id, || FetchError::ChannelClosed);
            return Err(e);
        }
        tracing::debug!(
            shard = link.shard(),
            request_id = %id,
            method = %prepared.method,
            url = %prepared.url,
            "Remote call sent"
        );

        if let Some(signal) = signal {
            tokio::spawn(watch_abort(Arc::clone(&link), id, signal, done));
        }

        match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, response).await {
                Ok(result) => result.unwrap_or(Err(FetchError::ChannelClosed)),
                Err(_) => Err(timed_out(&link, id, deadline)),
            },
            None => response.await.unwrap_or(Err(FetchError::ChannelClosed)),
        }
    }
}

/// Send an abort for `id` over `link` if `signal` fires before the call ends.
async fn watch_abort(
    link: Arc<ShardLink>,
    id: RequestId,
    signal: CancellationToken,
    done: CancellationToken,
) {
    tokio::select! {
        _ = done.cancelled() => {}
        _ = signal.cancelled() => link.abort(id),
    }
}

fn timed_out(link: &ShardLink, id: RequestId, deadline: Duration) -> FetchError {
    tracing::warn!(shard = link.shard(), request_id = %id, ?deadline, "No response headers before deadline");
    link.abort(id);
    FetchError::Timeout(deadline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use crate::executor::{ExecutorPool, LocalRegistry};

    fn dispatcher(config: DispatchConfig) -> FetchResult<UnboundFetch<LocalRegistry>> {
        let pool = Arc::new(ExecutorPool::new(ExecutorConfig::default())?);
        UnboundFetch::new(LocalRegistry::new(pool), config)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DispatchConfig {
            shard_limit: 0,
            ..DispatchConfig::default()
        };
        assert!(matches!(dispatcher(config), Err(FetchError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_malformed_call_consumes_nothing() {
        let fetch = dispatcher(DispatchConfig::default()).unwrap();

        let err = fetch
            .fetch("http://example.com/", RequestInit::new().header("bad name", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidHeaders(_)));

        let err = fetch.fetch("not a url", RequestInit::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));

        assert_eq!(fetch.calls(), 0);
        assert_eq!(fetch.registry().channels_opened(), 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_signal() {
        let fetch = dispatcher(DispatchConfig::default()).unwrap();
        let signal = CancellationToken::new();
        signal.cancel();

        let err = fetch
            .fetch("http://example.com/", RequestInit::new().signal(signal))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Aborted));
        assert_eq!(fetch.calls(), 0);
    }

    #[tokio::test]
    async fn test_executor_names_scoped_to_session() {
        let a = dispatcher(DispatchConfig::default()).unwrap();
        let b = dispatcher(DispatchConfig::default()).unwrap();
        assert_ne!(a.session_id(), b.session_id());
        assert_eq!(a.executor_name(2), format!("{}-unboundFetch-2", a.session_id()));
    }
}
