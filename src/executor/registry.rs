//! Executor binding and registry.
//!
//! # Responsibilities
//! - Map a stable executor name to one executor instance (`ExecutorPool`)
//! - Open channels to executors, in-process or over WebSocket
//!
//! # Design Decisions
//! - The dispatcher depends only on the `ExecutorRegistry` trait
//! - Resolving the same name twice yields the same executor, which is what
//!   gives each shard its own quota

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Client;
use url::Url;

use crate::channel::{websocket, Channel};
use crate::config::ExecutorConfig;
use crate::error::{FetchError, FetchResult};
use crate::executor::shard::ShardExecutor;

/// Resolves executor names and opens channels to them.
pub trait ExecutorRegistry: Send + Sync + 'static {
    /// Whatever is needed to reach a resolved executor.
    type Handle: Send + Sync;

    /// Return the handle for `name`, creating the executor if needed.
    fn resolve(&self, name: &str) -> impl Future<Output = FetchResult<Self::Handle>> + Send;

    /// Open a new channel to a resolved executor.
    fn open_channel(&self, handle: &Self::Handle)
        -> impl Future<Output = FetchResult<Channel>> + Send;
}

/// Named executors living in this process.
#[derive(Debug)]
pub struct ExecutorPool {
    executors: DashMap<String, Arc<ShardExecutor>>,
    client: Client,
    config: ExecutorConfig,
}

impl ExecutorPool {
    /// Create an empty pool sharing one outbound HTTP client.
    pub fn new(config: ExecutorConfig) -> FetchResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            executors: DashMap::new(),
            client: builder.build()?,
            config,
        })
    }

    /// Get or create the executor for `name`.
    pub fn resolve(&self, name: &str) -> Arc<ShardExecutor> {
        let executor = self
            .executors
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(executor = %name, "Creating shard executor");
                Arc::new(ShardExecutor::new(name, self.client.clone(), self.config.clone()))
            });
        Arc::clone(&executor)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ShardExecutor>> {
        self.executors.get(name).map(|e| Arc::clone(&e))
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Outbound calls made by every executor in the pool.
    pub fn total_subrequests(&self) -> u64 {
        self.executors.iter().map(|e| e.value().subrequests()).sum()
    }
}

/// Registry whose executors run in this process, reached over in-memory channels.
#[derive(Debug, Clone)]
pub struct LocalRegistry {
    pool: Arc<ExecutorPool>,
    channels_opened: Arc<AtomicUsize>,
}

impl LocalRegistry {
    pub fn new(pool: Arc<ExecutorPool>) -> Self {
        Self {
            pool,
            channels_opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pool(&self) -> &Arc<ExecutorPool> {
        &self.pool
    }

    /// Channels opened through this registry so far.
    pub fn channels_opened(&self) -> usize {
        self.channels_opened.load(Ordering::SeqCst)
    }
}

impl ExecutorRegistry for LocalRegistry {
    type Handle = Arc<ShardExecutor>;

    async fn resolve(&self, name: &str) -> FetchResult<Self::Handle> {
        Ok(self.pool.resolve(name))
    }

    async fn open_channel(&self, handle: &Self::Handle) -> FetchResult<Channel> {
        let (dispatcher_side, executor_side) = Channel::pair();
        tokio::spawn(Arc::clone(handle).serve(executor_side));
        self.channels_opened.fetch_add(1, Ordering::SeqCst);
        Ok(dispatcher_side)
    }
}

/// Registry whose executors live in a remote `unbound-fetch` host.
#[derive(Debug, Clone)]
pub struct WebSocketRegistry {
    base: Url,
}

impl WebSocketRegistry {
    /// `base` is the host's root URL (`http`, `https`, `ws` or `wss`).
    pub fn new(base: &str) -> FetchResult<Self> {
        let mut base = Url::parse(base).map_err(|e| FetchError::InvalidUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match base.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(FetchError::InvalidConfig(format!(
                    "unsupported executor host scheme '{}'",
                    other
                )))
            }
        };
        base.set_scheme(scheme)
            .map_err(|_| FetchError::InvalidConfig(format!("cannot use scheme '{}'", scheme)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    /// WebSocket endpoint of the executor called `name`.
    pub fn endpoint(&self, name: &str) -> FetchResult<Url> {
        self.base
            .join(&format!("executors/{}/ws", name))
            .map_err(|e| FetchError::InvalidUrl {
                url: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl ExecutorRegistry for WebSocketRegistry {
    type Handle = Url;

    async fn resolve(&self, name: &str) -> FetchResult<Self::Handle> {
        self.endpoint(name)
    }

    async fn open_channel(&self, handle: &Self::Handle) -> FetchResult<Channel> {
        websocket::connect(handle.as_str()).await
    }
}
