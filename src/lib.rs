//! Unbounded outbound HTTP from quota-capped execution environments.
//!
//! `UnboundFetch` looks like a plain fetch function. Once the local quota
//! (`threshold`) is used up it routes each call through a shard executor,
//! a remote unit with its own quota, advancing to a fresh shard every
//! `shard_limit` calls. Requests and streamed responses travel over one
//! persistent channel per shard.

// Core
pub mod channel;
pub mod dispatch;
pub mod executor;
pub mod protocol;

// Caller surface
pub mod error;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::{DispatchConfig, ExecutorConfig, UnboundConfig};
pub use dispatch::UnboundFetch;
pub use error::{FetchError, FetchResult};
pub use executor::{ExecutorPool, ExecutorRegistry, LocalRegistry, WebSocketRegistry};
pub use http::{ExecutorHost, RequestInit, Response};
pub use protocol::HeadersInit;
pub use tokio_util::sync::CancellationToken;
