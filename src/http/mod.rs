//! HTTP handling subsystem.
//!
//! # Data Flow
//! ```text
//! caller target + RequestInit
//!     → request.rs (validate, normalize headers, build reqwest request)
//!     → [local call or shard executor]
//!     → response.rs (status/headers now, body chunks as they arrive)
//!
//! executor host:
//!     server.rs (axum) → /executors/{name}/ws → ShardExecutor::serve
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{PreparedRequest, RequestInit};
pub use response::Response;
pub use server::ExecutorHost;
