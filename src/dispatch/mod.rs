//! Quota-aware dispatch.
//!
//! # Data Flow
//! ```text
//! caller
//!     → dispatcher.rs (count call; local below threshold)
//!     → shards.rs (shard = remote_calls / shard_limit; cached channel)
//!     → [id, descriptor] over the shard channel
//!     → pending.rs (headers resolves caller; body/end feed the stream)
//!     → Response handed back
//! ```
//!
//! # Design Decisions
//! - All counters, channels and pending tables belong to one `UnboundFetch`
//!   value; there is no process-global state
//! - Body streams are unbounded: executors are never slowed down by a slow
//!   reader, at the cost of buffering

pub mod dispatcher;
pub mod pending;
pub mod shards;

pub use dispatcher::UnboundFetch;
pub use pending::PendingTable;
pub use shards::{ShardLink, ShardManager};
