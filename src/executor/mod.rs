//! Shard executors and the registry that reaches them.
//!
//! # Data Flow
//! ```text
//! dispatcher ── resolve("{session}-{name}-{shard}") ──▶ ExecutorRegistry
//!            ── open_channel(handle) ────────────────▶ Channel
//!                                                         │
//!                                                         ▼
//!                                  ShardExecutor::serve (one task per channel)
//!                                        └── execute (one task per request)
//!                                               └── reqwest outbound call
//! ```
//!
//! # Design Decisions
//! - Each executor counts its own outbound calls; that count is the quota the
//!   dispatcher is spreading load across
//! - Failures are reported with an `error` event unless `report_errors` is off

pub mod registry;
pub mod shard;

pub use registry::{ExecutorPool, ExecutorRegistry, LocalRegistry, WebSocketRegistry};
pub use shard::ShardExecutor;
