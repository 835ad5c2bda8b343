//! Channel protocol between a dispatcher and a shard executor.
//!
//! # Data Flow
//! ```text
//! Dispatcher                                   Shard Executor
//!     ── [id, {target, options}] ──────────────▶  start outbound call
//!     ── [id, "abort"] ────────────────────────▶  cancel in-flight call
//!     ◀── {id, event: "headers", data} ────────
//!     ◀── {id, event: "body", data: [bytes]} ── (zero or more)
//!     ◀── {id, event: "end"} ───────────────────
//!     ◀── {id, event: "error", data: msg} ──── (instead of end, on failure)
//! ```
//!
//! # Design Decisions
//! - One JSON document per channel frame
//! - Ordering per id comes from the channel's FIFO guarantee
//! - Correlation ids are UUID v4, unique for the lifetime of a channel

pub mod headers;
pub mod messages;

pub use headers::{HeaderList, HeadersInit};
pub use messages::{
    AbortSignal, Command, EventMessage, RequestDescriptor, RequestId, RequestMessage,
    RequestOptions, ResponseHead,
};
