//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher, shard manager, executors produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request and shard ids are log fields, never metric labels

pub mod logging;
pub mod metrics;
