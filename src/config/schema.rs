//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for both the
//! dispatcher and the executor host. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UnboundConfig {
    /// Executor host listener (bind address).
    pub listener: ListenerConfig,

    /// Dispatcher factory settings.
    pub dispatch: DispatchConfig,

    /// Shard executor settings.
    pub executor: ExecutorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration for the executor host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8787").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8787".to_string(),
        }
    }
}

/// Dispatcher factory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Logical grouping identifier, part of every executor name.
    pub name: String,

    /// Number of calls executed locally before remote routing begins.
    pub threshold: u64,

    /// Remote calls per shard before advancing to the next shard.
    pub shard_limit: u64,

    /// Deadline for response headers on remote calls. Unset waits forever.
    pub response_timeout_secs: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            name: "unboundFetch".to_string(),
            threshold: 0,
            shard_limit: 100,
            response_timeout_secs: None,
        }
    }
}

impl DispatchConfig {
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_secs.map(Duration::from_secs)
    }
}

/// Shard executor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Outbound calls one executor may make (the host's per-unit cap).
    /// Unset means unlimited.
    pub max_subrequests: Option<u64>,

    /// Connection establishment timeout for outbound calls, in seconds.
    pub connect_timeout_secs: u64,

    /// Total timeout for one outbound call, in seconds.
    pub request_timeout_secs: Option<u64>,

    /// User-Agent sent on outbound calls that don't set one.
    pub user_agent: String,

    /// Send an `error` event when an outbound call fails. When off, a
    /// failed call produces no event at all.
    pub report_errors: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_subrequests: None,
            connect_timeout_secs: 10,
            request_timeout_secs: None,
            user_agent: concat!("unbound-fetch/", env!("CARGO_PKG_VERSION")).to_string(),
            report_errors: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "unbound_fetch=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
