//! Error definitions shared by the dispatcher and the shard executors.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while dispatching or executing a request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Target could not be parsed as an absolute URL.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Header input could not be turned into a string mapping.
    #[error("Could not extract headers: {0}")]
    InvalidHeaders(String),

    /// HTTP method is not a valid token.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// The outbound HTTP call itself failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Opening a channel to an executor failed.
    #[error("Channel handshake failed: {0}")]
    Handshake(String),

    /// The channel to the executor went away before the request finished.
    #[error("Channel closed")]
    ChannelClosed,

    /// The caller cancelled the request.
    #[error("Request aborted")]
    Aborted,

    /// No response headers arrived within the configured deadline.
    #[error("No response after {0:?}")]
    Timeout(Duration),

    /// The executor reported a failure for this request.
    #[error("Remote executor error: {0}")]
    Remote(String),

    /// The executor has used up its own outbound-call quota.
    #[error("Subrequest quota of {limit} exhausted")]
    QuotaExceeded { limit: u64 },

    /// A frame could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Dispatcher or executor configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FetchError {
    /// Owned copy of an error that several waiters observed together.
    ///
    /// Variants carrying foreign error types keep their message only.
    pub(crate) fn from_shared(error: &FetchError) -> Self {
        match error {
            FetchError::InvalidUrl { url, reason } => FetchError::InvalidUrl {
                url: url.clone(),
                reason: reason.clone(),
            },
            FetchError::InvalidHeaders(m) => FetchError::InvalidHeaders(m.clone()),
            FetchError::InvalidMethod(m) => FetchError::InvalidMethod(m.clone()),
            FetchError::Handshake(m) => FetchError::Handshake(m.clone()),
            FetchError::ChannelClosed => FetchError::ChannelClosed,
            FetchError::Aborted => FetchError::Aborted,
            FetchError::Timeout(d) => FetchError::Timeout(*d),
            FetchError::Remote(m) => FetchError::Remote(m.clone()),
            FetchError::QuotaExceeded { limit } => FetchError::QuotaExceeded { limit: *limit },
            FetchError::InvalidConfig(m) => FetchError::InvalidConfig(m.clone()),
            FetchError::Http(_) | FetchError::Protocol(_) => FetchError::Handshake(error.to_string()),
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::QuotaExceeded { limit: 50 };
        assert_eq!(err.to_string(), "Subrequest quota of 50 exhausted");

        let err = FetchError::InvalidUrl {
            url: "nope".into(),
            reason: "relative URL without a base".into(),
        };
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_from_shared_keeps_variant() {
        let err = FetchError::Handshake("refused".into());
        assert!(matches!(FetchError::from_shared(&err), FetchError::Handshake(m) if m == "refused"));

        let err = FetchError::Protocol(serde_json::from_str::<u8>("x").unwrap_err());
        match FetchError::from_shared(&err) {
            FetchError::Handshake(m) => assert!(m.starts_with("Protocol error")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
