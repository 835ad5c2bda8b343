//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (shard limit > 0, caps > 0)
//! - Check addresses parse before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: UnboundConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::{DispatchConfig, UnboundConfig};

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the dispatcher section on its own.
pub fn validate_dispatch(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_dispatch(config, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a full configuration.
pub fn validate_config(config: &UnboundConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_dispatch(&config.dispatch, &mut errors);

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.executor.max_subrequests == Some(0) {
        errors.push(ValidationError::new(
            "executor.max_subrequests",
            "must be greater than zero when set",
        ));
    }

    if config.executor.request_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "executor.request_timeout_secs",
            "must be greater than zero when set",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_dispatch(config: &DispatchConfig, errors: &mut Vec<ValidationError>) {
    if config.name.trim().is_empty() {
        errors.push(ValidationError::new("dispatch.name", "must not be empty"));
    }
    if config.name.contains('/') {
        errors.push(ValidationError::new("dispatch.name", "must not contain '/'"));
    }
    if config.shard_limit == 0 {
        errors.push(ValidationError::new(
            "dispatch.shard_limit",
            "must be greater than zero",
        ));
    }
    if config.response_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "dispatch.response_timeout_secs",
            "must be greater than zero when set",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&UnboundConfig::default()).is_ok());
    }

    #[test]
    fn test_all_errors_reported() {
        let mut config = UnboundConfig::default();
        config.dispatch.name = " ".into();
        config.dispatch.shard_limit = 0;
        config.listener.bind_address = "nowhere".into();
        config.executor.max_subrequests = Some(0);

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "dispatch.name",
                "dispatch.shard_limit",
                "listener.bind_address",
                "executor.max_subrequests"
            ]
        );
        assert_eq!(errors[1].to_string(), "dispatch.shard_limit: must be greater than zero");
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = UnboundConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
