//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::UnboundConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Why a configuration could not be turned into an [`UnboundConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The file at `path` could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// The text is not valid TOML for the schema.
    Parse(toml::de::Error),
    /// Parsed, but one or more settings are unusable.
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "invalid TOML: {}", e),
            ConfigError::Validation(errors) => {
                let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "{} invalid setting(s): {}", errors.len(), joined.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<UnboundConfig, ConfigError> {
    let config: UnboundConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<UnboundConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Load `path` if given, otherwise fall back to validated defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<UnboundConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = UnboundConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let config = parse_config("[dispatch]\nthreshold = 40\n").unwrap();
        assert_eq!(config.dispatch.threshold, 40);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[dispatch\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_display() {
        let err = parse_config("[dispatch]\nshard_limit = 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "1 invalid setting(s): dispatch.shard_limit: must be greater than zero"
        );

        let err = parse_config("[dispatch]\nshard_limit = 0\nname = \"\"\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("unbound-fetch-{}.toml", std::process::id()));
        std::fs::write(&path, "[listener]\nbind_address = \"127.0.0.1:9999\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");

        std::fs::remove_file(&path).unwrap_or_default();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("unbound-fetch-"));
    }
}
