//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [listener]
            bind_address = "127.0.0.1:0"
            max_connections = 64

            [connection]
            acknowledge = false
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:0");
        assert_eq!(config.listener.max_connections, Some(64));
        assert!(!config.connection.acknowledge);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = parse_config("[listener\nbind_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_are_reported_together() {
        let err = parse_config(
            r#"
            [connection]
            read_buffer_size = 0

            [queue]
            capacity = 0
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
