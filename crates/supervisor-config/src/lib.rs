//! # Supervisor Configuration
//!
//! TOML configuration model for the host service supervisor.
//!
//! The layout is directory based: one root file (see [`RootConfig`]) names a
//! lock directory and a service directory, and the service directory holds
//! one `<slug>.toml` per service (see [`ServiceConfig`]). Both loaders
//! validate eagerly and never coerce a bad value into a default.

#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use thiserror::Error;

mod root;
mod service;
pub mod validate;

pub use root::{GeneralSection, RootConfig, ServicesSection};
pub use service::{ProviderSection, ServiceConfig, ServiceInfo};

/// File extension expected for every configuration file
pub const CONFIG_EXTENSION: &str = "toml";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not exist or is a directory
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but is not a `.toml` file
    #[error("Config file must have a .toml extension: {}", .0.display())]
    InvalidExtension(PathBuf),

    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse TOML in {}: {source}", path.display())]
    ParseError {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl ConfigError {
    pub(crate) fn parse(path: &Path, source: toml::de::Error) -> Self {
        ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Read a configuration file after checking it exists and is TOML
fn read_config_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONFIG_EXTENSION));
    if !is_toml {
        return Err(ConfigError::InvalidExtension(path.to_path_buf()));
    }

    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_config_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_read_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_config_file(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_read_rejects_other_extensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "version: 1").unwrap();

        let err = read_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExtension(_)));
    }

    #[test]
    fn test_read_accepts_uppercase_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CONFIG.TOML");
        std::fs::write(&path, "key = 1").unwrap();

        assert_eq!(read_config_file(&path).unwrap(), "key = 1");
    }
}
