//! Per-service definitions

use crate::{ConfigError, Result, read_config_file, validate};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Configuration for a single service, loaded from `<slug>.toml`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Whether the service is enabled
    #[serde(default = "enabled_by_default")]
    pub enable: bool,

    /// Descriptive information, never used for control flow
    pub info: ServiceInfo,

    /// Provider that realizes this service
    pub provider: ProviderSection,
}

fn enabled_by_default() -> bool {
    true
}

/// Information about the service that is not needed to run it
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceInfo {
    /// Display name
    pub name: String,

    /// Short description
    pub description: String,

    /// Public website
    #[serde(default)]
    pub website: String,

    /// Categories the service belongs to
    #[serde(default)]
    pub categories: Vec<String>,

    /// URL of the service icon
    #[serde(default)]
    pub icon: String,
}

/// Provider reference plus provider-specific options
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderSection {
    /// Slug of the provider in the provider registry
    pub slug: String,

    /// Options interpreted by the provider only
    #[serde(default)]
    pub options: toml::Table,
}

impl ProviderSection {
    /// Deserialize the opaque options into a provider-specific type
    pub fn options_as<T: DeserializeOwned>(&self) -> std::result::Result<T, toml::de::Error> {
        toml::Value::Table(self.options.clone()).try_into()
    }
}

impl ServiceConfig {
    /// Load and validate a service definition file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_config_file(path)?;
        Self::parse(&content, path)
    }

    /// Parse and validate a service definition as if it was read from `path`
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: ServiceConfig =
            toml::from_str(content).map_err(|e| ConfigError::parse(path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validate::non_empty("info.name", &self.info.name)?;
        validate::non_empty("provider.slug", &self.provider.slug)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCKER_SERVICE: &str = r#"
enable = true

[info]
name = "Media Server"
description = "Streams media"
website = "https://example.org"
categories = ["media", "streaming"]
icon = "https://example.org/icon.png"

[provider]
slug = "docker"

[provider.options]
image = "media:1.0"
volumes = ["/data:/data"]
"#;

    #[derive(Debug, Deserialize)]
    struct ImageOnly {
        image: String,
        #[serde(default)]
        volumes: Vec<String>,
    }

    #[test]
    fn test_parse_full_service() {
        let config = ServiceConfig::parse(DOCKER_SERVICE, Path::new("media.toml")).unwrap();

        assert!(config.enable);
        assert_eq!(config.info.name, "Media Server");
        assert_eq!(config.info.categories, vec!["media", "streaming"]);
        assert_eq!(config.provider.slug, "docker");
        assert_eq!(
            config.provider.options.get("image").and_then(|v| v.as_str()),
            Some("media:1.0")
        );
    }

    #[test]
    fn test_enable_defaults_to_true() {
        let content = DOCKER_SERVICE.replace("enable = true", "");
        let config = ServiceConfig::parse(&content, Path::new("media.toml")).unwrap();
        assert!(config.enable);
    }

    #[test]
    fn test_optional_info_fields() {
        let content = r#"
[info]
name = "Bare"
description = "Nothing else"

[provider]
slug = "docker"
"#;
        let config = ServiceConfig::parse(content, Path::new("bare.toml")).unwrap();
        assert!(config.info.website.is_empty());
        assert!(config.info.categories.is_empty());
        assert!(config.provider.options.is_empty());
    }

    #[test]
    fn test_options_as_typed() {
        let config = ServiceConfig::parse(DOCKER_SERVICE, Path::new("media.toml")).unwrap();
        let options: ImageOnly = config.provider.options_as().unwrap();

        assert_eq!(options.image, "media:1.0");
        assert_eq!(options.volumes, vec!["/data:/data"]);
    }

    #[test]
    fn test_options_as_reports_missing_fields() {
        let content = DOCKER_SERVICE.replace("image = \"media:1.0\"", "");
        let config = ServiceConfig::parse(&content, Path::new("media.toml")).unwrap();
        assert!(config.provider.options_as::<ImageOnly>().is_err());
    }

    #[test]
    fn test_missing_provider_is_parse_error() {
        let content = "[info]\nname = \"x\"\ndescription = \"y\"\n";
        let err = ServiceConfig::parse(content, Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_blank_provider_slug_rejected() {
        let content = DOCKER_SERVICE.replace("slug = \"docker\"", "slug = \"\"");
        let err = ServiceConfig::parse(&content, Path::new("media.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let content = DOCKER_SERVICE.replace("enable = true", "enable = \"yes\"");
        let err = ServiceConfig::parse(&content, Path::new("media.toml")).unwrap_err();
        assert!(err.to_string().contains("media.toml"));
    }
}
