//! Field validators shared by the root and service loaders

use crate::{ConfigError, Result};
use regex::Regex;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("version pattern is valid"));

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9-]+\.)+[A-Za-z]+$").expect("domain pattern is valid")
});

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("slug pattern is valid"));

/// Check a `MAJOR.MINOR.PATCH` version string
pub fn version(value: &str) -> Result<()> {
    if VERSION_RE.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "Invalid version format: '{}', expected MAJOR.MINOR.PATCH",
            value
        )))
    }
}

/// Check a dotted DNS name such as `home.example.com`
pub fn domain(value: &str) -> Result<()> {
    if DOMAIN_RE.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "Invalid domain name: '{}'",
            value
        )))
    }
}

/// Check a service slug
///
/// Slugs become lock file names and container names, so they are limited to
/// ASCII alphanumerics plus `_`, `.` and `-`, starting with an alphanumeric.
pub fn slug(value: &str) -> Result<()> {
    if SLUG_RE.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "Invalid service slug: '{}'",
            value
        )))
    }
}

/// Check that a required string field is not blank
pub fn non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(ConfigError::ValidationError(format!(
            "Field '{}' must not be empty",
            field
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(version("1.0.0").is_ok());
        assert!(version("10.20.300").is_ok());
        assert!(version("1.0").is_err());
        assert!(version("v1.0.0").is_err());
        assert!(version("1.0.0-beta").is_err());
    }

    #[test]
    fn test_domain() {
        assert!(domain("example.com").is_ok());
        assert!(domain("home.my-site.org").is_ok());
        assert!(domain("localhost").is_err());
        assert!(domain("example.").is_err());
        assert!(domain("exa mple.com").is_err());
        assert!(domain("example.c0m").is_err());
    }

    #[test]
    fn test_slug() {
        assert!(slug("app1").is_ok());
        assert!(slug("media-server_2.beta").is_ok());
        assert!(slug("-leading").is_err());
        assert!(slug("has space").is_err());
        assert!(slug("../escape").is_err());
        assert!(slug("").is_err());
    }

    #[test]
    fn test_non_empty() {
        assert!(non_empty("name", "App").is_ok());
        let err = non_empty("name", "  ").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Field 'name' must not be empty"
        );
    }
}
