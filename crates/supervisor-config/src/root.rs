//! Root configuration: identity of this host and where services live

use crate::{ConfigError, Result, read_config_file, validate};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LOCK_POLL_MS: u64 = 100;
const DEFAULT_STATUS_CACHE_SECS: u64 = 5;

/// Root configuration structure
///
/// Constructed once at startup and never mutated afterwards. Re-reading the
/// file always produces a fresh value.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RootConfig {
    /// Global identity settings
    pub general: GeneralSection,

    /// Service discovery and locking settings
    pub services: ServicesSection,

    /// File this configuration was loaded from
    #[serde(skip)]
    path: PathBuf,
}

/// Global identity settings
#[derive(Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct GeneralSection {
    /// Configuration version (`MAJOR.MINOR.PATCH`)
    pub version: String,

    /// Root domain this host belongs to
    pub root_domain: String,

    /// Subdomain of this host under the root domain
    pub subdomain: String,

    /// Secret used to authenticate to the root server
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl std::fmt::Debug for GeneralSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneralSection")
            .field("version", &self.version)
            .field("root_domain", &self.root_domain)
            .field("subdomain", &self.subdomain)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Service discovery and locking settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ServicesSection {
    /// Directory holding `<slug>.lock` markers
    pub lock_dir: PathBuf,

    /// Directory holding `<slug>.toml` service definitions
    pub location: PathBuf,

    /// Retry interval while waiting for a service lock, in milliseconds
    #[serde(default = "default_lock_poll_ms")]
    pub lock_poll_ms: u64,

    /// How long a status reading stays fresh, in seconds
    #[serde(default = "default_status_cache_secs")]
    pub status_cache_secs: u64,
}

fn default_lock_poll_ms() -> u64 {
    DEFAULT_LOCK_POLL_MS
}

fn default_status_cache_secs() -> u64 {
    DEFAULT_STATUS_CACHE_SECS
}

impl ServicesSection {
    /// Retry interval while waiting for a service lock
    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_ms)
    }

    /// How long a status reading stays fresh
    pub fn status_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.status_cache_secs)
    }
}

impl RootConfig {
    /// Load and validate the root configuration file
    ///
    /// Relative `lock-dir` and `location` entries are resolved against the
    /// directory containing the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = std::path::absolute(path.as_ref())?;
        let content = read_config_file(&path)?;
        Self::parse(&content, &path)
    }

    /// Parse and validate root configuration as if it was read from `path`
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut config: RootConfig =
            toml::from_str(content).map_err(|e| ConfigError::parse(path, e))?;
        config.validate()?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        config.services.lock_dir = resolve(base_dir, &config.services.lock_dir);
        config.services.location = resolve(base_dir, &config.services.location);
        config.path = path.to_path_buf();

        Ok(config)
    }

    /// File this configuration was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fully qualified host name (`subdomain.root-domain`)
    pub fn host_name(&self) -> String {
        format!("{}.{}", self.general.subdomain, self.general.root_domain)
    }

    fn validate(&self) -> Result<()> {
        validate::version(&self.general.version)?;
        validate::domain(&self.general.root_domain)?;
        validate::non_empty("general.subdomain", &self.general.subdomain)?;

        if self.services.lock_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "services.lock-poll-ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
