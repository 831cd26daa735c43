//! Discovery of service definitions and ownership of the service instances

use crate::providers::ProviderRegistry;
use crate::{Error, Result, Service};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use supervisor_config::{CONFIG_EXTENSION, RootConfig, ServiceConfig, validate};
use tracing::{error, info};

/// A service definition that was found but could not be loaded
#[derive(Debug)]
pub struct SkippedService {
    /// Slug derived from the file name
    pub slug: String,
    /// Definition file
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: Error,
}

/// Set of services discovered from the service directory
///
/// Built once and read-only afterwards. Re-run [`Supervisor::discover`] to
/// pick up changes on disk.
#[derive(Debug)]
pub struct Supervisor {
    config: RootConfig,
    services: BTreeMap<String, Arc<Service>>,
    skipped: Vec<SkippedService>,
}

impl Supervisor {
    /// Load the root configuration at `path` and discover its services
    pub fn load(path: impl AsRef<Path>, providers: &ProviderRegistry) -> Result<Self> {
        let config = RootConfig::load(path)?;
        Self::discover(config, providers)
    }

    /// Discover every `<slug>.toml` in the configured service directory
    ///
    /// Definitions that fail to parse, validate or resolve to a provider are
    /// logged and recorded in [`skipped`](Self::skipped). Only an unreadable
    /// service directory or an uncreatable lock directory fails discovery.
    pub fn discover(config: RootConfig, providers: &ProviderRegistry) -> Result<Self> {
        let lock_dir = &config.services.lock_dir;
        std::fs::create_dir_all(lock_dir).map_err(|source| Error::Io {
            path: lock_dir.clone(),
            source,
        })?;

        let mut services = BTreeMap::new();
        let mut skipped = Vec::new();

        for path in definition_files(&config.services.location)? {
            // A stem that is not UTF-8 is kept lossily and then fails slug validation
            let slug = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();

            match load_service(&slug, &path, &config, providers) {
                Ok(service) => {
                    info!(service = %slug, provider = %service.provider(), "Loaded service");
                    services.insert(slug, Arc::new(service));
                }
                Err(reason) => {
                    error!(service = %slug, path = %path.display(), error = %reason, "Skipping service definition");
                    skipped.push(SkippedService { slug, path, reason });
                }
            }
        }

        info!(
            loaded = services.len(),
            skipped = skipped.len(),
            location = %config.services.location.display(),
            "Service discovery finished"
        );

        Ok(Self {
            config,
            services,
            skipped,
        })
    }

    /// Loaded services, ordered by slug
    pub fn services(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.services.values()
    }

    /// Get a service by slug
    pub fn get(&self, slug: &str) -> Option<Arc<Service>> {
        self.services.get(slug).cloned()
    }

    /// Slugs of the loaded services, sorted
    pub fn slugs(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    /// Root configuration the services were discovered with
    pub fn root_config(&self) -> &RootConfig {
        &self.config
    }

    /// Definitions that failed to load
    pub fn skipped(&self) -> &[SkippedService] {
        &self.skipped
    }
}

/// Regular `*.toml` files in `location`, sorted by name
fn definition_files(location: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(location).map_err(|source| Error::Io {
        path: location.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| Error::Io {
                path: location.to_path_buf(),
                source,
            })?
            .path();
        let is_definition = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(CONFIG_EXTENSION));
        if is_definition {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_service(
    slug: &str,
    path: &Path,
    root: &RootConfig,
    providers: &ProviderRegistry,
) -> Result<Service> {
    validate::slug(slug)?;
    let config = ServiceConfig::load(path)?;
    providers.create_service(slug, &config, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_definition_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.toml"), "").unwrap();
        std::fs::write(dir.path().join("a.TOML"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("dir.toml")).unwrap();

        let files = definition_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.TOML", "b.toml"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_definition_name_is_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[general]
version = "1.0.0"
root-domain = "example.com"
subdomain = "test"

[services]
lock-dir = "locks"
location = "services"
"#,
        )
        .unwrap();
        let services = dir.path().join("services");
        std::fs::create_dir(&services).unwrap();
        std::fs::write(services.join(OsStr::from_bytes(b"bad\xff.toml")), "").unwrap();

        let supervisor = Supervisor::load(&config_path, &ProviderRegistry::new()).unwrap();

        assert!(supervisor.slugs().is_empty());
        assert_eq!(supervisor.skipped().len(), 1);
        let skipped = &supervisor.skipped()[0];
        assert_eq!(skipped.slug, "bad\u{FFFD}");
        assert!(matches!(skipped.reason, Error::Config(_)));
    }

    #[test]
    fn test_missing_location_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = definition_files(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
