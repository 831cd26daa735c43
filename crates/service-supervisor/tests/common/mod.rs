//! Shared fixtures for supervisor integration tests

#![allow(dead_code)]

use service_supervisor::runtime::MemoryRuntime;
use service_supervisor::{DockerProvider, ProviderRegistry, RootConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Temporary supervisor layout: `config.toml`, `services/` and `locks/`
pub struct Fixture {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl Fixture {
    /// Layout with a status cache of `cache_secs` seconds
    pub fn new(cache_secs: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!(
                r#"
[general]
version = "1.0.0"
root-domain = "example.com"
subdomain = "test"

[services]
lock-dir = "locks"
location = "services"
lock-poll-ms = 10
status-cache-secs = {cache_secs}
"#
            ),
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("services")).unwrap();

        Self { dir, config_path }
    }

    pub fn root(&self) -> RootConfig {
        RootConfig::load(&self.config_path).unwrap()
    }

    pub fn services_dir(&self) -> PathBuf {
        self.dir.path().join("services")
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.dir.path().join("locks")
    }

    /// Write `services/<file_name>` verbatim
    pub fn write_file(&self, file_name: &str, content: &str) {
        std::fs::write(self.services_dir().join(file_name), content).unwrap();
    }

    /// Write a docker service definition with extra option lines
    pub fn write_docker_service(&self, slug: &str, image: &str, extra_options: &str) {
        self.write_file(&format!("{slug}.toml"), &docker_service(slug, image, extra_options));
    }
}

/// Docker service definition with extra lines appended to `[provider.options]`
pub fn docker_service(slug: &str, image: &str, extra_options: &str) -> String {
    format!(
        r#"
[info]
name = "{slug}"
description = "Test service {slug}"

[provider]
slug = "docker"

[provider.options]
image = "{image}"
{extra_options}
"#
    )
}

/// Registry whose docker provider drives `runtime`
pub fn registry(runtime: Arc<MemoryRuntime>) -> ProviderRegistry {
    let mut providers = ProviderRegistry::new();
    providers.register(Arc::new(DockerProvider::new(runtime)));
    providers
}

/// Options that remove every cooldown
pub const NO_COOLDOWN: &str = "cooldown-secs = 0\ninstall-cooldown-secs = 0";
