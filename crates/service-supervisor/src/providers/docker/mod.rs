//! Docker provider: one container per service, named after the slug.
//!
//! The image is the unit of installation. A service counts as installed when
//! its image is present locally; the container is created on demand by the
//! first start, stop or restart.

mod options;
mod service;

pub use options::{DockerOptions, MissingContainer};
pub use service::status_from_container_state;

use super::{Provider, ProviderError};
use crate::runtime::{ContainerRuntime, DockerCli};
use crate::Service;
use service::DockerService;
use std::sync::Arc;
use supervisor_config::{RootConfig, ServiceConfig};

/// Slug services use to select the Docker provider
pub const PROVIDER_SLUG: &str = "docker";

/// Provider creating Docker-backed services
#[derive(Clone)]
pub struct DockerProvider {
    runtime: Arc<dyn ContainerRuntime>,
}

impl DockerProvider {
    /// Create a provider driving containers through `runtime`
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Create a provider using the `docker` binary on `PATH`
    pub fn with_cli() -> Self {
        Self::new(Arc::new(DockerCli::new()))
    }

    /// Parse and check the options of a service definition
    pub fn options(slug: &str, config: &ServiceConfig) -> Result<DockerOptions, ProviderError> {
        config
            .provider
            .options_as::<DockerOptions>()
            .map_err(|source| ProviderError::Options {
                provider: PROVIDER_SLUG.to_string(),
                service: slug.to_string(),
                source,
            })
    }
}

impl Provider for DockerProvider {
    fn slug(&self) -> &str {
        PROVIDER_SLUG
    }

    fn create_service(
        &self,
        slug: &str,
        config: &ServiceConfig,
        root: &RootConfig,
    ) -> Result<Service, ProviderError> {
        let options = Self::options(slug, config)?;
        let spec = options
            .container_spec(slug)
            .map_err(|reason| ProviderError::InvalidOptions {
                provider: PROVIDER_SLUG.to_string(),
                service: slug.to_string(),
                reason,
            })?;

        let backend = DockerService::new(slug, &options, spec, self.runtime.clone());
        Ok(Service::new(slug, config.clone(), root, Box::new(backend)))
    }
}

impl std::fmt::Debug for DockerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerProvider").finish_non_exhaustive()
    }
}
