//! Registry mapping provider slugs to provider implementations

use super::Provider;
use super::docker::DockerProvider;
use crate::{Error, Result, Service};
use std::collections::HashMap;
use std::sync::Arc;
use supervisor_config::{RootConfig, ServiceConfig};

/// Registry that resolves `provider.slug` to a [`Provider`]
///
/// Built once at startup and passed by reference to whatever constructs
/// services.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in providers
    ///
    /// Docker is registered against the `docker` binary on `PATH`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DockerProvider::with_cli()));
        registry
    }

    /// Register a provider under its own slug, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.slug().to_string(), provider);
    }

    /// Get a provider by slug
    pub fn get(&self, slug: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(slug).cloned()
    }

    /// Registered provider slugs, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let mut slugs: Vec<_> = self.providers.keys().cloned().collect();
        slugs.sort();
        slugs
    }

    /// Build the service `slug` with the provider its definition names
    pub fn create_service(
        &self,
        slug: &str,
        config: &ServiceConfig,
        root: &RootConfig,
    ) -> Result<Service> {
        let provider = self
            .providers
            .get(&config.provider.slug)
            .ok_or_else(|| Error::ProviderNotFound {
                provider: config.provider.slug.clone(),
                service: slug.to_string(),
            })?;

        Ok(provider.create_service(slug, config, root)?)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .finish()
    }
}
