//! Providers turn service definitions into runnable services.
//!
//! A provider is looked up by the `provider.slug` of a service file and owns
//! the interpretation of that file's `[provider.options]` table.

pub mod docker;
mod registry;

pub use registry::ProviderRegistry;

use crate::Service;
use supervisor_config::{RootConfig, ServiceConfig};
use thiserror::Error;

/// Factory for services of one backing technology
pub trait Provider: Send + Sync {
    /// Slug services use to select this provider
    fn slug(&self) -> &str;

    /// Build the service `slug` from its definition
    fn create_service(
        &self,
        slug: &str,
        config: &ServiceConfig,
        root: &RootConfig,
    ) -> Result<Service, ProviderError>;
}

/// Errors raised while a provider builds a service
#[derive(Debug, Error)]
pub enum ProviderError {
    /// `[provider.options]` could not be decoded
    #[error("Invalid {provider} options for service '{service}': {source}")]
    Options {
        /// Provider slug
        provider: String,
        /// Service slug
        service: String,
        /// Decoding error
        #[source]
        source: toml::de::Error,
    },

    /// `[provider.options]` decoded but holds a rejected value
    #[error("Invalid {provider} options for service '{service}': {reason}")]
    InvalidOptions {
        /// Provider slug
        provider: String,
        /// Service slug
        service: String,
        /// What is wrong with the options
        reason: String,
    },
}
