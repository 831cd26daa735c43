//! # Service Supervisor
//!
//! Lock-guarded lifecycle management for host services backed by pluggable
//! providers.
//!
//! A [`Supervisor`] scans the service directory named by the root
//! configuration, asks the [`ProviderRegistry`] to turn each `<slug>.toml`
//! into a [`Service`], and keeps the ones that load. Every mutating
//! operation on a service runs under that service's [`ServiceLock`], so at
//! most one install, start, stop, restart or uninstall is in flight per slug
//! at any time.
//!
//! ## Example
//!
//! ```rust,no_run
//! use service_supervisor::{ProviderRegistry, Supervisor};
//!
//! # async fn example() -> service_supervisor::Result<()> {
//! let providers = ProviderRegistry::with_defaults();
//! let supervisor = Supervisor::load("/etc/supervisor/config.toml", &providers)?;
//!
//! for service in supervisor.services() {
//!     println!("{}: {}", service.slug(), service.status().await?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

mod lock;
pub mod providers;
pub mod runtime;
mod service;
mod status;
mod supervisor;

pub use lock::{
    COOLDOWN_EXTENSION, DEFAULT_POLL_INTERVAL, LOCK_EXTENSION, LockError, LockGuard, ServiceLock,
};
pub use providers::docker::{DockerOptions, DockerProvider, MissingContainer};
pub use providers::{Provider, ProviderError, ProviderRegistry};
pub use runtime::{ContainerRuntime, ContainerSpec, DockerCli, PortBinding, RuntimeError};
pub use service::{Service, ServiceBackend};
pub use status::{LifecycleOp, ServiceStatus};
pub use supervisor::{SkippedService, Supervisor};

pub use supervisor_config::{ConfigError, RootConfig, ServiceConfig};

use std::path::PathBuf;
use std::time::Duration;

/// Error types for supervisor operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The service names a provider that is not registered
    #[error("Provider '{provider}' not found for service '{service}'")]
    ProviderNotFound {
        /// Provider slug from the service file
        provider: String,
        /// Service slug
        service: String,
    },

    /// The provider rejected the service options
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Lock protocol errors other than contention
    #[error("Lock error: {0}")]
    Lock(LockError),

    /// The service lock is held or cooling down
    #[error("Service '{0}' is busy")]
    Busy(String),

    /// Waiting for the service lock took longer than allowed
    #[error("Timed out after {}s waiting for the lock of service '{slug}'", waited.as_secs())]
    LockTimeout {
        /// Service slug
        slug: String,
        /// How long the caller waited
        waited: Duration,
    },

    /// Install was requested but the service is already installed
    #[error("Service '{0}' is already installed")]
    AlreadyInstalled(String),

    /// An operation needs an installed service
    #[error("Service '{0}' is not installed")]
    NotInstalled(String),

    /// A backend operation failed
    #[error("Failed to {operation} service '{slug}': {source}")]
    Service {
        /// Service slug
        slug: String,
        /// Operation that failed
        operation: String,
        /// Underlying backend error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The service or lock directory could not be accessed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Directory being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl From<LockError> for Error {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Busy { slug } => Error::Busy(slug),
            other => Error::Lock(other),
        }
    }
}

impl Error {
    /// Wrap a backend failure for `slug`
    pub fn service(
        slug: impl Into<String>,
        operation: impl std::fmt::Display,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Service {
            slug: slug.into(),
            operation: operation.to_string(),
            source: Box::new(source),
        }
    }

    /// Whether the error only reports lock contention
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy(_))
    }
}

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, Error>;
