//! Container runtime boundary used by the Docker provider.

mod cli;
#[cfg(any(test, feature = "test-utils"))]
mod memory;

pub use cli::DockerCli;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryRuntime;

use async_trait::async_trait;
use thiserror::Error;

/// Everything needed to create a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name
    pub name: String,
    /// Image reference
    pub image: String,
    /// Published ports
    pub ports: Vec<PortBinding>,
    /// Volume specifications in runtime syntax (`src:dst[:mode]`)
    pub volumes: Vec<String>,
    /// Environment variables
    pub environment: Vec<(String, String)>,
    /// Memory limit in runtime syntax (`512m`, `2g`)
    pub memory: Option<String>,
}

/// A container port published on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Port inside the container, with optional protocol (`80/tcp`)
    pub container_port: String,
    /// Port on the host
    pub host_port: u16,
}

/// Errors from the container runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime binary could not be executed
    #[error("Failed to execute '{command}': {source}")]
    Exec {
        /// Command line that was attempted
        command: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The runtime ran but reported failure
    #[error("'{command}' failed{}: {stderr}", describe_exit(.exit_code))]
    CommandFailed {
        /// Command line that failed
        command: String,
        /// Captured standard error
        stderr: String,
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
    },
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!(" (exit code {})", code),
        None => String::new(),
    }
}

/// Operations the Docker provider needs from a container runtime
///
/// Lookups return `Ok(None)` or `Ok(false)` for absent objects. Errors are
/// reserved for a runtime that could not answer.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether `image` is present locally
    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError>;

    /// Pull `image` from its registry
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Remove `image`, including when containers still reference it
    async fn remove_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Native state string of container `name`, or `None` if it does not exist
    async fn container_state(&self, name: &str) -> Result<Option<String>, RuntimeError>;

    /// Create a container without starting it
    async fn create_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError>;

    /// Start container `name`
    async fn start_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Stop container `name`
    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Restart container `name`
    async fn restart_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Remove container `name`, stopping it first if needed
    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;
}
