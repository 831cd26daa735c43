//! In-memory container runtime for tests

use super::{ContainerRuntime, ContainerSpec, RuntimeError};
use async_runtime_compat::sleep;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    images: HashSet<String>,
    /// Container name to (image, native state)
    containers: HashMap<String, (String, String)>,
    calls: Vec<String>,
    failing: HashSet<String>,
}

/// Runtime that keeps images and containers in memory
///
/// Records every call as `"<operation> <argument>"`, can be told to fail a
/// given operation, and can add latency to every call so tests can observe
/// an operation in flight.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    state: Mutex<State>,
    latency: Duration,
}

impl MemoryRuntime {
    /// Create an empty runtime
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Pre-populate a local image
    pub fn with_image(self, image: &str) -> Self {
        self.state().images.insert(image.to_string());
        self
    }

    /// Add a container in `state`, as if created outside the supervisor
    pub fn add_container(&self, name: &str, image: &str, state: &str) {
        self.state()
            .containers
            .insert(name.to_string(), (image.to_string(), state.to_string()));
    }

    /// Overwrite the native state of an existing container
    pub fn set_container_state(&self, name: &str, state: &str) {
        if let Some(container) = self.state().containers.get_mut(name) {
            container.1 = state.to_string();
        }
    }

    /// Native state of container `name`
    pub fn container_state_of(&self, name: &str) -> Option<String> {
        self.state()
            .containers
            .get(name)
            .map(|(_, state)| state.clone())
    }

    /// Whether `image` is present
    pub fn has_image(&self, image: &str) -> bool {
        self.state().images.contains(image)
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Make every later call of `operation` fail (`"pull_image"`, `"start_container"`, ...)
    pub fn fail_on(&self, operation: &str) {
        self.state().failing.insert(operation.to_string());
    }

    async fn record(&self, operation: &str, argument: &str) -> Result<(), RuntimeError> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        let mut state = self.state();
        let command = format!("{} {}", operation, argument);
        state.calls.push(command.clone());
        if state.failing.contains(operation) {
            return Err(RuntimeError::CommandFailed {
                command,
                stderr: "injected failure".to_string(),
                exit_code: Some(1),
            });
        }
        Ok(())
    }

    fn no_such(&self, operation: &str, kind: &str, name: &str) -> RuntimeError {
        RuntimeError::CommandFailed {
            command: format!("{} {}", operation, name),
            stderr: format!("No such {}: {}", kind, name),
            exit_code: Some(1),
        }
    }

    fn set_state(&self, operation: &str, name: &str, native: &str) -> Result<(), RuntimeError> {
        match self.state().containers.get_mut(name) {
            Some(container) => {
                container.1 = native.to_string();
                Ok(())
            }
            None => Err(self.no_such(operation, "container", name)),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContainerRuntime for MemoryRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        self.record("image_exists", image).await?;
        Ok(self.has_image(image))
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.record("pull_image", image).await?;
        self.state().images.insert(image.to_string());
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.record("remove_image", image).await?;
        if self.state().images.remove(image) {
            Ok(())
        } else {
            Err(self.no_such("remove_image", "image", image))
        }
    }

    async fn container_state(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        self.record("container_state", name).await?;
        Ok(self.container_state_of(name))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        self.record("create_container", &spec.name).await?;
        let mut state = self.state();
        if !state.images.contains(&spec.image) {
            drop(state);
            return Err(self.no_such("create_container", "image", &spec.image));
        }
        state.containers.insert(
            spec.name.clone(),
            (spec.image.clone(), "created".to_string()),
        );
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.record("start_container", name).await?;
        self.set_state("start_container", name, "running")
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.record("stop_container", name).await?;
        self.set_state("stop_container", name, "exited")
    }

    async fn restart_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.record("restart_container", name).await?;
        self.set_state("restart_container", name, "running")
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.record("remove_container", name).await?;
        if self.state().containers.remove(name).is_some() {
            Ok(())
        } else {
            Err(self.no_such("remove_container", "container", name))
        }
    }
}
