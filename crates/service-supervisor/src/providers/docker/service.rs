use super::{DockerOptions, MissingContainer};
use crate::lock::LockGuard;
use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeError};
use crate::service::ServiceBackend;
use crate::status::{LifecycleOp, ServiceStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Map a native Docker container state to a service status
pub fn status_from_container_state(state: &str) -> ServiceStatus {
    match state {
        "running" => ServiceStatus::Running,
        "exited" | "created" => ServiceStatus::Stopped,
        "restarting" => ServiceStatus::Restarting,
        "paused" => ServiceStatus::Paused,
        "dead" => ServiceStatus::Error,
        _ => ServiceStatus::Unknown,
    }
}

/// Backend driving one container through a [`ContainerRuntime`]
pub(super) struct DockerService {
    slug: String,
    spec: ContainerSpec,
    cooldown: Duration,
    install_cooldown: Duration,
    missing_container: MissingContainer,
    runtime: Arc<dyn ContainerRuntime>,
}

impl DockerService {
    pub(super) fn new(
        slug: &str,
        options: &DockerOptions,
        spec: ContainerSpec,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Self {
            slug: slug.to_string(),
            spec,
            cooldown: options.cooldown(),
            install_cooldown: options.install_cooldown(),
            missing_container: options.missing_container,
            runtime,
        }
    }

    fn image(&self) -> &str {
        &self.spec.image
    }

    fn container(&self) -> &str {
        &self.spec.name
    }

    fn failed(&self, operation: &'static str) -> impl Fn(RuntimeError) -> Error + '_ {
        move |e| Error::service(&self.slug, operation, e)
    }

    /// Pull the image and create the container if either is missing
    async fn ensure_container(&self, op: LifecycleOp) -> Result<()> {
        let operation = op.as_str();
        if !self
            .runtime
            .image_exists(self.image())
            .await
            .map_err(self.failed(operation))?
        {
            info!(service = %self.slug, image = %self.image(), "Image missing, pulling");
            self.runtime
                .pull_image(self.image())
                .await
                .map_err(self.failed(operation))?;
        }

        let state = self
            .runtime
            .container_state(self.container())
            .await
            .map_err(self.failed(operation))?;
        if state.is_none() {
            info!(service = %self.slug, container = %self.container(), "Creating container");
            self.runtime
                .create_container(&self.spec)
                .await
                .map_err(self.failed(operation))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceBackend for DockerService {
    async fn is_installed(&self) -> Result<bool> {
        self.runtime
            .image_exists(self.image())
            .await
            .map_err(self.failed("inspect"))
    }

    async fn install(&self, guard: &LockGuard<'_>) -> Result<()> {
        info!(service = %self.slug, image = %self.image(), "Installing");
        self.runtime
            .pull_image(self.image())
            .await
            .map_err(self.failed("install"))?;
        guard.add_delay(self.install_cooldown);
        Ok(())
    }

    async fn uninstall(&self, guard: &LockGuard<'_>) -> Result<()> {
        info!(service = %self.slug, "Uninstalling");
        guard.add_delay(self.cooldown);

        let state = self
            .runtime
            .container_state(self.container())
            .await
            .map_err(self.failed("uninstall"))?;
        if state.is_some() {
            self.runtime
                .remove_container(self.container())
                .await
                .map_err(self.failed("uninstall"))?;
        }

        if self
            .runtime
            .image_exists(self.image())
            .await
            .map_err(self.failed("uninstall"))?
        {
            self.runtime
                .remove_image(self.image())
                .await
                .map_err(self.failed("uninstall"))?;
        }
        Ok(())
    }

    async fn start(&self, guard: &LockGuard<'_>) -> Result<()> {
        self.ensure_container(LifecycleOp::Start).await?;
        self.runtime
            .start_container(self.container())
            .await
            .map_err(self.failed("start"))?;
        guard.add_delay(self.cooldown);
        Ok(())
    }

    async fn stop(&self, guard: &LockGuard<'_>) -> Result<()> {
        self.ensure_container(LifecycleOp::Stop).await?;
        self.runtime
            .stop_container(self.container())
            .await
            .map_err(self.failed("stop"))?;
        guard.add_delay(self.cooldown);
        Ok(())
    }

    async fn restart(&self, guard: &LockGuard<'_>) -> Result<()> {
        self.ensure_container(LifecycleOp::Restart).await?;
        self.runtime
            .restart_container(self.container())
            .await
            .map_err(self.failed("restart"))?;
        guard.add_delay(self.cooldown);
        Ok(())
    }

    async fn status(&self) -> Result<ServiceStatus> {
        if !self
            .runtime
            .image_exists(self.image())
            .await
            .map_err(self.failed("status"))?
        {
            return Ok(ServiceStatus::NotFound);
        }

        let state = self
            .runtime
            .container_state(self.container())
            .await
            .map_err(self.failed("status"))?;
        let status = match state {
            Some(native) => status_from_container_state(&native),
            None => match self.missing_container {
                MissingContainer::NotFound => ServiceStatus::NotFound,
                MissingContainer::Stopped => ServiceStatus::Stopped,
            },
        };
        debug!(service = %self.slug, %status, "Queried container status");
        Ok(status)
    }
}
