//! Container runtime backed by the `docker` command line client.

use super::{ContainerRuntime, ContainerSpec, RuntimeError};
use async_process::{Command, Output, Stdio};
use async_trait::async_trait;
use tracing::{debug, info};

/// Stderr fragments the docker CLI prints for absent objects
const MISSING_OBJECT_MARKERS: [&str; 3] = ["no such image", "no such container", "no such object"];

/// Runtime that shells out to the docker CLI
///
/// Every call spawns one `docker` process and waits for it. Nothing is kept
/// between calls.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    /// Use `docker` from `PATH`
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use a specific client binary (`podman` works as well)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.binary, args.join(" "))
    }

    /// Run the client, returning its raw output
    ///
    /// The child is killed if the returned future is dropped.
    async fn run(&self, args: &[String]) -> Result<Output, RuntimeError> {
        debug!(command = %self.command_line(args), "Running container runtime command");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RuntimeError::Exec {
                command: self.command_line(args),
                source,
            })
    }

    /// Run the client, failing on non-zero exit
    async fn run_success(&self, args: &[String]) -> Result<Output, RuntimeError> {
        let output = self.run(args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(self.failed(args, &output))
        }
    }

    /// Run an inspect-style command, mapping "no such object" to `None`
    async fn inspect(&self, args: &[String]) -> Result<Option<String>, RuntimeError> {
        let output = self.run(args).await?;
        if output.status.success() {
            return Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            ));
        }
        if reports_missing_object(&output.stderr) {
            return Ok(None);
        }
        Err(self.failed(args, &output))
    }

    fn failed(&self, args: &[String], output: &Output) -> RuntimeError {
        RuntimeError::CommandFailed {
            command: self.command_line(args),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

fn reports_missing_object(stderr: &[u8]) -> bool {
    let stderr = String::from_utf8_lossy(stderr).to_lowercase();
    MISSING_OBJECT_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

/// Arguments for `docker create` from a container spec
pub(crate) fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = args(["create", "--name", spec.name.as_str()]);

    if let Some(memory) = &spec.memory {
        args.push("--memory".to_string());
        args.push(memory.clone());
    }
    for port in &spec.ports {
        args.push("-p".to_string());
        args.push(format!("{}:{}", port.host_port, port.container_port));
    }
    for (key, value) in &spec.environment {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    for volume in &spec.volumes {
        args.push("-v".to_string());
        args.push(volume.clone());
    }

    args.push(spec.image.clone());
    args
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        let found = self
            .inspect(&args(["image", "inspect", "--format", "{{.Id}}", image]))
            .await?;
        Ok(found.is_some())
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!(image, "Pulling image");
        self.run_success(&args(["pull", "--quiet", image])).await?;
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!(image, "Removing image");
        self.run_success(&args(["image", "rm", "--force", image]))
            .await?;
        Ok(())
    }

    async fn container_state(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        self.inspect(&args([
            "container",
            "inspect",
            "--format",
            "{{.State.Status}}",
            name,
        ]))
        .await
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        info!(container = %spec.name, image = %spec.image, "Creating container");
        self.run_success(&create_args(spec)).await?;
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        info!(container = name, "Starting container");
        self.run_success(&args(["container", "start", name])).await?;
        Ok(())
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        info!(container = name, "Stopping container");
        self.run_success(&args(["container", "stop", name])).await?;
        Ok(())
    }

    async fn restart_container(&self, name: &str) -> Result<(), RuntimeError> {
        info!(container = name, "Restarting container");
        self.run_success(&args(["container", "restart", name]))
            .await?;
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        info!(container = name, "Removing container");
        self.run_success(&args(["container", "rm", "--force", name]))
            .await?;
        Ok(())
    }
}
