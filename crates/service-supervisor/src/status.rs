use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable state of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// The workload is up
    Running,
    /// Installed but not running
    Stopped,
    /// The runtime is restarting the workload
    Restarting,
    /// Suspended by the runtime
    Paused,
    /// The runtime reports the workload as failed
    Error,
    /// An update is in progress
    Updating,
    /// The service is not installed
    NotFound,
    /// The runtime reported a state this crate does not know
    Unknown,
}

impl ServiceStatus {
    /// Lowercase name used in logs and machine-readable output
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Restarting => "restarting",
            ServiceStatus::Paused => "paused",
            ServiceStatus::Error => "error",
            ServiceStatus::Updating => "updating",
            ServiceStatus::NotFound => "not_found",
            ServiceStatus::Unknown => "unknown",
        }
    }

    /// States in which start, stop and restart should not be offered
    pub fn is_corrupted(&self) -> bool {
        matches!(
            self,
            ServiceStatus::NotFound | ServiceStatus::Unknown | ServiceStatus::Error
        )
    }

    /// Whether a workload exists and holds its resources
    pub fn is_alive(&self) -> bool {
        matches!(
            self,
            ServiceStatus::Running | ServiceStatus::Restarting | ServiceStatus::Paused
        )
    }

    /// Whether nothing is running for this service
    pub fn is_stopped(&self) -> bool {
        matches!(self, ServiceStatus::Stopped | ServiceStatus::NotFound)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-guarded operations a service supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleOp {
    /// Fetch artifacts so the service can run
    Install,
    /// Remove the workload and its artifacts
    Uninstall,
    /// Start the workload
    Start,
    /// Stop the workload
    Stop,
    /// Stop then start the workload
    Restart,
}

impl LifecycleOp {
    /// Lowercase verb
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOp::Install => "install",
            LifecycleOp::Uninstall => "uninstall",
            LifecycleOp::Start => "start",
            LifecycleOp::Stop => "stop",
            LifecycleOp::Restart => "restart",
        }
    }

    /// Whether the operation acts on a running or stopped workload
    pub fn needs_healthy_service(&self) -> bool {
        matches!(
            self,
            LifecycleOp::Start | LifecycleOp::Stop | LifecycleOp::Restart
        )
    }
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
