use crate::runtime::{ContainerSpec, PortBinding};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_COOLDOWN_SECS: u64 = 10;
const DEFAULT_INSTALL_COOLDOWN_SECS: u64 = 5;
const PORT_PROTOCOLS: [&str; 3] = ["tcp", "udp", "sctp"];

/// `[provider.options]` of a Docker-backed service
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DockerOptions {
    /// Image reference, e.g. `nginx:1.27`
    pub image: String,

    /// Container port (`80` or `80/tcp`) to host port
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,

    /// Volume specifications (`/host:/container[:ro]` or `named:/container`)
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Environment variables; values must be strings, numbers or booleans
    #[serde(default)]
    pub environment: BTreeMap<String, toml::Value>,

    /// Memory limit (`512m`, `2g`)
    #[serde(default)]
    pub memory: Option<String>,

    /// Settling time after start, stop, restart and uninstall, in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Settling time after install, in seconds
    #[serde(default = "default_install_cooldown_secs")]
    pub install_cooldown_secs: u64,

    /// Status reported when the image exists but the container does not
    #[serde(default)]
    pub missing_container: MissingContainer,
}

fn default_cooldown_secs() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

fn default_install_cooldown_secs() -> u64 {
    DEFAULT_INSTALL_COOLDOWN_SECS
}

/// Status policy for an installed image without a container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingContainer {
    /// Report `not_found`
    #[default]
    NotFound,
    /// Report `stopped`; the container is created on the next start
    Stopped,
}

impl DockerOptions {
    /// Cooldown after start, stop, restart and uninstall
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Cooldown after install
    pub fn install_cooldown(&self) -> Duration {
        Duration::from_secs(self.install_cooldown_secs)
    }

    /// Build the container spec for the container named `name`
    ///
    /// Fails with a human readable reason when an option is unusable.
    pub fn container_spec(&self, name: &str) -> Result<ContainerSpec, String> {
        if self.image.trim().is_empty() {
            return Err("image must not be empty".to_string());
        }

        let mut ports = Vec::with_capacity(self.ports.len());
        for (container_port, host_port) in &self.ports {
            validate_port_key(container_port)?;
            if *host_port == 0 {
                return Err(format!("host port for '{}' must not be 0", container_port));
            }
            ports.push(PortBinding {
                container_port: container_port.clone(),
                host_port: *host_port,
            });
        }

        if let Some(volume) = self.volumes.iter().find(|v| v.trim().is_empty()) {
            return Err(format!("invalid volume '{}'", volume));
        }

        let mut environment = Vec::with_capacity(self.environment.len());
        for (key, value) in &self.environment {
            if key.is_empty() || key.contains('=') {
                return Err(format!("invalid environment variable name '{}'", key));
            }
            environment.push((key.clone(), scalar_to_string(key, value)?));
        }

        if self.memory.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err("memory must not be empty when set".to_string());
        }

        Ok(ContainerSpec {
            name: name.to_string(),
            image: self.image.clone(),
            ports,
            volumes: self.volumes.clone(),
            environment,
            memory: self.memory.clone(),
        })
    }
}

fn validate_port_key(key: &str) -> Result<(), String> {
    let (port, protocol) = match key.split_once('/') {
        Some((port, protocol)) => (port, Some(protocol)),
        None => (key, None),
    };

    let port_ok = port.parse::<u16>().is_ok_and(|p| p != 0);
    let protocol_ok = protocol.is_none_or(|p| PORT_PROTOCOLS.contains(&p));
    if port_ok && protocol_ok {
        Ok(())
    } else {
        Err(format!(
            "invalid container port '{}', expected PORT or PORT/(tcp|udp|sctp)",
            key
        ))
    }
}

fn scalar_to_string(key: &str, value: &toml::Value) -> Result<String, String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => Err(format!(
            "environment variable '{}' must be a string, number or boolean, got {}",
            key,
            other.type_str()
        )),
    }
}
