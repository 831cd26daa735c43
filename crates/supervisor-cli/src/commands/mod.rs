pub mod lifecycle;
pub mod list;
pub mod status;
pub mod validate;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color};
use serde::Serialize;
use service_supervisor::{ProviderRegistry, Service, ServiceStatus, Supervisor};
use std::path::Path;
use std::sync::Arc;

/// Load the root configuration and discover its services
pub fn load_supervisor(config_path: &Path) -> Result<Supervisor> {
    let providers = ProviderRegistry::with_defaults();
    Supervisor::load(config_path, &providers).with_context(|| {
        format!(
            "Failed to load supervisor configuration from {}",
            config_path.display()
        )
    })
}

/// Look up a service, explaining why it is missing when its definition was skipped
pub fn find_service(supervisor: &Supervisor, slug: &str) -> Result<Arc<Service>> {
    if let Some(service) = supervisor.get(slug) {
        return Ok(service);
    }

    match supervisor.skipped().iter().find(|s| s.slug == slug) {
        Some(skipped) => anyhow::bail!(
            "Service '{}' could not be loaded from {}: {}",
            slug,
            skipped.path.display(),
            skipped.reason
        ),
        None => anyhow::bail!(
            "Service '{}' not found in {}",
            slug,
            supervisor.root_config().services.location.display()
        ),
    }
}

/// Point-in-time view of one service
#[derive(Debug, Serialize)]
pub struct ServiceReport {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub provider: String,
    pub enabled: bool,
    pub installed: Option<bool>,
    pub status: Option<ServiceStatus>,
    pub busy: bool,
    pub cooldown_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceReport {
    /// Query a service; runtime failures end up in `error` instead of aborting
    pub async fn collect(service: &Service) -> Self {
        let mut errors = Vec::new();

        let installed = match service.is_installed().await {
            Ok(installed) => Some(installed),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };
        let status = match service.status().await {
            Ok(status) => Some(status),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };
        errors.dedup();

        let info = &service.config().info;
        Self {
            slug: service.slug().to_string(),
            name: info.name.clone(),
            description: info.description.clone(),
            provider: service.provider().to_string(),
            enabled: service.is_enabled(),
            installed,
            status,
            busy: service.is_busy(),
            cooldown_secs: service
                .lock()
                .cooldown_remaining()
                .map(|remaining| remaining.as_secs_f64().ceil() as u64),
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }

    pub fn status_cell(&self) -> Cell {
        match self.status {
            Some(status) => Cell::new(status).fg(status_color(status)),
            None => Cell::new("query failed").fg(Color::Red),
        }
    }

    pub fn busy_text(&self) -> String {
        match (self.busy, self.cooldown_secs) {
            (_, Some(secs)) => format!("cooling down ({}s)", secs),
            (true, None) => "locked".to_string(),
            (false, None) => "-".to_string(),
        }
    }

    pub fn installed_text(&self) -> &'static str {
        match self.installed {
            Some(true) => "yes",
            Some(false) => "no",
            None => "?",
        }
    }
}

fn status_color(status: ServiceStatus) -> Color {
    match status {
        s if s.is_corrupted() => Color::Red,
        ServiceStatus::Running => Color::Green,
        s if s.is_alive() => Color::Yellow,
        s if s.is_stopped() => Color::DarkGrey,
        _ => Color::Cyan,
    }
}
