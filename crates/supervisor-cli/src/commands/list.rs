use super::{ServiceReport, load_supervisor};
use crate::OutputFormat;
use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use serde::Serialize;
use service_supervisor::SkippedService;
use std::path::Path;

#[derive(Serialize)]
struct SkippedReport {
    slug: String,
    path: String,
    reason: String,
}

impl From<&SkippedService> for SkippedReport {
    fn from(skipped: &SkippedService) -> Self {
        Self {
            slug: skipped.slug.clone(),
            path: skipped.path.display().to_string(),
            reason: skipped.reason.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ListReport {
    services: Vec<ServiceReport>,
    skipped: Vec<SkippedReport>,
}

pub async fn run(config_path: &Path, format: OutputFormat) -> Result<()> {
    let supervisor = load_supervisor(config_path)?;

    let mut services = Vec::new();
    for service in supervisor.services() {
        services.push(ServiceReport::collect(service).await);
    }
    let report = ListReport {
        services,
        skipped: supervisor.skipped().iter().map(SkippedReport::from).collect(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => display_table(&report),
    }
    Ok(())
}

fn display_table(report: &ListReport) {
    if report.services.is_empty() {
        println!("No services found");
    } else {
        let mut table = Table::new();
        table.set_header(vec![
            "SERVICE", "NAME", "PROVIDER", "ENABLED", "INSTALLED", "STATUS", "BUSY",
        ]);

        for service in &report.services {
            table.add_row(vec![
                Cell::new(&service.slug),
                Cell::new(&service.name),
                Cell::new(&service.provider),
                Cell::new(if service.enabled { "yes" } else { "no" }),
                Cell::new(service.installed_text()),
                service.status_cell(),
                Cell::new(service.busy_text()),
            ]);
        }
        println!("{}", table);
    }

    if !report.skipped.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["SKIPPED", "REASON"]);
        for skipped in &report.skipped {
            table.add_row(vec![
                Cell::new(&skipped.path),
                Cell::new(&skipped.reason).fg(Color::Red),
            ]);
        }
        println!("{}", table);
    }
}
