use super::{ServiceReport, find_service, load_supervisor};
use crate::OutputFormat;
use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use std::path::Path;

pub async fn run(config_path: &Path, slug: &str, format: OutputFormat) -> Result<()> {
    let supervisor = load_supervisor(config_path)?;
    let service = find_service(&supervisor, slug)?;
    let report = ServiceReport::collect(&service).await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(vec![Cell::new("Service"), Cell::new(&report.slug)]);
    table.add_row(vec![Cell::new("Name"), Cell::new(&report.name)]);
    table.add_row(vec![Cell::new("Description"), Cell::new(&report.description)]);
    table.add_row(vec![Cell::new("Provider"), Cell::new(&report.provider)]);
    table.add_row(vec![
        Cell::new("Enabled"),
        Cell::new(if report.enabled { "yes" } else { "no" }),
    ]);
    table.add_row(vec![Cell::new("Installed"), Cell::new(report.installed_text())]);
    table.add_row(vec![Cell::new("Status"), report.status_cell()]);
    table.add_row(vec![Cell::new("Busy"), Cell::new(report.busy_text())]);
    table.add_row(vec![
        Cell::new("Lock file"),
        Cell::new(service.lock().path().display()),
    ]);
    if let Some(error) = &report.error {
        table.add_row(vec![Cell::new("Error"), Cell::new(error).fg(Color::Red)]);
    }

    println!("{}", table);
    Ok(())
}
