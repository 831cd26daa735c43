use anyhow::{Context, Result, bail};
use service_supervisor::{ProviderRegistry, Supervisor};
use std::path::Path;
use supervisor_config::RootConfig;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating {}...", config_path.display());

    let root = RootConfig::load(config_path).context("Failed to load root configuration")?;
    println!("✓ Root configuration valid");
    println!("  Version: {}", root.general.version);
    println!("  Host: {}", root.host_name());
    println!("  Services: {}", root.services.location.display());
    println!("  Locks: {}", root.services.lock_dir.display());

    let providers = ProviderRegistry::with_defaults();
    let supervisor =
        Supervisor::discover(root, &providers).context("Failed to scan service definitions")?;

    for service in supervisor.services() {
        println!("  ✓ {} ({})", service.slug(), service.provider());
    }
    for skipped in supervisor.skipped() {
        println!("  ✗ {}: {}", skipped.path.display(), skipped.reason);
    }

    let invalid = supervisor.skipped().len();
    if invalid > 0 {
        let total = invalid + supervisor.slugs().len();
        bail!("{} of {} service definitions are invalid", invalid, total);
    }

    println!("✓ {} service definitions valid", supervisor.slugs().len());
    Ok(())
}
