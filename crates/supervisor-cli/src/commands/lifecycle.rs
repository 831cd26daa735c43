use super::{find_service, load_supervisor};
use anyhow::{Context, Result, bail};
use service_supervisor::{Error, LifecycleOp, Service, ServiceStatus};
use std::path::Path;
use std::time::Duration;

/// How to deal with a busy or unhealthy service
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub wait: bool,
    pub timeout: Option<u64>,
    pub force: bool,
}

pub async fn run(config_path: &Path, op: LifecycleOp, slug: &str, options: Options) -> Result<()> {
    let supervisor = load_supervisor(config_path)?;
    let service = find_service(&supervisor, slug)?;

    if op.needs_healthy_service() && !options.force {
        refuse_if_corrupted(&service, op).await?;
    }

    let result = if let Some(secs) = options.timeout {
        service
            .run_with_timeout(op, Duration::from_secs(secs))
            .await
    } else if options.wait {
        service.run(op).await
    } else {
        service.try_run(op).await
    };

    match result {
        Ok(()) => {
            println!("✓ {} {}", done(op), slug);
            Ok(())
        }
        Err(Error::LockTimeout { waited, .. }) => bail!(
            "Timed out after {}s waiting to {} service '{}'",
            waited.as_secs(),
            op,
            slug
        ),
        Err(e) if e.is_busy() => bail!(
            "Service '{}' is busy with another operation or still settling; try again later or pass --wait",
            slug
        ),
        Err(e) => Err(e).with_context(|| format!("Failed to {} service '{}'", op, slug)),
    }
}

/// Refuse start, stop and restart on a service in a corrupted state
///
/// An installed service without a workload yet reports `not_found`; that one
/// may still be started.
async fn refuse_if_corrupted(service: &Service, op: LifecycleOp) -> Result<()> {
    let slug = service.slug();
    let status = service
        .status()
        .await
        .with_context(|| format!("Failed to query status of service '{}'", slug))?;
    if !status.is_corrupted() {
        return Ok(());
    }

    if status == ServiceStatus::NotFound {
        let installed = service
            .is_installed()
            .await
            .with_context(|| format!("Failed to query service '{}'", slug))?;
        if !installed {
            bail!(
                "Service '{}' is not installed; run `supervisor install {}` first",
                slug,
                slug
            );
        }
        if op == LifecycleOp::Start {
            return Ok(());
        }
    }

    bail!(
        "Service '{}' is in state '{}'; refusing to {} it (use --force to override)",
        slug,
        status,
        op
    )
}

fn done(op: LifecycleOp) -> &'static str {
    match op {
        LifecycleOp::Install => "Installed",
        LifecycleOp::Uninstall => "Uninstalled",
        LifecycleOp::Start => "Started",
        LifecycleOp::Stop => "Stopped",
        LifecycleOp::Restart => "Restarted",
    }
}
