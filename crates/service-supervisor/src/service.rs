//! Lock-guarded lifecycle wrapper around a provider backend

use crate::lock::{LockGuard, ServiceLock};
use crate::status::{LifecycleOp, ServiceStatus};
use crate::{Error, Result};
use async_runtime_compat::timeout;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use supervisor_config::{RootConfig, ServiceConfig};
use tracing::{debug, info, warn};

/// Provider-specific half of a service
///
/// Mutating methods receive the guard of the held service lock. They are
/// only called by [`Service`] after the lock has been acquired, and use the
/// guard to declare settling time with [`LockGuard::add_delay`].
#[async_trait]
pub trait ServiceBackend: Send + Sync {
    /// Whether the artifacts needed to run the service exist
    async fn is_installed(&self) -> Result<bool>;

    /// Fetch the artifacts needed to run the service
    async fn install(&self, guard: &LockGuard<'_>) -> Result<()>;

    /// Remove the workload and its artifacts
    async fn uninstall(&self, guard: &LockGuard<'_>) -> Result<()>;

    /// Start the workload
    async fn start(&self, guard: &LockGuard<'_>) -> Result<()>;

    /// Stop the workload
    async fn stop(&self, guard: &LockGuard<'_>) -> Result<()>;

    /// Restart the workload
    async fn restart(&self, guard: &LockGuard<'_>) -> Result<()>;

    /// Query the live state
    async fn status(&self) -> Result<ServiceStatus>;
}

#[derive(Debug)]
struct StatusCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, ServiceStatus)>>,
}

impl StatusCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    fn get(&self) -> Option<ServiceStatus> {
        let entry = *self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        entry
            .filter(|(checked_at, _)| checked_at.elapsed() < self.ttl)
            .map(|(_, status)| status)
    }

    fn put(&self, status: ServiceStatus) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some((Instant::now(), status));
    }

    fn clear(&self) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// A supervised service
///
/// Each instance owns the lock for its slug. Create exactly one per slug and
/// share it; two instances for the same slug exclude each other through the
/// marker file but keep separate cooldown timers and status caches.
pub struct Service {
    slug: String,
    config: ServiceConfig,
    lock: ServiceLock,
    status_cache: StatusCache,
    backend: Box<dyn ServiceBackend>,
}

impl Service {
    /// Wrap `backend` with the lock and status cache configured in `root`
    pub fn new(
        slug: impl Into<String>,
        config: ServiceConfig,
        root: &RootConfig,
        backend: Box<dyn ServiceBackend>,
    ) -> Self {
        let slug = slug.into();
        let lock = ServiceLock::new(slug.clone(), &root.services.lock_dir)
            .with_poll_interval(root.services.lock_poll_interval());
        Self {
            slug,
            config,
            lock,
            status_cache: StatusCache::new(root.services.status_cache_ttl()),
            backend,
        }
    }

    /// Unique service slug
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Definition loaded from `<slug>.toml`
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Slug of the provider backing this service
    pub fn provider(&self) -> &str {
        &self.config.provider.slug
    }

    /// Value of the `enable` flag
    pub fn is_enabled(&self) -> bool {
        self.config.enable
    }

    /// Lock guarding this service
    pub fn lock(&self) -> &ServiceLock {
        &self.lock
    }

    /// Whether a lifecycle operation is running or the service is settling
    pub fn is_busy(&self) -> bool {
        self.lock.is_locked()
    }

    /// Whether the backend artifacts exist
    pub async fn is_installed(&self) -> Result<bool> {
        self.backend.is_installed().await
    }

    /// Current status, served from cache while fresh
    pub async fn status(&self) -> Result<ServiceStatus> {
        if let Some(status) = self.status_cache.get() {
            debug!(service = %self.slug, %status, "Status cache hit");
            return Ok(status);
        }

        let status = self.backend.status().await?;
        self.status_cache.put(status);
        Ok(status)
    }

    /// Drop the cached status so the next [`status`](Self::status) queries the backend
    pub fn invalidate_status(&self) {
        self.status_cache.clear();
    }

    /// Install the service, waiting for the lock
    pub async fn install(&self) -> Result<()> {
        self.run(LifecycleOp::Install).await
    }

    /// Uninstall the service, waiting for the lock
    pub async fn uninstall(&self) -> Result<()> {
        self.run(LifecycleOp::Uninstall).await
    }

    /// Start the service, waiting for the lock
    pub async fn start(&self) -> Result<()> {
        self.run(LifecycleOp::Start).await
    }

    /// Stop the service, waiting for the lock
    pub async fn stop(&self) -> Result<()> {
        self.run(LifecycleOp::Stop).await
    }

    /// Restart the service, waiting for the lock
    pub async fn restart(&self) -> Result<()> {
        self.run(LifecycleOp::Restart).await
    }

    /// Acquire the lock, run `op` and release
    pub async fn run(&self, op: LifecycleOp) -> Result<()> {
        let guard = self.lock.acquire().await?;
        self.finish(op, guard).await
    }

    /// Acquire the lock within `max_wait`, run `op` and release
    ///
    /// Only the wait for the lock is bounded. Once acquired, the operation
    /// runs to completion so the lock is never given up while the backend is
    /// still working. Fails with [`Error::LockTimeout`] if the lock stays
    /// busy for longer than `max_wait`.
    pub async fn run_with_timeout(&self, op: LifecycleOp, max_wait: Duration) -> Result<()> {
        let guard = timeout(max_wait, self.lock.acquire())
            .await
            .map_err(|_| Error::LockTimeout {
                slug: self.slug.clone(),
                waited: max_wait,
            })??;
        self.finish(op, guard).await
    }

    /// Run `op` only if the lock is free right now
    ///
    /// Fails with [`Error::Busy`] while another operation holds the lock or
    /// the service is cooling down.
    pub async fn try_run(&self, op: LifecycleOp) -> Result<()> {
        let guard = self.lock.try_acquire()?;
        self.finish(op, guard).await
    }

    /// Run `op` under a guard the caller already holds
    ///
    /// The guard must come from this service's own lock. It is not released.
    pub async fn perform(&self, op: LifecycleOp, guard: &LockGuard<'_>) -> Result<()> {
        if !guard.belongs_to(&self.lock) {
            return Err(crate::LockError::ForeignGuard {
                slug: self.slug.clone(),
            }
            .into());
        }

        info!(service = %self.slug, operation = %op, "Running lifecycle operation");
        let result = match op {
            LifecycleOp::Install => {
                if self.backend.is_installed().await? {
                    Err(Error::AlreadyInstalled(self.slug.clone()))
                } else {
                    self.backend.install(guard).await
                }
            }
            LifecycleOp::Uninstall => {
                if self.backend.is_installed().await? {
                    self.backend.uninstall(guard).await
                } else {
                    Err(Error::NotInstalled(self.slug.clone()))
                }
            }
            LifecycleOp::Start => self.backend.start(guard).await,
            LifecycleOp::Stop => self.backend.stop(guard).await,
            LifecycleOp::Restart => self.backend.restart(guard).await,
        };
        self.invalidate_status();
        result
    }

    async fn finish(&self, op: LifecycleOp, guard: LockGuard<'_>) -> Result<()> {
        let result = self.perform(op, &guard).await;
        match (result, guard.release()) {
            (Ok(()), released) => released.map_err(Error::from),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_error)) => {
                warn!(
                    service = %self.slug,
                    error = %release_error,
                    "Failed to release lock after failed operation"
                );
                Err(e)
            }
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("slug", &self.slug)
            .field("provider", &self.config.provider.slug)
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Counters {
        installed: AtomicBool,
        status_calls: AtomicUsize,
        starts: AtomicUsize,
        fail_stop: AtomicBool,
    }

    struct FakeBackend(Arc<Counters>);

    #[derive(Debug, thiserror::Error)]
    #[error("stop exploded")]
    struct Boom;

    #[async_trait]
    impl ServiceBackend for FakeBackend {
        async fn is_installed(&self) -> Result<bool> {
            Ok(self.0.installed.load(Ordering::SeqCst))
        }

        async fn install(&self, guard: &LockGuard<'_>) -> Result<()> {
            self.0.installed.store(true, Ordering::SeqCst);
            guard.add_delay(Duration::from_millis(100));
            Ok(())
        }

        async fn uninstall(&self, _guard: &LockGuard<'_>) -> Result<()> {
            self.0.installed.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn start(&self, _guard: &LockGuard<'_>) -> Result<()> {
            self.0.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self, _guard: &LockGuard<'_>) -> Result<()> {
            if self.0.fail_stop.load(Ordering::SeqCst) {
                return Err(Error::service("fake", LifecycleOp::Stop, Boom));
            }
            Ok(())
        }

        async fn restart(&self, _guard: &LockGuard<'_>) -> Result<()> {
            Ok(())
        }

        async fn status(&self) -> Result<ServiceStatus> {
            self.0.status_calls.fetch_add(1, Ordering::SeqCst);
            if self.0.installed.load(Ordering::SeqCst) {
                Ok(ServiceStatus::Stopped)
            } else {
                Ok(ServiceStatus::NotFound)
            }
        }
    }

    fn root_config(dir: &Path, cache_secs: u64) -> RootConfig {
        let content = format!(
            r#"
[general]
version = "1.0.0"
root-domain = "example.com"
subdomain = "home"

[services]
lock-dir = "locks"
location = "services"
lock-poll-ms = 10
status-cache-secs = {cache_secs}
"#
        );
        let root = RootConfig::parse(&content, &dir.join("config.toml")).unwrap();
        std::fs::create_dir_all(&root.services.lock_dir).unwrap();
        root
    }

    fn service_config() -> ServiceConfig {
        ServiceConfig::parse(
            "[info]\nname = \"Fake\"\ndescription = \"\"\n[provider]\nslug = \"fake\"\n",
            Path::new("fake.toml"),
        )
        .unwrap()
    }

    fn fake_service(dir: &TempDir, cache_secs: u64) -> (Service, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let root = root_config(dir.path(), cache_secs);
        let service = Service::new(
            "fake",
            service_config(),
            &root,
            Box::new(FakeBackend(counters.clone())),
        );
        (service, counters)
    }

    #[smol_potat::test]
    async fn test_install_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (service, _) = fake_service(&dir, 5);

        assert!(!service.is_installed().await.unwrap());
        service.install().await.unwrap();
        assert!(service.is_installed().await.unwrap());

        let err = service.install().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyInstalled(ref slug) if slug == "fake"));
    }

    #[smol_potat::test]
    async fn test_uninstall_requires_install() {
        let dir = TempDir::new().unwrap();
        let (service, _) = fake_service(&dir, 5);

        let err = service.uninstall().await.unwrap_err();
        assert!(matches!(err, Error::NotInstalled(_)));
        assert!(!service.lock().path().exists());
    }

    #[smol_potat::test]
    async fn test_try_run_during_cooldown_is_busy() {
        let dir = TempDir::new().unwrap();
        let (service, _) = fake_service(&dir, 5);

        service.try_run(LifecycleOp::Install).await.unwrap();
        assert!(service.is_busy());

        let err = service.try_run(LifecycleOp::Start).await.unwrap_err();
        assert!(err.is_busy());

        // Waiting variant rides out the install cooldown
        service.start().await.unwrap();
    }

    #[smol_potat::test]
    async fn test_status_is_cached() {
        let dir = TempDir::new().unwrap();
        let (service, counters) = fake_service(&dir, 60);

        assert_eq!(service.status().await.unwrap(), ServiceStatus::NotFound);
        assert_eq!(service.status().await.unwrap(), ServiceStatus::NotFound);
        assert_eq!(counters.status_calls.load(Ordering::SeqCst), 1);

        service.invalidate_status();
        service.status().await.unwrap();
        assert_eq!(counters.status_calls.load(Ordering::SeqCst), 2);
    }

    #[smol_potat::test]
    async fn test_zero_ttl_disables_cache() {
        let dir = TempDir::new().unwrap();
        let (service, counters) = fake_service(&dir, 0);

        service.status().await.unwrap();
        service.status().await.unwrap();
        assert_eq!(counters.status_calls.load(Ordering::SeqCst), 2);
    }

    #[smol_potat::test]
    async fn test_operation_invalidates_status() {
        let dir = TempDir::new().unwrap();
        let (service, _) = fake_service(&dir, 60);

        assert_eq!(service.status().await.unwrap(), ServiceStatus::NotFound);
        service.install().await.unwrap();
        assert_eq!(service.status().await.unwrap(), ServiceStatus::Stopped);
    }

    #[smol_potat::test]
    async fn test_failed_operation_releases_lock() {
        let dir = TempDir::new().unwrap();
        let (service, counters) = fake_service(&dir, 5);
        counters.fail_stop.store(true, Ordering::SeqCst);

        let err = service.stop().await.unwrap_err();
        assert!(matches!(err, Error::Service { ref operation, .. } if operation == "stop"));
        assert!(!service.lock().path().exists());
        assert!(!service.is_busy());
    }

    #[smol_potat::test]
    async fn test_perform_under_caller_guard() {
        let dir = TempDir::new().unwrap();
        let (service, counters) = fake_service(&dir, 5);

        let guard = service.lock().acquire().await.unwrap();
        service.perform(LifecycleOp::Start, &guard).await.unwrap();
        service.perform(LifecycleOp::Start, &guard).await.unwrap();
        assert!(service.lock().is_held());
        guard.release().unwrap();

        assert_eq!(counters.starts.load(Ordering::SeqCst), 2);
    }

    #[smol_potat::test]
    async fn test_perform_rejects_foreign_guard() {
        let dir = TempDir::new().unwrap();
        let (service, counters) = fake_service(&dir, 5);
        let other = ServiceLock::new("other", dir.path());

        let guard = other.try_acquire().unwrap();
        let err = service.perform(LifecycleOp::Start, &guard).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Lock(crate::LockError::ForeignGuard { .. })
        ));
        assert_eq!(counters.starts.load(Ordering::SeqCst), 0);
    }
}
