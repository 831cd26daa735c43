//! Advisory per-service lock with a post-release cooldown.
//!
//! A lock is an empty marker file `<lock-dir>/<slug>.lock`. The marker gives
//! mutual exclusion across processes. On top of it every [`ServiceLock`]
//! keeps a cooldown: operations that return before the workload has settled
//! (a container start, an image removal) declare extra delay with
//! [`ServiceLock::add_delay`], and the lock keeps reporting itself as locked
//! for that long after the marker is gone.
//!
//! The cooldown deadline is kept in memory and also written to
//! `<lock-dir>/<slug>.cooldown` as milliseconds since the Unix epoch, so
//! other processes and later runs honour it. An unreadable deadline file is
//! ignored.

use async_runtime_compat::sleep;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extension of the lock marker files
pub const LOCK_EXTENSION: &str = "lock";

/// Extension of the persisted cooldown deadline files
pub const COOLDOWN_EXTENSION: &str = "cooldown";

/// Default retry interval of [`ServiceLock::acquire`]
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors raised by the lock protocol
#[derive(Debug, Error)]
pub enum LockError {
    /// The marker exists or the cooldown window is active
    #[error("Service '{slug}' is busy")]
    Busy {
        /// Slug of the busy service
        slug: String,
    },

    /// Release was attempted but the marker is already gone
    #[error("Lock for service '{slug}' is not held: {} does not exist", path.display())]
    NotHeld {
        /// Slug of the service
        slug: String,
        /// Expected marker path
        path: PathBuf,
    },

    /// A guard of another lock was presented to a service
    #[error("Lock guard does not belong to service '{slug}'")]
    ForeignGuard {
        /// Slug of the service that rejected the guard
        slug: String,
    },

    /// Creating or removing the marker failed
    #[error("Lock marker I/O failed for {}: {source}", path.display())]
    Io {
        /// Marker path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default)]
struct LockState {
    /// Whether this instance created the current marker
    held: bool,
    last_release: Option<Instant>,
    /// Cooldown that applies after `last_release`
    cooldown: Duration,
    /// Delay accumulated during the current locked session
    pending_delay: Duration,
}

impl LockState {
    fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let released = self.last_release?;
        (released + self.cooldown)
            .checked_duration_since(now)
            .filter(|remaining| !remaining.is_zero())
    }
}

/// Mutual-exclusion token for one service slug
#[derive(Debug)]
pub struct ServiceLock {
    slug: String,
    path: PathBuf,
    cooldown_path: PathBuf,
    poll_interval: Duration,
    state: Mutex<LockState>,
}

impl ServiceLock {
    /// Create the lock for `slug` inside `lock_dir`
    ///
    /// Nothing is touched on disk until the lock is acquired.
    pub fn new(slug: impl Into<String>, lock_dir: &Path) -> Self {
        let slug = slug.into();
        let path = lock_dir.join(format!("{}.{}", slug, LOCK_EXTENSION));
        let cooldown_path = lock_dir.join(format!("{}.{}", slug, COOLDOWN_EXTENSION));
        Self {
            slug,
            path,
            cooldown_path,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: Mutex::new(LockState::default()),
        }
    }

    /// Set the retry interval used while waiting in [`acquire`](Self::acquire)
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Slug this lock protects
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Path of the marker file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the marker exists or the cooldown window is still open
    pub fn is_locked(&self) -> bool {
        self.path.exists() || self.cooldown_remaining().is_some()
    }

    /// Whether this instance currently holds the marker
    pub fn is_held(&self) -> bool {
        self.state().held
    }

    /// Time left in the post-release cooldown, if any
    ///
    /// The longer of this instance's own cooldown and the persisted one.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let local = self.state().cooldown_remaining(Instant::now());
        local.max(self.persisted_cooldown())
    }

    /// Wait until the lock is free, then take it
    ///
    /// Polls every poll interval. Only the calling task is suspended. There
    /// is no fairness between concurrent waiters and no built-in deadline;
    /// wrap the call in [`async_runtime_compat::timeout`] for a bounded wait.
    pub async fn acquire(&self) -> Result<LockGuard<'_>, LockError> {
        let mut waiting = false;
        loop {
            match self.try_acquire() {
                Ok(guard) => return Ok(guard),
                Err(LockError::Busy { .. }) => {
                    if !waiting {
                        debug!(service = %self.slug, "Waiting for service lock");
                        waiting = true;
                    }
                    sleep(self.poll_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Take the lock if it is free right now
    pub fn try_acquire(&self) -> Result<LockGuard<'_>, LockError> {
        if self.is_locked() {
            return Err(self.busy());
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => {
                let mut state = self.state();
                state.held = true;
                state.pending_delay = Duration::ZERO;
                debug!(service = %self.slug, path = %self.path.display(), "Acquired service lock");
                Ok(LockGuard {
                    lock: self,
                    released: false,
                })
            }
            // Another holder created the marker between the check and the open
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(self.busy()),
            Err(source) => Err(LockError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Extend the cooldown applied after the next release
    ///
    /// Calls within one locked session add up.
    pub fn add_delay(&self, delay: Duration) {
        let mut state = self.state();
        state.pending_delay += delay;
        debug!(
            service = %self.slug,
            delay_ms = delay.as_millis() as u64,
            total_ms = state.pending_delay.as_millis() as u64,
            "Extended lock cooldown"
        );
    }

    /// Remove the marker and start the cooldown window
    ///
    /// Releasing a lock whose marker is already gone is an error.
    pub fn release(&self) -> Result<(), LockError> {
        let removed = std::fs::remove_file(&self.path);
        let mut state = self.state();
        state.held = false;

        match removed {
            Ok(()) => {
                state.last_release = Some(Instant::now());
                state.cooldown = std::mem::take(&mut state.pending_delay);
                let cooldown = state.cooldown;
                drop(state);

                if cooldown.is_zero() {
                    debug!(service = %self.slug, "Released service lock");
                } else {
                    info!(
                        service = %self.slug,
                        cooldown_ms = cooldown.as_millis() as u64,
                        "Released service lock, cooling down"
                    );
                }
                self.persist_cooldown(cooldown);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(LockError::NotHeld {
                slug: self.slug.clone(),
                path: self.path.clone(),
            }),
            Err(source) => Err(LockError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn persisted_cooldown(&self) -> Option<Duration> {
        let content = std::fs::read_to_string(&self.cooldown_path).ok()?;
        let Ok(deadline_ms) = content.trim().parse::<u64>() else {
            debug!(path = %self.cooldown_path.display(), "Ignoring malformed cooldown file");
            return None;
        };
        (UNIX_EPOCH + Duration::from_millis(deadline_ms))
            .duration_since(SystemTime::now())
            .ok()
            .filter(|remaining| !remaining.is_zero())
    }

    /// Record the cooldown deadline for other processes, or clear a stale one
    fn persist_cooldown(&self, cooldown: Duration) {
        let result = if cooldown.is_zero() {
            match std::fs::remove_file(&self.cooldown_path) {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            }
        } else {
            let deadline = SystemTime::now() + cooldown;
            let deadline_ms = deadline
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis();
            std::fs::write(&self.cooldown_path, deadline_ms.to_string())
        };

        // The marker is already gone; a lost deadline only shortens the cooldown
        if let Err(e) = result {
            warn!(
                service = %self.slug,
                path = %self.cooldown_path.display(),
                error = %e,
                "Failed to persist lock cooldown"
            );
        }
    }

    fn busy(&self) -> LockError {
        LockError::Busy {
            slug: self.slug.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped ownership of a [`ServiceLock`]
///
/// The lock is released when the guard is dropped. Call
/// [`release`](LockGuard::release) to observe release errors instead of
/// having them logged.
#[must_use = "dropping the guard releases the lock immediately"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a ServiceLock,
    released: bool,
}

impl LockGuard<'_> {
    /// Lock held by this guard
    pub fn lock(&self) -> &ServiceLock {
        self.lock
    }

    /// Extend the cooldown applied when this guard releases
    pub fn add_delay(&self, delay: Duration) {
        self.lock.add_delay(delay);
    }

    /// Release the lock now
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.lock.release()
    }

    pub(crate) fn belongs_to(&self, lock: &ServiceLock) -> bool {
        std::ptr::eq(self.lock, lock)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.lock.release() {
            warn!(service = %self.lock.slug, error = %e, "Failed to release service lock on drop");
        }
    }
}
