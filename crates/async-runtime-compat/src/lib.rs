//! Runtime-agnostic async timers
//!
//! The supervisor libraries never pick an executor themselves. Lock polling
//! and bounded waits go through this crate, and the binary decides which
//! runtime backs them by enabling exactly one of the `smol` or `tokio`
//! features. When both are enabled, smol wins.
//!
//! # Examples
//!
//! ```no_run
//! use async_runtime_compat::{sleep, timeout};
//! use std::time::Duration;
//!
//! # #[cfg(feature = "smol")]
//! smol::block_on(async {
//!     sleep(Duration::from_millis(10)).await;
//!     let answer = timeout(Duration::from_secs(1), async { 42 }).await;
//!     assert_eq!(answer.ok(), Some(42));
//! });
//! ```

#![warn(missing_docs)]

use futures::future::{self, Either};
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

/// Sleep for the specified duration using the enabled runtime
pub async fn sleep(duration: Duration) {
    #[cfg(feature = "smol")]
    {
        smol::Timer::after(duration).await;
    }

    #[cfg(all(feature = "tokio", not(feature = "smol")))]
    {
        tokio::time::sleep(duration).await;
    }

    #[cfg(not(any(feature = "smol", feature = "tokio")))]
    {
        let _ = duration;
        compile_error!("One of the runtime features must be enabled: smol or tokio");
    }
}

/// Error returned by [`timeout`] when the deadline passes first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(Duration);

impl Elapsed {
    /// The deadline that was exceeded
    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadline of {:?} elapsed", self.0)
    }
}

impl std::error::Error for Elapsed {}

/// Run `future` to completion unless `duration` passes first
///
/// The future is dropped when the deadline wins, so anything it holds (for
/// example a lock guard) is released through its `Drop` impl.
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    let future = pin!(future);
    let deadline = pin!(sleep(duration));

    match future::select(future, deadline).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(Elapsed(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[smol_potat::test]
    async fn test_sleep_waits_at_least_duration() {
        let start = Instant::now();
        sleep(Duration::from_millis(50)).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[smol_potat::test]
    async fn test_timeout_returns_output() {
        let result = timeout(Duration::from_secs(1), async { "done" }).await;
        assert_eq!(result, Ok("done"));
    }

    #[smol_potat::test]
    async fn test_timeout_elapses() {
        let result = timeout(
            Duration::from_millis(20),
            sleep(Duration::from_secs(5)),
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.duration(), Duration::from_millis(20));
        assert_eq!(err.to_string(), "deadline of 20ms elapsed");
    }
}
