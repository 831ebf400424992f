//! A minimal cooperative supervisor for the two long-lived retry loops the
//! daemon needs: the DRA registration poll and the NRI connection's
//! restart-on-failure loop. The whole contract either primitive needs is
//! "check a flag, maybe sleep" — that doesn't earn a scheduling crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

/// A `Clone`-able cancellation flag shared between the driver and whatever
/// tasks it supervises.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("cancelled before completion")]
    Cancelled,
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("exhausted {0} attempt(s)")]
    AttemptsExhausted(u32),
}

/// Polls `attempt` at `interval` until it returns `true`, `timeout` elapses,
/// or `token` is cancelled. Used for the DRA plugin registration wait.
pub async fn poll_until_ready<F>(
    mut attempt: F,
    interval: Duration,
    timeout: Duration,
    token: &CancellationToken,
) -> Result<(), SupervisorError>
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    loop {
        if token.is_cancelled() {
            return Err(SupervisorError::Cancelled);
        }
        if attempt() {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(SupervisorError::TimedOut(timeout));
        }
        tokio::time::sleep(interval).await;
    }
}

/// Runs `task` repeatedly until it succeeds or `token` is cancelled,
/// retrying up to `max_attempts` times with a fixed `backoff` between
/// tries. Blocking: callers on an async runtime should run this inside
/// `tokio::task::block_in_place` or `spawn_blocking`.
pub fn run_supervised_blocking<F, E>(
    max_attempts: u32,
    backoff: Duration,
    token: &CancellationToken,
    mut task: F,
) -> Result<(), SupervisorError>
where
    F: FnMut() -> Result<(), E>,
    E: std::fmt::Display,
{
    let mut attempts = 0;
    loop {
        if token.is_cancelled() {
            return Ok(());
        }
        match task() {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempts += 1;
                log::warn!("supervisor: task failed (attempt {attempts}/{max_attempts}): {err}");
                if attempts >= max_attempts {
                    return Err(SupervisorError::AttemptsExhausted(max_attempts));
                }
                if token.is_cancelled() {
                    return Ok(());
                }
                std::thread::sleep(backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn poll_until_ready_succeeds_once_attempt_returns_true() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        let result = poll_until_ready(
            || calls.fetch_add(1, Ordering::SeqCst) >= 2,
            Duration::from_millis(5),
            Duration::from_millis(500),
            &token,
        )
        .await;
        assert!(result.is_ok());
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn poll_until_ready_times_out() {
        let token = CancellationToken::new();
        let result =
            poll_until_ready(|| false, Duration::from_millis(5), Duration::from_millis(30), &token).await;
        assert_eq!(result, Err(SupervisorError::TimedOut(Duration::from_millis(30))));
    }

    #[tokio::test]
    async fn poll_until_ready_honours_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result =
            poll_until_ready(|| false, Duration::from_millis(5), Duration::from_secs(5), &token).await;
        assert_eq!(result, Err(SupervisorError::Cancelled));
    }

    #[test]
    fn run_supervised_blocking_succeeds_first_try() {
        let token = CancellationToken::new();
        let result: Result<(), SupervisorError> =
            run_supervised_blocking(5, Duration::from_millis(1), &token, || Ok::<(), String>(()));
        assert!(result.is_ok());
    }

    #[test]
    fn run_supervised_blocking_exhausts_attempts() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result = run_supervised_blocking(3, Duration::from_millis(1), &token, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("boom".to_string())
        });
        assert_eq!(result, Err(SupervisorError::AttemptsExhausted(3)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn run_supervised_blocking_stops_when_cancelled_mid_retry() {
        let token = CancellationToken::new();
        let cancel_token = token.clone();
        let attempts = AtomicU32::new(0);
        let result = run_supervised_blocking(10, Duration::from_millis(1), &token, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n == 1 {
                cancel_token.cancel();
            }
            Err::<(), _>("boom".to_string())
        });
        assert!(result.is_ok());
        assert!(attempts.load(Ordering::SeqCst) <= 3);
    }
}
