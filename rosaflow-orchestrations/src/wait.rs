//! Bounded condition polling with cancellation support.
//!
//! Every wait in the sagas (install, uninstall, health, nightly version
//! availability) goes through [`wait_for`]. The interval is fixed: the states
//! being watched are owned by remote systems that move on a scale of minutes.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default delay between two checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Maximum total time to wait
    pub timeout: Duration,
    /// Delay between checks
    pub interval: Duration,
}

impl WaitOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Why a wait ended without the condition becoming true
#[derive(Debug)]
pub enum WaitError<E> {
    /// The condition did not hold within the timeout
    Timeout { what: String, timeout: Duration },
    /// The caller cancelled the wait
    Cancelled { what: String },
    /// The check itself failed; no further attempts were made
    Check(E),
}

impl<E> WaitError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl<E: fmt::Display> fmt::Display for WaitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { what, timeout } => {
                write!(f, "{} not reached within {:?}", what, timeout)
            }
            Self::Cancelled { what } => write!(f, "wait for {} cancelled", what),
            Self::Check(e) => e.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for WaitError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Check(e) => e.source(),
            _ => None,
        }
    }
}

/// Poll `check` until it returns `Ok(true)`.
///
/// The first check runs immediately. An `Err` from `check` ends the wait at
/// once. A check still running at the deadline counts as a timeout, and a
/// cancelled token wins over both a pending check and a pending sleep.
pub async fn wait_for<F, Fut, E>(
    what: &str,
    options: WaitOptions,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<(), WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: fmt::Display,
{
    let deadline = Instant::now() + options.timeout;
    let timeout = || WaitError::Timeout {
        what: what.to_string(),
        timeout: options.timeout,
    };
    let cancelled = || WaitError::Cancelled {
        what: what.to_string(),
    };
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            outcome = tokio::time::timeout_at(deadline, check()) => outcome,
        };

        match outcome {
            Err(_elapsed) => return Err(timeout()),
            Ok(Ok(true)) => {
                debug!(what = %what, attempts, "Condition met");
                return Ok(());
            }
            Ok(Ok(false)) => {}
            Ok(Err(e)) => {
                warn!(what = %what, attempts, error = %e, "Condition check failed");
                return Err(WaitError::Check(e));
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(timeout());
        }
        let delay = options.interval.min(deadline - now);
        debug!(what = %what, attempts, delay_secs = delay.as_secs(), "Condition not met yet, waiting");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
