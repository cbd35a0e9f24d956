//! Asynchronous job handles and their pollers.

pub mod batch;
pub mod job;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::JobBatch;
pub use job::Job;

use std::time::Duration;

use roe_domain::constants::{DEFAULT_JOB_TIMEOUT, DEFAULT_POLL_INTERVAL};

/// Zero means "use the handle's default timeout".
pub(crate) fn effective_timeout(requested: Duration, fallback: Duration) -> Duration {
    if requested.is_zero() {
        fallback
    } else {
        requested
    }
}

pub(crate) fn effective_interval(requested: Duration) -> Duration {
    if requested.is_zero() {
        DEFAULT_POLL_INTERVAL
    } else {
        requested
    }
}

/// Timeout a handle falls back to when none (or zero) was given at creation.
pub(crate) fn handle_timeout(timeout: Option<Duration>) -> Duration {
    timeout.filter(|t| !t.is_zero()).unwrap_or(DEFAULT_JOB_TIMEOUT)
}

/// Poll ticker whose first tick fires one `interval` from now. Ticks missed
/// while a remote call was in flight are not replayed in a burst.
pub(crate) fn poll_ticker(interval: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}
