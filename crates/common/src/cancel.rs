//! Cooperative cancellation for blocking client calls
//!
//! A [`CancelContext`] is passed into every operation that can wait: HTTP
//! calls, retry sleeps and poll sleeps. It combines an explicit
//! [`CancellationToken`] with an optional deadline, so a timeout is simply a
//! derived context that reports [`CancelReason::DeadlineExceeded`] once the
//! deadline has passed. Whichever of the two fires first wins.
//!
//! Deadlines are evaluated lazily at suspension points; no timer task is
//! spawned per context.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelReason {
    /// The token was cancelled explicitly (by the caller or a parent).
    #[error("context canceled")]
    Cancelled,
    /// The context deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline.
///
/// Cloning is cheap and clones observe the same token. Contexts derived with
/// [`CancelContext::with_timeout`] are cancelled when their parent is, but
/// cancelling a derived context leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelContext {
    /// A context that is never cancelled unless [`cancel`](Self::cancel) is
    /// called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token (e.g. one owned by an application shutdown
    /// handler).
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token, deadline: None }
    }

    /// The cancellation token this context observes.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline set by `with_timeout`/`with_deadline`, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Derive a child context that additionally expires after `timeout`.
    ///
    /// The effective deadline is the earlier of the parent's deadline and
    /// `now + timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        self.with_optional_deadline(candidate)
    }

    /// Derive a child context that expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.with_optional_deadline(Some(deadline))
    }

    fn with_optional_deadline(&self, candidate: Option<Instant>) -> Self {
        let deadline = match (self.deadline, candidate) {
            (Some(current), Some(candidate)) => Some(current.min(candidate)),
            (current, candidate) => current.or(candidate),
        };
        Self { token: self.token.child_token(), deadline }
    }

    /// Return the cancellation reason if this context is already done.
    pub fn check(&self) -> Result<(), CancelReason> {
        if self.token.is_cancelled() {
            return Err(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CancelReason::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Whether the context has been cancelled or its deadline has passed.
    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => CancelReason::Cancelled,
                    () = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    ///
    /// A context that is already done never polls `fut`.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, CancelReason>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            output = fut => Ok(output),
        }
    }

    /// Sleep for `delay`, returning early with the reason if the context
    /// finishes during the sleep.
    pub async fn sleep(&self, delay: Duration) -> Result<(), CancelReason> {
        if delay.is_zero() {
            return self.check();
        }
        self.run(tokio::time::sleep(delay)).await
    }
}
