//! Single asynchronous job handle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use roe_common::{CancelContext, CancelReason};
use roe_domain::{JobResult, JobStatusInfo, Result, RoeError};
use tracing::debug;

use super::ports::JobsPort;
use super::{effective_interval, effective_timeout, handle_timeout, poll_ticker};

/// Handle to one submitted job.
///
/// Created only after the API accepted the submission. Cloning is cheap; the
/// handle holds no mutable state.
#[derive(Clone)]
pub struct Job {
    port: Arc<dyn JobsPort>,
    id: String,
    timeout: Duration,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).field("timeout", &self.timeout).finish()
    }
}

impl Job {
    /// `timeout` of `None` or zero falls back to two hours.
    pub fn new(port: Arc<dyn JobsPort>, id: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self { port, id: id.into(), timeout: handle_timeout(timeout) }
    }

    /// Server-assigned job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Deadline `wait` uses when given a zero timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the job status once.
    pub async fn retrieve_status(&self) -> Result<JobStatusInfo> {
        self.retrieve_status_with_context(&CancelContext::new()).await
    }

    /// Fetch the job status once, honoring `ctx`.
    pub async fn retrieve_status_with_context(&self, ctx: &CancelContext) -> Result<JobStatusInfo> {
        self.port.retrieve_status(ctx, &self.id).await
    }

    /// Fetch the job result once.
    pub async fn retrieve_result(&self) -> Result<JobResult> {
        self.retrieve_result_with_context(&CancelContext::new()).await
    }

    /// Fetch the job result once, honoring `ctx`.
    pub async fn retrieve_result_with_context(&self, ctx: &CancelContext) -> Result<JobResult> {
        self.port.retrieve_result(ctx, &self.id).await
    }

    /// Poll until the job is terminal and return its result.
    ///
    /// A zero `interval` polls every two seconds; a zero `timeout` uses the
    /// handle's timeout.
    pub async fn wait(&self, interval: Duration, timeout: Duration) -> Result<JobResult> {
        self.wait_with_context(&CancelContext::new(), interval, timeout).await
    }

    /// Poll until the job is terminal, the timeout elapses or `ctx` is
    /// cancelled.
    ///
    /// A job ending in `failure` or `cancelled` yields
    /// [`RoeError::JobFailed`] carrying the fetched result.
    pub async fn wait_with_context(
        &self,
        ctx: &CancelContext,
        interval: Duration,
        timeout: Duration,
    ) -> Result<JobResult> {
        let interval = effective_interval(interval);
        let ctx = ctx.with_timeout(effective_timeout(timeout, self.timeout));
        let mut ticker = poll_ticker(interval);

        loop {
            ctx.check().map_err(|reason| self.wait_cancelled(reason))?;

            let info = self.port.retrieve_status(&ctx, &self.id).await?;
            if info.status.is_terminal() {
                let result = self.port.retrieve_result(&ctx, &self.id).await?;
                if info.status.is_failure() {
                    return Err(RoeError::JobFailed {
                        job_id: self.id.clone(),
                        status: info.status,
                        result: Box::new(result),
                    });
                }
                debug!(job_id = %self.id, status = %info.status, "job finished");
                return Ok(result);
            }

            debug!(job_id = %self.id, status = %info.status, "job still running");
            tokio::select! {
                biased;
                reason = ctx.done() => return Err(self.wait_cancelled(reason)),
                _ = ticker.tick() => {}
            }
        }
    }

    fn wait_cancelled(&self, reason: CancelReason) -> RoeError {
        RoeError::JobWaitCancelled { job_id: self.id.clone(), reason }
    }
}
