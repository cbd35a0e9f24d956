//! Fan-out handle over many jobs submitted together.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use roe_common::CancelContext;
use roe_domain::{JobResult, JobStatus, Result, RoeError};
use tracing::debug;

use super::job::Job;
use super::ports::JobsPort;
use super::{effective_interval, effective_timeout, handle_timeout, poll_ticker};

/// Tracks a fixed, ordered set of job ids.
///
/// Results are always returned in submission order. Known statuses and
/// completed results are cached and only ever grow. Methods that touch the
/// caches take `&mut self`, so one handle has exactly one driver.
pub struct JobBatch {
    port: Arc<dyn JobsPort>,
    job_ids: Vec<String>,
    timeout: Duration,
    statuses: HashMap<String, JobStatus>,
    completed: HashMap<String, JobResult>,
}

impl fmt::Debug for JobBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobBatch")
            .field("job_ids", &self.job_ids)
            .field("timeout", &self.timeout)
            .field("completed", &self.completed.len())
            .finish()
    }
}

impl JobBatch {
    /// `timeout` of `None` or zero falls back to two hours.
    pub fn new(port: Arc<dyn JobsPort>, job_ids: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            port,
            job_ids,
            timeout: handle_timeout(timeout),
            statuses: HashMap::new(),
            completed: HashMap::new(),
        }
    }

    /// Job ids in submission order.
    pub fn job_ids(&self) -> &[String] {
        &self.job_ids
    }

    /// Number of jobs in the batch.
    pub fn len(&self) -> usize {
        self.job_ids.len()
    }

    /// Whether the batch holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.job_ids.is_empty()
    }

    /// Deadline `wait` uses when given a zero timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Independent handles for each job, sharing this batch's timeout.
    pub fn jobs(&self) -> Vec<Job> {
        self.job_ids
            .iter()
            .map(|id| Job::new(self.port.clone(), id.clone(), Some(self.timeout)))
            .collect()
    }

    /// Last status observed for `job_id`, without a remote call.
    pub fn known_status(&self, job_id: &str) -> Option<JobStatus> {
        self.statuses.get(job_id).copied()
    }

    /// Wait for every job without an external cancellation context.
    pub async fn wait(&mut self, interval: Duration, timeout: Duration) -> Result<Vec<JobResult>> {
        self.wait_with_context(&CancelContext::new(), interval, timeout).await
    }

    /// Poll until every job is terminal, then return results in submission
    /// order.
    ///
    /// If any job ended in `failure` or `cancelled` the error is
    /// [`RoeError::BatchFailed`], which still carries every result.
    pub async fn wait_with_context(
        &mut self,
        ctx: &CancelContext,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Vec<JobResult>> {
        let interval = effective_interval(interval);
        let ctx = ctx.with_timeout(effective_timeout(timeout, self.timeout));
        let mut ticker = poll_ticker(interval);

        let mut pending: Vec<String> =
            self.job_ids.iter().filter(|id| !self.completed.contains_key(*id)).cloned().collect();

        while !pending.is_empty() {
            ctx.check().map_err(|reason| RoeError::BatchWaitCancelled { reason })?;

            let ready = self.refresh_statuses(&ctx, &pending).await?;
            if !ready.is_empty() {
                self.collect_results(&ctx, &ready).await?;
                let done: HashSet<&String> = ready.iter().collect();
                pending.retain(|id| !done.contains(id));
            }

            debug!(pending = pending.len(), total = self.job_ids.len(), "job batch progress");
            if pending.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                reason = ctx.done() => return Err(RoeError::BatchWaitCancelled { reason }),
                _ = ticker.tick() => {}
            }
        }

        self.assemble()
    }

    /// Best-known status of every job.
    ///
    /// Only jobs without a terminal status are queried; terminal statuses
    /// are served from the cache.
    pub async fn retrieve_status(&mut self) -> Result<HashMap<String, JobStatus>> {
        self.retrieve_status_with_context(&CancelContext::new()).await
    }

    /// [`Self::retrieve_status`] honoring `ctx`.
    pub async fn retrieve_status_with_context(
        &mut self,
        ctx: &CancelContext,
    ) -> Result<HashMap<String, JobStatus>> {
        let unresolved: Vec<String> = self
            .job_ids
            .iter()
            .filter(|id| !self.known_status(id).is_some_and(JobStatus::is_terminal))
            .cloned()
            .collect();
        if !unresolved.is_empty() {
            self.refresh_statuses(ctx, &unresolved).await?;
        }

        Ok(self
            .job_ids
            .iter()
            .filter_map(|id| self.known_status(id).map(|status| (id.clone(), status)))
            .collect())
    }

    /// Query statuses for `ids`, record them and return the ids now terminal.
    async fn refresh_statuses(&mut self, ctx: &CancelContext, ids: &[String]) -> Result<Vec<String>> {
        let entries = self.port.retrieve_status_many(ctx, ids).await?;
        let mut ready = Vec::new();
        for entry in entries {
            let Some(status) = entry.status else { continue };
            if status.is_terminal() {
                ready.push(entry.id.clone());
            }
            self.statuses.insert(entry.id, status);
        }
        Ok(ready)
    }

    async fn collect_results(&mut self, ctx: &CancelContext, ready: &[String]) -> Result<()> {
        let entries = self.port.retrieve_result_many(ctx, ready).await?;
        let mut received = HashSet::with_capacity(entries.len());
        for entry in entries {
            let id = entry.id.clone();
            let result = entry.into_job_result()?;
            self.completed.insert(id.clone(), result);
            received.insert(id);
        }

        if let Some(missing) = ready.iter().find(|id| !received.contains(*id)) {
            return Err(RoeError::MissingBatchResult { job_id: missing.clone() });
        }
        Ok(())
    }

    fn assemble(&self) -> Result<Vec<JobResult>> {
        let results: Vec<JobResult> =
            self.job_ids.iter().filter_map(|id| self.completed.get(id).cloned()).collect();

        let failed: Vec<String> = self
            .job_ids
            .iter()
            .filter(|id| self.completed.contains_key(*id))
            .filter(|id| self.known_status(id).is_some_and(JobStatus::is_failure))
            .cloned()
            .collect();

        if failed.is_empty() {
            Ok(results)
        } else {
            Err(RoeError::BatchFailed { job_ids: failed, results })
        }
    }
}
