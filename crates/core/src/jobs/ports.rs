//! Port interface for job status and result retrieval

use async_trait::async_trait;
use roe_common::CancelContext;
use roe_domain::{JobResult, JobResultBatchEntry, JobStatusBatchEntry, JobStatusInfo, Result};

/// Remote job queries used by the pollers.
///
/// The batch methods must accept any number of ids (splitting into
/// server-sized chunks as needed) and return one entry per requested id.
#[async_trait]
pub trait JobsPort: Send + Sync {
    /// Fetch the status of one job
    async fn retrieve_status(&self, ctx: &CancelContext, job_id: &str) -> Result<JobStatusInfo>;

    /// Fetch the result of one job
    async fn retrieve_result(&self, ctx: &CancelContext, job_id: &str) -> Result<JobResult>;

    /// Fetch statuses for many jobs
    async fn retrieve_status_many(
        &self,
        ctx: &CancelContext,
        job_ids: &[String],
    ) -> Result<Vec<JobStatusBatchEntry>>;

    /// Fetch raw results for many jobs
    async fn retrieve_result_many(
        &self,
        ctx: &CancelContext,
        job_ids: &[String],
    ) -> Result<Vec<JobResultBatchEntry>>;
}
