//! Job status, result, reference and data-deletion endpoints.
//!
//! [`JobsClient`] is also the [`JobsPort`] the pollers in `roe-core` run
//! against, so every `Job` and `JobBatch` handed out by the agents client
//! polls through this type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use roe_common::{chunk, CancelContext, MAX_BATCH_SIZE};
use roe_core::JobsPort;
use roe_domain::{
    JobDataDeleteResponse, JobResult, JobResultBatchEntry, JobStatusBatchEntry, JobStatusInfo,
    Result, RoeError,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};

use super::require_id;
use crate::http::{ApiRequest, HttpClient};

const STATUSES_PATH: &str = "/v1/agents/jobs/statuses/";
const RESULTS_PATH: &str = "/v1/agents/jobs/results/";

/// Entries of the batch endpoints, addressable by job id.
trait BatchEntry: DeserializeOwned {
    fn id(&self) -> &str;
}

impl BatchEntry for JobStatusBatchEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl BatchEntry for JobResultBatchEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Client for `/v1/agents/jobs/`.
#[derive(Debug, Clone)]
pub struct JobsClient {
    http: Arc<HttpClient>,
}

impl JobsClient {
    /// Client over the shared transport.
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// [`Self::retrieve_status_with_context`] without cancellation.
    pub async fn retrieve_status(&self, job_id: &str) -> Result<JobStatusInfo> {
        self.retrieve_status_with_context(&CancelContext::new(), job_id).await
    }

    /// Current status of one job.
    #[instrument(skip(self, ctx))]
    pub async fn retrieve_status_with_context(
        &self,
        ctx: &CancelContext,
        job_id: &str,
    ) -> Result<JobStatusInfo> {
        require_id("job_id", job_id)?;
        let request = ApiRequest::get(format!("/v1/agents/jobs/{job_id}/status/"));
        self.http.send_json(ctx, &request, "job status").await
    }

    /// [`Self::retrieve_result_with_context`] without cancellation.
    pub async fn retrieve_result(&self, job_id: &str) -> Result<JobResult> {
        self.retrieve_result_with_context(&CancelContext::new(), job_id).await
    }

    /// Result of one job; meaningful once it is terminal.
    #[instrument(skip(self, ctx))]
    pub async fn retrieve_result_with_context(
        &self,
        ctx: &CancelContext,
        job_id: &str,
    ) -> Result<JobResult> {
        require_id("job_id", job_id)?;
        let request = ApiRequest::get(format!("/v1/agents/jobs/{job_id}/result/"));
        self.http.send_json(ctx, &request, "job result").await
    }

    /// [`Self::retrieve_status_many_with_context`] without cancellation.
    pub async fn retrieve_status_many(&self, job_ids: &[String]) -> Result<Vec<JobStatusBatchEntry>> {
        self.retrieve_status_many_with_context(&CancelContext::new(), job_ids).await
    }

    /// Statuses for `job_ids`, one entry per id in request order.
    ///
    /// Ids are sent in chunks of at most 1000. Any id absent from every
    /// response fails the whole call with [`RoeError::MissingFromResponse`].
    #[instrument(skip(self, ctx, job_ids), fields(count = job_ids.len()))]
    pub async fn retrieve_status_many_with_context(
        &self,
        ctx: &CancelContext,
        job_ids: &[String],
    ) -> Result<Vec<JobStatusBatchEntry>> {
        self.fetch_many(ctx, STATUSES_PATH, "status", job_ids).await
    }

    /// [`Self::retrieve_result_many_with_context`] without cancellation.
    pub async fn retrieve_result_many(&self, job_ids: &[String]) -> Result<Vec<JobResultBatchEntry>> {
        self.retrieve_result_many_with_context(&CancelContext::new(), job_ids).await
    }

    /// Raw result entries for `job_ids`, one per id in request order.
    ///
    /// Same chunking and strictness as
    /// [`retrieve_status_many_with_context`](Self::retrieve_status_many_with_context).
    #[instrument(skip(self, ctx, job_ids), fields(count = job_ids.len()))]
    pub async fn retrieve_result_many_with_context(
        &self,
        ctx: &CancelContext,
        job_ids: &[String],
    ) -> Result<Vec<JobResultBatchEntry>> {
        self.fetch_many(ctx, RESULTS_PATH, "results", job_ids).await
    }

    /// [`Self::download_reference_with_context`] without cancellation.
    pub async fn download_reference(
        &self,
        job_id: &str,
        resource_id: &str,
        as_attachment: bool,
    ) -> Result<Bytes> {
        self.download_reference_with_context(&CancelContext::new(), job_id, resource_id, as_attachment)
            .await
    }

    /// Raw bytes of a reference (screenshot, HTML capture, ...) linked from
    /// a job's outputs. `as_attachment` asks the server for a download
    /// disposition.
    #[instrument(skip(self, ctx))]
    pub async fn download_reference_with_context(
        &self,
        ctx: &CancelContext,
        job_id: &str,
        resource_id: &str,
        as_attachment: bool,
    ) -> Result<Bytes> {
        require_id("job_id", job_id)?;
        require_id("resource_id", resource_id)?;
        let mut request = ApiRequest::get(format!("/v1/agents/jobs/{job_id}/references/{resource_id}/"));
        if as_attachment {
            request = request.query("download", "true");
        }
        self.http.execute(ctx, &request).await
    }

    /// [`Self::delete_data_with_context`] without cancellation.
    pub async fn delete_data(&self, job_id: &str) -> Result<JobDataDeleteResponse> {
        self.delete_data_with_context(&CancelContext::new(), job_id).await
    }

    /// Delete stored inputs and outputs of a finished job.
    #[instrument(skip(self, ctx))]
    pub async fn delete_data_with_context(
        &self,
        ctx: &CancelContext,
        job_id: &str,
    ) -> Result<JobDataDeleteResponse> {
        require_id("job_id", job_id)?;
        let request = ApiRequest::post(format!("/v1/agents/jobs/{job_id}/delete-data/"));
        let response: JobDataDeleteResponse =
            self.http.send_json(ctx, &request, "delete job data").await?;
        debug!(job_id, deleted = response.deleted_count, failed = response.failed_count, "job data deleted");
        Ok(response)
    }

    async fn fetch_many<T>(
        &self,
        ctx: &CancelContext,
        path: &str,
        response: &'static str,
        job_ids: &[String],
    ) -> Result<Vec<T>>
    where
        T: BatchEntry,
    {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }

        let positions: HashMap<&str, usize> =
            job_ids.iter().enumerate().map(|(index, id)| (id.as_str(), index)).collect();
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(job_ids.len()).collect();

        for ids in chunk(job_ids, MAX_BATCH_SIZE) {
            let request = ApiRequest::post(path).json(&json!({ "job_ids": ids }))?;
            let entries: Vec<T> = self.http.send_json(ctx, &request, response).await?;
            for entry in entries {
                if let Some(&index) = positions.get(entry.id()) {
                    slots[index] = Some(entry);
                }
            }
        }

        let missing: Vec<String> = job_ids
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        if !missing.is_empty() {
            return Err(RoeError::MissingFromResponse { response, job_ids: missing });
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

#[async_trait]
impl JobsPort for JobsClient {
    async fn retrieve_status(&self, ctx: &CancelContext, job_id: &str) -> Result<JobStatusInfo> {
        self.retrieve_status_with_context(ctx, job_id).await
    }

    async fn retrieve_result(&self, ctx: &CancelContext, job_id: &str) -> Result<JobResult> {
        self.retrieve_result_with_context(ctx, job_id).await
    }

    async fn retrieve_status_many(
        &self,
        ctx: &CancelContext,
        job_ids: &[String],
    ) -> Result<Vec<JobStatusBatchEntry>> {
        self.retrieve_status_many_with_context(ctx, job_ids).await
    }

    async fn retrieve_result_many(
        &self,
        ctx: &CancelContext,
        job_ids: &[String],
    ) -> Result<Vec<JobResultBatchEntry>> {
        self.retrieve_result_many_with_context(ctx, job_ids).await
    }
}
