//! Agent management and run submission.

use std::sync::Arc;
use std::time::Duration;

use roe_common::{chunk, CancelContext, MAX_BATCH_SIZE};
use roe_core::{Job, JobBatch, JobsPort};
use roe_domain::{AgentDatum, AgentUpdate, BaseAgent, NewAgent, Page, Result, RoeError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::jobs::JobsClient;
use super::require_id;
use crate::config::ClientConfig;
use crate::http::{ApiRequest, HttpClient};
use crate::upload::DynamicInputs;

/// Inputs of one job in a batch submission.
pub type BatchInputs = Map<String, Value>;

#[derive(Debug, Serialize)]
struct CreateAgentRequest<'a> {
    #[serde(flatten)]
    agent: &'a NewAgent,
    organization_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RunManyRequest<'a> {
    inputs: &'a [BatchInputs],
}

#[derive(Debug, Deserialize)]
struct DuplicateResponse {
    base_agent: BaseAgent,
}

/// Client for `/v1/agents/`.
#[derive(Debug, Clone)]
pub struct AgentsClient {
    http: Arc<HttpClient>,
    config: Arc<ClientConfig>,
    jobs: Arc<JobsClient>,
}

impl AgentsClient {
    /// Client over the shared transport; runs poll through `jobs`.
    pub fn new(http: Arc<HttpClient>, config: Arc<ClientConfig>, jobs: Arc<JobsClient>) -> Self {
        Self { http, config, jobs }
    }

    fn port(&self) -> Arc<dyn JobsPort> {
        self.jobs.clone()
    }

    // === Agent CRUD ===

    pub async fn list(&self, page: Option<u32>, page_size: Option<u32>) -> Result<Page<BaseAgent>> {
        self.list_with_context(&CancelContext::new(), page, page_size).await
    }

    /// One page of the organization's agents. Unset or zero paging values
    /// are left to the server.
    #[instrument(skip(self, ctx))]
    pub async fn list_with_context(
        &self,
        ctx: &CancelContext,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<BaseAgent>> {
        let mut request =
            ApiRequest::get("/v1/agents/").query("organization_id", &self.config.organization_id);
        if let Some(page) = page.filter(|p| *p > 0) {
            request = request.query("page", page);
        }
        if let Some(page_size) = page_size.filter(|p| *p > 0) {
            request = request.query("page_size", page_size);
        }

        let page: Page<BaseAgent> = self.http.send_json(ctx, &request, "agent list").await?;
        debug!(count = page.results.len(), total = page.count, "agents listed");
        Ok(page)
    }

    /// [`Self::retrieve_with_context`] without cancellation.
    pub async fn retrieve(&self, agent_id: &str) -> Result<BaseAgent> {
        self.retrieve_with_context(&CancelContext::new(), agent_id).await
    }

    /// One agent by id.
    #[instrument(skip(self, ctx))]
    pub async fn retrieve_with_context(&self, ctx: &CancelContext, agent_id: &str) -> Result<BaseAgent> {
        require_id("agent_id", agent_id)?;
        let request = ApiRequest::get(format!("/v1/agents/{agent_id}/"));
        self.http.send_json(ctx, &request, "agent").await
    }

    /// [`Self::create_with_context`] without cancellation.
    pub async fn create(&self, agent: &NewAgent) -> Result<BaseAgent> {
        self.create_with_context(&CancelContext::new(), agent).await
    }

    /// Create an agent in the configured organization.
    #[instrument(skip(self, ctx, agent), fields(name = %agent.name))]
    pub async fn create_with_context(&self, ctx: &CancelContext, agent: &NewAgent) -> Result<BaseAgent> {
        let payload =
            CreateAgentRequest { agent, organization_id: &self.config.organization_id };
        let request = ApiRequest::post("/v1/agents/").json(&payload)?;

        let created: BaseAgent = self.http.send_json(ctx, &request, "created agent").await?;
        debug!(agent_id = %created.id, "agent created");
        Ok(created)
    }

    /// [`Self::update_with_context`] without cancellation.
    pub async fn update(&self, agent_id: &str, update: &AgentUpdate) -> Result<BaseAgent> {
        self.update_with_context(&CancelContext::new(), agent_id, update).await
    }

    /// Replace an agent's mutable fields.
    #[instrument(skip(self, ctx, update))]
    pub async fn update_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        update: &AgentUpdate,
    ) -> Result<BaseAgent> {
        require_id("agent_id", agent_id)?;
        let request = ApiRequest::put(format!("/v1/agents/{agent_id}/")).json(update)?;
        self.http.send_json(ctx, &request, "updated agent").await
    }

    /// [`Self::delete_with_context`] without cancellation.
    pub async fn delete(&self, agent_id: &str) -> Result<()> {
        self.delete_with_context(&CancelContext::new(), agent_id).await
    }

    /// Delete an agent and its versions.
    #[instrument(skip(self, ctx))]
    pub async fn delete_with_context(&self, ctx: &CancelContext, agent_id: &str) -> Result<()> {
        require_id("agent_id", agent_id)?;
        self.http.execute(ctx, &ApiRequest::delete(format!("/v1/agents/{agent_id}/"))).await?;
        Ok(())
    }

    /// [`Self::duplicate_with_context`] without cancellation.
    pub async fn duplicate(&self, agent_id: &str) -> Result<BaseAgent> {
        self.duplicate_with_context(&CancelContext::new(), agent_id).await
    }

    /// Clone an agent; returns the new agent.
    #[instrument(skip(self, ctx))]
    pub async fn duplicate_with_context(&self, ctx: &CancelContext, agent_id: &str) -> Result<BaseAgent> {
        require_id("agent_id", agent_id)?;
        let request = ApiRequest::post(format!("/v1/agents/{agent_id}/duplicate/"));
        let response: DuplicateResponse = self.http.send_json(ctx, &request, "duplicated agent").await?;
        Ok(response.base_agent)
    }

    // === Runs ===

    pub async fn run(
        &self,
        agent_id: &str,
        inputs: DynamicInputs,
        timeout: Option<Duration>,
    ) -> Result<Job> {
        self.run_with_context(&CancelContext::new(), agent_id, inputs, timeout).await
    }

    /// Submit one asynchronous run. `agent_id` may also be a version id.
    ///
    /// The returned [`Job`] polls with `timeout` (two hours when `None` or
    /// zero).
    #[instrument(skip(self, ctx, inputs), fields(inputs = inputs.len()))]
    pub async fn run_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        inputs: DynamicInputs,
        timeout: Option<Duration>,
    ) -> Result<Job> {
        require_id("agent_id", agent_id)?;
        let path = format!("/v1/agents/run/{agent_id}/async/");
        self.submit(ctx, &path, inputs, timeout).await
    }

    /// [`Self::run_many_with_context`] without cancellation.
    pub async fn run_many(
        &self,
        agent_id: &str,
        batch_inputs: &[BatchInputs],
        timeout: Option<Duration>,
    ) -> Result<JobBatch> {
        self.run_many_with_context(&CancelContext::new(), agent_id, batch_inputs, timeout).await
    }

    /// Submit one job per element of `batch_inputs`, in chunks of at most
    /// 1000. Job ids keep the order of the inputs.
    ///
    /// A failing chunk aborts the submission; jobs from earlier chunks have
    /// already been accepted by the server.
    #[instrument(skip(self, ctx, batch_inputs), fields(count = batch_inputs.len()))]
    pub async fn run_many_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        batch_inputs: &[BatchInputs],
        timeout: Option<Duration>,
    ) -> Result<JobBatch> {
        require_id("agent_id", agent_id)?;
        if batch_inputs.is_empty() {
            return Err(RoeError::invalid_input("batch_inputs cannot be empty"));
        }

        let path = format!("/v1/agents/run/{agent_id}/async/many/");
        let mut job_ids = Vec::with_capacity(batch_inputs.len());
        for inputs in chunk(batch_inputs, MAX_BATCH_SIZE) {
            ctx.check()?;
            let request = ApiRequest::post(path.as_str()).json(&RunManyRequest { inputs: &inputs })?;
            let ids: Vec<String> = self.http.send_json(ctx, &request, "batch job ids").await?;
            job_ids.extend(ids);
        }

        debug!(agent_id, jobs = job_ids.len(), "batch submitted");
        Ok(JobBatch::new(self.port(), job_ids, timeout))
    }

    /// [`Self::run_sync_with_context`] without cancellation.
    pub async fn run_sync(&self, agent_id: &str, inputs: DynamicInputs) -> Result<Vec<AgentDatum>> {
        self.run_sync_with_context(&CancelContext::new(), agent_id, inputs).await
    }

    /// Run and wait server-side; returns the outputs directly.
    #[instrument(skip(self, ctx, inputs), fields(inputs = inputs.len()))]
    pub async fn run_sync_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        inputs: DynamicInputs,
    ) -> Result<Vec<AgentDatum>> {
        require_id("agent_id", agent_id)?;
        let body = self.http.post_inputs(ctx, &format!("/v1/agents/run/{agent_id}/"), inputs).await?;
        crate::http::decode_json(&body, "sync run outputs")
    }

    /// [`Self::run_version_with_context`] without cancellation.
    pub async fn run_version(
        &self,
        agent_id: &str,
        version_id: &str,
        inputs: DynamicInputs,
        timeout: Option<Duration>,
    ) -> Result<Job> {
        self.run_version_with_context(&CancelContext::new(), agent_id, version_id, inputs, timeout)
            .await
    }

    /// Submit one asynchronous run of a specific version.
    #[instrument(skip(self, ctx, inputs), fields(inputs = inputs.len()))]
    pub async fn run_version_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        version_id: &str,
        inputs: DynamicInputs,
        timeout: Option<Duration>,
    ) -> Result<Job> {
        require_id("agent_id", agent_id)?;
        require_id("version_id", version_id)?;
        let path = format!("/v1/agents/run/{agent_id}/versions/{version_id}/async/");
        self.submit(ctx, &path, inputs, timeout).await
    }

    /// [`Self::run_version_sync_with_context`] without cancellation.
    pub async fn run_version_sync(
        &self,
        agent_id: &str,
        version_id: &str,
        inputs: DynamicInputs,
    ) -> Result<Vec<AgentDatum>> {
        self.run_version_sync_with_context(&CancelContext::new(), agent_id, version_id, inputs).await
    }

    /// Run a specific version and wait server-side; returns the outputs directly.
    #[instrument(skip(self, ctx, inputs), fields(inputs = inputs.len()))]
    pub async fn run_version_sync_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        version_id: &str,
        inputs: DynamicInputs,
    ) -> Result<Vec<AgentDatum>> {
        require_id("agent_id", agent_id)?;
        require_id("version_id", version_id)?;
        let path = format!("/v1/agents/run/{agent_id}/versions/{version_id}/");
        let body = self.http.post_inputs(ctx, &path, inputs).await?;
        crate::http::decode_json(&body, "sync run outputs")
    }

    /// POST inputs to an async run endpoint; the response is a bare job id.
    async fn submit(
        &self,
        ctx: &CancelContext,
        path: &str,
        inputs: DynamicInputs,
        timeout: Option<Duration>,
    ) -> Result<Job> {
        let body = self.http.post_inputs(ctx, path, inputs).await?;
        let job_id: String = crate::http::decode_json(&body, "job id")?;
        debug!(job_id = %job_id, "job submitted");
        Ok(Job::new(self.port(), job_id, timeout))
    }
}
