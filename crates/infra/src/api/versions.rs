//! Agent version endpoints.

use std::sync::Arc;

use roe_common::CancelContext;
use roe_domain::{AgentVersion, AgentVersionUpdate, ListVersionsParams, NewAgentVersion, Page, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::require_id;
use crate::http::{ApiRequest, HttpClient};

#[derive(Debug, Deserialize)]
struct CreatedVersion {
    id: String,
}

/// Client for `/v1/agents/{agent_id}/versions/`.
#[derive(Debug, Clone)]
pub struct VersionsClient {
    http: Arc<HttpClient>,
}

impl VersionsClient {
    /// Client over the shared transport.
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// [`Self::list_with_context`] without cancellation.
    pub async fn list(&self, agent_id: &str) -> Result<Vec<AgentVersion>> {
        self.list_with_context(&CancelContext::new(), agent_id).await
    }

    /// Every version of an agent. Without paging parameters the endpoint
    /// answers with a bare array.
    #[instrument(skip(self, ctx))]
    pub async fn list_with_context(&self, ctx: &CancelContext, agent_id: &str) -> Result<Vec<AgentVersion>> {
        require_id("agent_id", agent_id)?;
        let request = ApiRequest::get(format!("/v1/agents/{agent_id}/versions/"));
        self.http.send_json(ctx, &request, "agent versions").await
    }

    /// [`Self::list_paginated_with_context`] without cancellation.
    pub async fn list_paginated(
        &self,
        agent_id: &str,
        params: ListVersionsParams,
    ) -> Result<Page<AgentVersion>> {
        self.list_paginated_with_context(&CancelContext::new(), agent_id, params).await
    }

    /// One page of an agent's versions.
    #[instrument(skip(self, ctx))]
    pub async fn list_paginated_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        params: ListVersionsParams,
    ) -> Result<Page<AgentVersion>> {
        require_id("agent_id", agent_id)?;
        let mut request = ApiRequest::get(format!("/v1/agents/{agent_id}/versions/"));
        if let Some(page) = params.page.filter(|p| *p > 0) {
            request = request.query("page", page);
        }
        if let Some(page_size) = params.page_size.filter(|p| *p > 0) {
            request = request.query("page_size", page_size);
        }
        if let Some(supports_eval) = params.get_supports_eval {
            request = request.query("get_supports_eval", supports_eval);
        }
        self.http.send_json(ctx, &request, "agent version page").await
    }

    /// [`Self::retrieve_with_context`] without cancellation.
    pub async fn retrieve(
        &self,
        agent_id: &str,
        version_id: &str,
        get_supports_eval: Option<bool>,
    ) -> Result<AgentVersion> {
        self.retrieve_with_context(&CancelContext::new(), agent_id, version_id, get_supports_eval)
            .await
    }

    /// One version of an agent.
    #[instrument(skip(self, ctx))]
    pub async fn retrieve_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        version_id: &str,
        get_supports_eval: Option<bool>,
    ) -> Result<AgentVersion> {
        require_id("agent_id", agent_id)?;
        require_id("version_id", version_id)?;
        let path = format!("/v1/agents/{agent_id}/versions/{version_id}/");
        self.get_version(ctx, path, get_supports_eval).await
    }

    /// [`Self::retrieve_current_with_context`] without cancellation.
    pub async fn retrieve_current(
        &self,
        agent_id: &str,
        get_supports_eval: Option<bool>,
    ) -> Result<AgentVersion> {
        self.retrieve_current_with_context(&CancelContext::new(), agent_id, get_supports_eval).await
    }

    /// The version new runs of the agent use.
    #[instrument(skip(self, ctx))]
    pub async fn retrieve_current_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        get_supports_eval: Option<bool>,
    ) -> Result<AgentVersion> {
        require_id("agent_id", agent_id)?;
        let path = format!("/v1/agents/{agent_id}/versions/current/");
        self.get_version(ctx, path, get_supports_eval).await
    }

    /// [`Self::create_with_context`] without cancellation.
    pub async fn create(&self, agent_id: &str, version: &NewAgentVersion) -> Result<AgentVersion> {
        self.create_with_context(&CancelContext::new(), agent_id, version).await
    }

    /// Create a version, then fetch it in full. The create endpoint only
    /// answers with the new id.
    #[instrument(skip(self, ctx, version))]
    pub async fn create_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        version: &NewAgentVersion,
    ) -> Result<AgentVersion> {
        require_id("agent_id", agent_id)?;
        let request = ApiRequest::post(format!("/v1/agents/{agent_id}/versions/")).json(version)?;
        let created: CreatedVersion = self.http.send_json(ctx, &request, "created version").await?;
        debug!(version_id = %created.id, "agent version created");
        self.retrieve_with_context(ctx, agent_id, &created.id, None).await
    }

    /// [`Self::update_with_context`] without cancellation.
    pub async fn update(
        &self,
        agent_id: &str,
        version_id: &str,
        update: &AgentVersionUpdate,
    ) -> Result<()> {
        self.update_with_context(&CancelContext::new(), agent_id, version_id, update).await
    }

    /// Apply a partial update to a version.
    #[instrument(skip(self, ctx, update))]
    pub async fn update_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        version_id: &str,
        update: &AgentVersionUpdate,
    ) -> Result<()> {
        require_id("agent_id", agent_id)?;
        require_id("version_id", version_id)?;
        let request =
            ApiRequest::put(format!("/v1/agents/{agent_id}/versions/{version_id}/")).json(update)?;
        self.http.execute(ctx, &request).await?;
        Ok(())
    }

    /// [`Self::delete_with_context`] without cancellation.
    pub async fn delete(&self, agent_id: &str, version_id: &str) -> Result<()> {
        self.delete_with_context(&CancelContext::new(), agent_id, version_id).await
    }

    /// Delete a version.
    #[instrument(skip(self, ctx))]
    pub async fn delete_with_context(
        &self,
        ctx: &CancelContext,
        agent_id: &str,
        version_id: &str,
    ) -> Result<()> {
        require_id("agent_id", agent_id)?;
        require_id("version_id", version_id)?;
        let request = ApiRequest::delete(format!("/v1/agents/{agent_id}/versions/{version_id}/"));
        self.http.execute(ctx, &request).await?;
        Ok(())
    }

    async fn get_version(
        &self,
        ctx: &CancelContext,
        path: String,
        get_supports_eval: Option<bool>,
    ) -> Result<AgentVersion> {
        let mut request = ApiRequest::get(path);
        if let Some(supports_eval) = get_supports_eval {
            request = request.query("get_supports_eval", supports_eval);
        }
        self.http.send_json(ctx, &request, "agent version").await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use roe_common::BackoffPolicy;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ClientConfig;

    fn versions_client(server: &MockServer) -> VersionsClient {
        let config = ClientConfig::new("key", "org")
            .with_base_url(server.uri())
            .with_max_retries(0)
            .with_retry(BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5), 2.0, 0.0));
        VersionsClient::new(Arc::new(HttpClient::new(Arc::new(config)).unwrap()))
    }

    fn version_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "version_name": "v2",
            "input_definitions": [{"key": "doc", "data_type": "file"}],
            "engine_config": null,
            "base_agent": {"id": "a1", "name": "Reader"}
        })
    }

    #[tokio::test]
    async fn list_decodes_bare_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/agents/a1/versions/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([version_json("v1"), version_json("v2")])))
            .mount(&server)
            .await;

        let versions = versions_client(&server).list("a1").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].base_agent.id, "a1");
        assert!(versions[0].engine_config.is_empty());
    }

    #[tokio::test]
    async fn paginated_list_passes_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/agents/a1/versions/"))
            .and(query_param("page_size", "5"))
            .and(query_param("get_supports_eval", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1, "next": null, "previous": null, "results": [version_json("v1")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let params = ListVersionsParams { page: None, page_size: Some(5), get_supports_eval: Some(true) };
        let page = versions_client(&server).list_paginated("a1", params).await.unwrap();
        assert_eq!(page.results.len(), 1);
    }

    #[tokio::test]
    async fn create_fetches_the_new_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/agents/a1/versions/"))
            .and(body_json(json!({
                "input_definitions": [],
                "engine_config": {},
                "version_name": "v2"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "v2-id"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/agents/a1/versions/v2-id/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_json("v2-id")))
            .expect(1)
            .mount(&server)
            .await;

        let version = NewAgentVersion { version_name: Some("v2".to_owned()), ..NewAgentVersion::default() };
        let created = versions_client(&server).create("a1", &version).await.unwrap();

        assert_eq!(created.id, "v2-id");
        assert_eq!(created.input_definitions[0].key, "doc");
    }

    #[tokio::test]
    async fn current_version_and_update() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/agents/a1/versions/current/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_json("cur")))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/agents/a1/versions/cur/"))
            .and(body_json(json!({"description": "tuned"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = versions_client(&server);
        let current = client.retrieve_current("a1", None).await.unwrap();
        let update = AgentVersionUpdate { description: Some("tuned".to_owned()), ..AgentVersionUpdate::default() };
        client.update("a1", &current.id, &update).await.unwrap();
    }

    #[tokio::test]
    async fn not_found_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
            .mount(&server)
            .await;

        let err = versions_client(&server).delete("a1", "gone").await.unwrap_err();
        assert_eq!(err.api_kind(), Some(roe_domain::ApiErrorKind::NotFound));
        assert_eq!(err.to_string(), "api error (404): Not found.");
    }
}
