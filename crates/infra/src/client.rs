//! Top-level client wiring.

use std::sync::Arc;

use roe_domain::Result;
use tracing::debug;

use crate::api::{AgentsClient, JobsClient, VersionsClient};
use crate::config::{self, ClientConfig, ConfigParams};
use crate::http::HttpClient;

/// Entry point to the Roe API.
///
/// Cloning is cheap; all clones share one connection pool and one
/// configuration.
#[derive(Debug, Clone)]
pub struct RoeClient {
    config: Arc<ClientConfig>,
    agents: AgentsClient,
    versions: VersionsClient,
    jobs: Arc<JobsClient>,
}

impl RoeClient {
    /// Build a client from an explicit configuration.
    ///
    /// # Errors
    /// Returns [`roe_domain::RoeError::Config`] when `config` fails
    /// validation or the transport cannot be built from it.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let http = Arc::new(HttpClient::new(Arc::clone(&config))?);
        let jobs = Arc::new(JobsClient::new(Arc::clone(&http)));
        let agents = AgentsClient::new(Arc::clone(&http), Arc::clone(&config), Arc::clone(&jobs));
        let versions = VersionsClient::new(http);

        debug!(base_url = %config.base_url, "roe client ready");
        Ok(Self { config, agents, versions, jobs })
    }

    /// Build a client from `ROE_*` environment variables and the optional
    /// config file.
    pub fn from_env() -> Result<Self> {
        Self::new(config::load_from_env()?)
    }

    /// Build a client from explicit overrides layered over the environment.
    pub fn with_params(params: ConfigParams) -> Result<Self> {
        Self::new(config::load(params)?)
    }

    /// Agent and run endpoints.
    pub fn agents(&self) -> &AgentsClient {
        &self.agents
    }

    /// Agent version endpoints.
    pub fn versions(&self) -> &VersionsClient {
        &self.versions
    }

    /// Job status, result and data endpoints.
    pub fn jobs(&self) -> &JobsClient {
        &self.jobs
    }

    /// The validated configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_credentials() {
        let err = RoeClient::new(ClientConfig::new("", "org")).unwrap_err();
        assert!(err.to_string().contains("API key is required"));
    }

    #[test]
    fn builds_from_explicit_config() {
        let client = RoeClient::new(ClientConfig::new("key", "org-1")).unwrap();
        assert_eq!(client.config().organization_id, "org-1");
        let copy = client.clone();
        assert_eq!(copy.config().api_key, "key");
    }
}
