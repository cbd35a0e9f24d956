//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use roe_common::BackoffPolicy;
use roe_infra::{ClientConfig, RoeClient};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use wiremock::MockServer;

pub const POLL: Duration = Duration::from_millis(10);

/// Route client logs to the test harness output. Repeat calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roe_infra=debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// Client pointed at `server` with millisecond backoff.
pub fn client_for(server: &MockServer) -> RoeClient {
    let config = ClientConfig::new("test-key", "org-1")
        .with_base_url(server.uri())
        .with_max_retries(2)
        .with_retry(BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5), 2.0, 0.0));
    RoeClient::new(config).expect("client should build")
}

/// A batch result entry whose single output is `value`.
pub fn result_entry(id: &str, status: u8, value: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "agent_id": "agent-1",
        "agent_version_id": "version-1",
        "inputs": [],
        "result": [{"key": "answer", "data_type": "text/plain", "value": value}]
    })
}
