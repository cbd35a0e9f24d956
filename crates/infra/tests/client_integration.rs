//! End-to-end client flows against a mock Roe server.

mod support;

use std::time::Duration;

use roe_domain::{JobStatus, RoeError};
use roe_infra::{BatchInputs, ClientConfig, DynamicInputs, FileUpload, RoeClient};
use serde_json::json;
use support::{client_for, result_entry, POLL};
use wiremock::matchers::{
    body_json, body_string_contains, header, header_exists, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn batch_inputs(values: &[&str]) -> Vec<BatchInputs> {
    values
        .iter()
        .map(|v| {
            let mut inputs = BatchInputs::new();
            inputs.insert("text".to_owned(), json!(v));
            inputs
        })
        .collect()
}

#[tokio::test]
async fn run_then_wait_polls_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/agents/run/agent-1/async/"))
        .and(header("Authorization", "Bearer test-key"))
        .and(header_exists("X-Request-ID"))
        .respond_with(ResponseTemplate::new(200).set_body_json("job-1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/jobs/job-1/status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/jobs/job-1/status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 3})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/jobs/job-1/result/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "agent_id": "agent-1",
            "agent_version_id": "version-1",
            "inputs": [],
            "outputs": [{"key": "summary", "value": "short"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let job = client
        .agents()
        .run("agent-1", DynamicInputs::new().with("text", "hello"), None)
        .await
        .unwrap();
    assert_eq!(job.id(), "job-1");

    let result = job.wait(POLL, Duration::from_secs(5)).await.unwrap();
    assert_eq!(result.outputs[0].value, "short");
}

#[tokio::test]
async fn failed_job_keeps_its_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/agents/run/agent-1/async/"))
        .respond_with(ResponseTemplate::new(200).set_body_json("job-9"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/jobs/job-9/status/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": 4, "error_message": "boom"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/jobs/job-9/result/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "agent_id": "agent-1", "agent_version_id": "version-1", "outputs": []
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let job = client.agents().run("agent-1", DynamicInputs::new(), None).await.unwrap();
    let err = job.wait(POLL, Duration::from_secs(5)).await.unwrap_err();

    match &err {
        RoeError::JobFailed { job_id, status, result } => {
            assert_eq!(job_id, "job-9");
            assert_eq!(*status, JobStatus::Failure);
            assert_eq!(result.agent_version_id, "version-1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.partial_result().is_some());
}

#[tokio::test]
async fn batch_results_follow_submission_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/agents/run/agent-1/async/many/"))
        .and(body_json(json!({"inputs": [{"text": "first"}, {"text": "second"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["j1", "j2"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/agents/jobs/statuses/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "j2", "status": 3},
            {"id": "j1", "status": 6}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/agents/jobs/results/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            result_entry("j2", 3, "second"),
            result_entry("j1", 6, "first")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut batch = client
        .agents()
        .run_many("agent-1", &batch_inputs(&["first", "second"]), None)
        .await
        .unwrap();
    assert_eq!(batch.job_ids(), ["j1", "j2"]);

    let results = batch.wait(POLL, Duration::from_secs(5)).await.unwrap();
    let values: Vec<&str> = results.iter().map(|r| r.outputs[0].value.as_str()).collect();
    assert_eq!(values, ["first", "second"]);
}

#[tokio::test]
async fn batch_failure_reports_ids_and_partial_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/agents/run/agent-1/async/many/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["ok", "bad"])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/agents/jobs/statuses/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "ok", "status": 3},
            {"id": "bad", "status": 5}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/agents/jobs/results/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            result_entry("ok", 3, "fine"),
            result_entry("bad", 5, "")
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut batch =
        client.agents().run_many("agent-1", &batch_inputs(&["a", "b"]), None).await.unwrap();
    let err = batch.wait(POLL, Duration::from_secs(5)).await.unwrap_err();

    assert_eq!(err.failed_job_ids(), ["bad"]);
    assert_eq!(err.partial_results().map(|results| results.len()), Some(2));
    assert_eq!(err.to_string(), "one or more jobs failed or were cancelled: [bad]");
}

#[tokio::test]
async fn file_inputs_are_sent_as_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/agents/run/agent-1/"))
        .and(body_string_contains("name=\"document\"; filename=\"notes.txt\""))
        .and(body_string_contains("quarterly numbers"))
        .and(body_string_contains("name=\"mode\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"key": "summary", "data_type": "text/plain", "value": "numbers went up"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let inputs = DynamicInputs::new()
        .with("document", FileUpload::from_bytes(&b"quarterly numbers"[..]).with_filename("notes.txt"))
        .with("mode", "brief");
    let outputs = client.agents().run_sync("agent-1", inputs).await.unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].value, "numbers went up");
}

#[tokio::test]
async fn server_errors_are_retried_then_surface() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/agent-1/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.agents().retrieve("agent-1").await.unwrap_err();

    assert_eq!(err.api_error().map(|e| e.status()), Some(503));
    assert!(err.is_retryable_status());
}

#[tokio::test]
async fn debug_logging_leaves_requests_intact() {
    support::init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/agent-1/versions/current/"))
        .and(query_param("get_supports_eval", "true"))
        .and(header("Authorization", "Bearer secret-key"))
        .and(header("X-Request-ID", "trace-me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "version-3",
            "version_name": "v3",
            "base_agent": {"id": "agent-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config =
        ClientConfig::new("secret-key", "org-1").with_base_url(server.uri()).with_debug(true);
    config.default_request_id = Some("trace-me".to_owned());
    let client = RoeClient::new(config).unwrap();

    let version = client.versions().retrieve_current("agent-1", Some(true)).await.unwrap();
    assert_eq!(version.version_name, "v3");
}
