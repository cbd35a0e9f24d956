//! Error types used throughout the client
//!
//! [`ApiError`] is one non-2xx response from the API, classified by
//! [`ApiErrorKind`]. [`RoeError`] is what every fallible client operation
//! returns; job and batch failures carry their partial results inside the
//! error so nothing fetched before the failure is thrown away.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use roe_common::CancelReason;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{JobResult, JobStatus};

/// Boxed connection-level failure raised below the HTTP status layer.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a non-2xx API response, derived from its status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// 400
    BadRequest,
    /// 401
    Authentication,
    /// 402
    InsufficientCredits,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 429, may carry a retry-after hint
    RateLimit,
    /// Any 5xx
    Server,
    /// Every other non-2xx status
    Other,
}

impl ApiErrorKind {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Authentication,
            402 => Self::InsufficientCredits,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimit,
            s if s >= 500 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Stable snake_case name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Authentication => "authentication",
            Self::InsufficientCredits => "insufficient_credits",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::RateLimit => "rate_limit",
            Self::Server => "server",
            Self::Other => "api",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-2xx response from the API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    kind: ApiErrorKind,
    status: u16,
    message: String,
    body: Vec<u8>,
    request_id: Option<String>,
    details: Map<String, Value>,
    retry_after: Option<Duration>,
}

impl ApiError {
    /// Build an error from a raw response.
    ///
    /// `retry_after` is kept only when the status maps to
    /// [`ApiErrorKind::RateLimit`]. An empty `request_id` counts as absent.
    pub fn from_parts(
        status: u16,
        body: &[u8],
        request_id: Option<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let kind = ApiErrorKind::from_status(status);
        let (message, details) = extract_message(status, body);
        Self {
            kind,
            status,
            message,
            body: body.to_vec(),
            request_id: request_id.filter(|id| !id.is_empty()),
            details,
            retry_after: if kind == ApiErrorKind::RateLimit { retry_after } else { None },
        }
    }

    /// Category derived from the HTTP status.
    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    /// HTTP status code of the failed response.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Server-provided message, or a generic one.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Raw response body, untouched.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Request id the failed call was sent with.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Decoded JSON object body; empty when the body was not a JSON object.
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    /// Server retry hint. Only rate-limit errors ever carry one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            ApiErrorKind::RateLimit => self.retry_after,
            _ => None,
        }
    }

    /// Statuses the transport retries: any 5xx, 408 and 429.
    pub fn is_retryable(&self) -> bool {
        is_retryable_status(self.status)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "api error ({}): {}", self.status, self.message)?;
        if let Some(id) = &self.request_id {
            write!(f, " (request_id={id})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Render an optional API error; `None` renders as an empty string.
pub fn render_api_error(err: Option<&ApiError>) -> String {
    err.map(ToString::to_string).unwrap_or_default()
}

/// Whether a response status warrants another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

fn extract_message(status: u16, body: &[u8]) -> (String, Map<String, Value>) {
    let fallback = || format!("HTTP {status}");
    if body.is_empty() {
        return (fallback(), Map::new());
    }

    let details = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let detail_message = ["detail", "message", "error"]
        .iter()
        .find_map(|key| details.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map(str::to_owned);
    if let Some(message) = detail_message {
        return (message, details);
    }

    let raw = String::from_utf8_lossy(body);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        (fallback(), details)
    } else {
        (trimmed.to_owned(), details)
    }
}

/// Main error type for client operations
#[derive(Debug, Error)]
pub enum RoeError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    #[error(transparent)]
    Cancelled(#[from] CancelReason),

    #[error("job {job_id} wait cancelled: {reason}")]
    JobWaitCancelled {
        job_id: String,
        #[source]
        reason: CancelReason,
    },

    #[error("job batch wait cancelled: {reason}")]
    BatchWaitCancelled {
        #[source]
        reason: CancelReason,
    },

    /// The job reached `failure` or `cancelled`; `result` is whatever the
    /// result endpoint returned for it.
    #[error("job {job_id} ended with status {status}")]
    JobFailed { job_id: String, status: JobStatus, result: Box<JobResult> },

    /// At least one batch job reached `failure` or `cancelled`. `results`
    /// holds every completed result in submission order.
    #[error("one or more jobs failed or were cancelled: [{}]", .job_ids.join(", "))]
    BatchFailed { job_ids: Vec<String>, results: Vec<JobResult> },

    #[error("job {job_id} result missing in batch response")]
    MissingBatchResult { job_id: String },

    #[error("jobs not found in {response} response: [{}]", .job_ids.join(", "))]
    MissingFromResponse { response: &'static str, job_ids: Vec<String> },

    #[error("job {job_id} not found or deleted")]
    JobNotFound { job_id: String },

    #[error("job {job_id}: decode {}: {source}", output_label(.index))]
    OutputDecode {
        job_id: String,
        index: Option<usize>,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("file {}: {message}", .path.display())]
    File { path: PathBuf, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

#[allow(clippy::ref_option)]
fn output_label(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!("output[{i}]"),
        None => "result as datum list".to_owned(),
    }
}

impl RoeError {
    /// Wrap a network-level failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<TransportError>,
    {
        Self::Transport(err.into())
    }

    /// Caller-side validation failure.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// The API error, when the server answered with a non-2xx status.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Shortcut for the kind of [`Self::api_error`].
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        self.api_error().map(ApiError::kind)
    }

    /// The underlying reason when the operation stopped because its context
    /// was cancelled or timed out.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Cancelled(reason)
            | Self::JobWaitCancelled { reason, .. }
            | Self::BatchWaitCancelled { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Whether the operation stopped on cancellation or deadline.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason().is_some()
    }

    /// True for API errors whose status the transport would retry.
    pub fn is_retryable_status(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_retryable)
    }

    /// Result attached to a single-job failure.
    pub fn partial_result(&self) -> Option<&JobResult> {
        match self {
            Self::JobFailed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Ordered results attached to a batch failure.
    pub fn partial_results(&self) -> Option<&[JobResult]> {
        match self {
            Self::BatchFailed { results, .. } => Some(results),
            _ => None,
        }
    }

    /// Ids of the jobs that ended in `failure` or `cancelled`.
    pub fn failed_job_ids(&self) -> Vec<&str> {
        match self {
            Self::JobFailed { job_id, .. } => vec![job_id.as_str()],
            Self::BatchFailed { job_ids, .. } => job_ids.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, RoeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, body: &str) -> ApiError {
        ApiError::from_parts(status, body.as_bytes(), None, None)
    }

    #[test]
    fn status_maps_to_kind() {
        let cases = [
            (400, ApiErrorKind::BadRequest),
            (401, ApiErrorKind::Authentication),
            (402, ApiErrorKind::InsufficientCredits),
            (403, ApiErrorKind::Forbidden),
            (404, ApiErrorKind::NotFound),
            (429, ApiErrorKind::RateLimit),
            (500, ApiErrorKind::Server),
            (503, ApiErrorKind::Server),
            (599, ApiErrorKind::Server),
            (405, ApiErrorKind::Other),
            (409, ApiErrorKind::Other),
            (418, ApiErrorKind::Other),
        ];
        for (status, kind) in cases {
            assert_eq!(api(status, "").kind(), kind, "status {status}");
        }
    }

    #[test]
    fn empty_body_uses_status_message() {
        let err = api(404, "");
        assert_eq!(err.message(), "HTTP 404");
        assert!(err.details().is_empty());
    }

    #[test]
    fn detail_key_has_priority() {
        let err = api(400, r#"{"error":"e","message":"m","detail":"d"}"#);
        assert_eq!(err.message(), "d");
        assert_eq!(err.details().len(), 3);

        let err = api(400, r#"{"error":"e","message":"m"}"#);
        assert_eq!(err.message(), "m");

        let err = api(400, r#"{"error":"e"}"#);
        assert_eq!(err.message(), "e");
    }

    #[test]
    fn empty_or_non_string_detail_is_skipped() {
        let err = api(400, r#"{"detail":"","message":"fallback"}"#);
        assert_eq!(err.message(), "fallback");

        let err = api(400, r#"{"detail":{"field":"bad"}}"#);
        assert_eq!(err.message(), r#"{"detail":{"field":"bad"}}"#);
        assert!(err.details().contains_key("detail"));
    }

    #[test]
    fn non_json_body_is_trimmed_text() {
        let err = api(502, "  upstream exploded \n");
        assert_eq!(err.message(), "upstream exploded");
        assert!(err.details().is_empty());
    }

    #[test]
    fn whitespace_body_falls_back_to_status() {
        assert_eq!(api(500, "   ").message(), "HTTP 500");
    }

    #[test]
    fn json_array_body_has_no_details() {
        let err = api(400, r#"["a","b"]"#);
        assert!(err.details().is_empty());
        assert_eq!(err.message(), r#"["a","b"]"#);
    }

    #[test]
    fn display_includes_request_id_when_present() {
        let err = ApiError::from_parts(
            401,
            br#"{"detail":"bad key"}"#,
            Some("roe-abc".to_owned()),
            None,
        );
        assert_eq!(err.to_string(), "api error (401): bad key (request_id=roe-abc)");

        let err = api(401, r#"{"detail":"bad key"}"#);
        assert_eq!(err.to_string(), "api error (401): bad key");

        let err = ApiError::from_parts(401, b"x", Some(String::new()), None);
        assert_eq!(err.request_id(), None);
    }

    #[test]
    fn render_absent_error_is_empty() {
        assert_eq!(render_api_error(None), "");
        let err = api(404, "");
        assert_eq!(render_api_error(Some(&err)), "api error (404): HTTP 404");
    }

    #[test]
    fn retry_after_only_on_rate_limit() {
        let hint = Some(Duration::from_secs(30));
        let limited = ApiError::from_parts(429, b"", None, hint);
        assert_eq!(limited.retry_after(), hint);

        let server = ApiError::from_parts(503, b"", None, hint);
        assert_eq!(server.retry_after(), None);
    }

    #[test]
    fn retryable_statuses() {
        assert!(api(500, "").is_retryable());
        assert!(api(408, "").is_retryable());
        assert!(api(429, "").is_retryable());
        assert!(!api(400, "").is_retryable());
        assert!(!api(404, "").is_retryable());
    }

    #[test]
    fn roe_error_accessors() {
        let err = RoeError::from(api(429, ""));
        assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimit));
        assert!(err.is_retryable_status());
        assert!(!err.is_cancelled());

        let err = RoeError::JobWaitCancelled {
            job_id: "job-1".to_owned(),
            reason: CancelReason::DeadlineExceeded,
        };
        assert!(err.is_cancelled());
        assert_eq!(err.cancel_reason(), Some(CancelReason::DeadlineExceeded));
        assert_eq!(err.to_string(), "job job-1 wait cancelled: context deadline exceeded");
    }

    #[test]
    fn batch_failure_exposes_partial_results() {
        let err = RoeError::BatchFailed {
            job_ids: vec!["job-2".to_owned(), "job-3".to_owned()],
            results: vec![JobResult::default()],
        };
        assert_eq!(err.to_string(), "one or more jobs failed or were cancelled: [job-2, job-3]");
        assert_eq!(err.partial_results().map(<[JobResult]>::len), Some(1));
        assert_eq!(err.failed_job_ids(), vec!["job-2", "job-3"]);
        assert!(err.partial_result().is_none());
    }

    #[test]
    fn job_failure_message_names_status() {
        let err = RoeError::JobFailed {
            job_id: "job-9".to_owned(),
            status: JobStatus::Failure,
            result: Box::default(),
        };
        assert_eq!(err.to_string(), "job job-9 ended with status failure");
        assert!(err.partial_result().is_some());
    }
}
