//! Client configuration
//!
//! [`ClientConfig`] is the resolved, validated configuration every client
//! component reads from. [`ConfigParams`] carries explicit overrides; see
//! [`loader`] for how overrides, environment, config file and defaults are
//! layered.

pub mod loader;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use roe_common::BackoffPolicy;
use roe_domain::constants::{DEFAULT_BASE_URL, DEFAULT_REQUEST_ID_HEADER};
use roe_domain::{Result, RoeError};
use url::Url;

pub use loader::{load, load_from_env, load_from_file, load_with_env, FileConfig};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_INITIAL: Duration = Duration::from_millis(200);
pub const DEFAULT_RETRY_MAX: Duration = Duration::from_secs(2);
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_JITTER: f64 = 0.2;
pub const DEFAULT_MAX_IDLE_CONNS: usize = 100;
pub const DEFAULT_MAX_IDLE_CONNS_PER_HOST: usize = 10;
pub const DEFAULT_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(90);

/// Headers whose values never appear in debug logs unless overridden.
pub const DEFAULT_REDACT_HEADERS: [&str; 3] = ["Authorization", "X-API-Key", "X-Request-ID"];

/// Called with every outgoing request, after all headers are applied.
///
/// Errors and panics are logged and otherwise ignored.
pub type RequestHook = Arc<dyn Fn(&mut reqwest::Request) -> anyhow::Result<()> + Send + Sync>;

/// Called with every received response once its body has been read.
///
/// Errors and panics are logged and otherwise ignored.
pub type ResponseHook = Arc<dyn Fn(&HookResponse<'_>) -> anyhow::Result<()> + Send + Sync>;

/// View of a completed exchange handed to [`ResponseHook`]s.
#[derive(Debug)]
pub struct HookResponse<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

/// Resolved client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer token sent on every request.
    pub api_key: String,
    pub organization_id: String,
    pub base_url: String,
    /// Per-request timeout; zero disables it.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Log request and response details at debug level.
    pub debug: bool,
    /// Replaces any proxy taken from the environment.
    pub proxy: Option<Url>,
    /// Sent with every request, after the auth headers.
    pub extra_headers: HeaderMap,
    /// `None` disables request-id handling entirely.
    pub request_id_header: Option<String>,
    pub default_request_id: Option<String>,
    pub auto_request_id: bool,
    pub retry: BackoffPolicy,
    /// Total idle-connection budget. Loaded and reported when the transport
    /// is built; the pool itself enforces `max_idle_conns_per_host`.
    pub max_idle_conns: usize,
    pub max_idle_conns_per_host: usize,
    pub idle_conn_timeout: Duration,
    /// Header names masked in debug logs, matched case-insensitively.
    pub redact_headers: Vec<String>,
    pub request_hooks: Vec<RequestHook>,
    pub response_hooks: Vec<ResponseHook>,
}

impl ClientConfig {
    /// Configuration with every optional setting at its default.
    pub fn new(api_key: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            organization_id: organization_id.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            debug: false,
            proxy: None,
            extra_headers: HeaderMap::new(),
            request_id_header: Some(DEFAULT_REQUEST_ID_HEADER.to_owned()),
            default_request_id: None,
            auto_request_id: true,
            retry: BackoffPolicy::new(
                DEFAULT_RETRY_INITIAL,
                DEFAULT_RETRY_MAX,
                DEFAULT_RETRY_MULTIPLIER,
                DEFAULT_RETRY_JITTER,
            ),
            max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
            max_idle_conns_per_host: DEFAULT_MAX_IDLE_CONNS_PER_HOST,
            idle_conn_timeout: DEFAULT_IDLE_CONN_TIMEOUT,
            redact_headers: DEFAULT_REDACT_HEADERS.iter().map(|h| (*h).to_owned()).collect(),
            request_hooks: Vec::new(),
            response_hooks: Vec::new(),
        }
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-request timeout; zero disables it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many times a failed attempt is retried.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replace the backoff policy between attempts.
    #[must_use]
    pub fn with_retry(mut self, retry: BackoffPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Toggle request/response debug logging.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Append a hook run on each outgoing attempt.
    #[must_use]
    pub fn with_request_hook(mut self, hook: RequestHook) -> Self {
        self.request_hooks.push(hook);
        self
    }

    /// Append a hook run on each received response.
    #[must_use]
    pub fn with_response_hook(mut self, hook: ResponseHook) -> Self {
        self.response_hooks.push(hook);
        self
    }

    /// Check the invariants every client component relies on.
    ///
    /// # Errors
    /// Returns [`RoeError::Config`] naming the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(config_error("API key is required. Provide it or set ROE_API_KEY"));
        }
        if self.organization_id.trim().is_empty() {
            return Err(config_error(
                "Organization ID is required. Provide it or set ROE_ORGANIZATION_ID",
            ));
        }
        if self.retry.initial.is_zero() || self.retry.max.is_zero() {
            return Err(config_error("retry intervals must be positive"));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(config_error("retry multiplier must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(config_error("retry jitter must be between 0 and 1"));
        }
        Url::parse(&self.base_url)
            .map_err(|err| RoeError::Config(format!("invalid base URL {}: {err}", self.base_url)))?;
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"[redacted]")
            .field("organization_id", &self.organization_id)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("debug", &self.debug)
            .field("proxy", &self.proxy.as_ref().map(Url::as_str))
            .field("extra_headers", &self.extra_headers.len())
            .field("request_id_header", &self.request_id_header)
            .field("auto_request_id", &self.auto_request_id)
            .field("retry", &self.retry)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("max_idle_conns_per_host", &self.max_idle_conns_per_host)
            .field("idle_conn_timeout", &self.idle_conn_timeout)
            .field("request_hooks", &self.request_hooks.len())
            .field("response_hooks", &self.response_hooks.len())
            .finish_non_exhaustive()
    }
}

/// Explicit overrides; every `Some` beats the environment and config file.
#[derive(Clone, Default)]
pub struct ConfigParams {
    pub api_key: Option<String>,
    pub organization_id: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub debug: Option<bool>,
    pub proxy: Option<String>,
    /// Merged with `ROE_EXTRA_HEADERS`; these come first.
    pub extra_headers: HeaderMap,
    pub request_id_header: Option<String>,
    pub default_request_id: Option<String>,
    pub auto_request_id: Option<bool>,
    pub retry_initial: Option<Duration>,
    pub retry_max: Option<Duration>,
    pub retry_multiplier: Option<f64>,
    pub retry_jitter: Option<f64>,
    pub max_idle_conns: Option<usize>,
    pub max_idle_conns_per_host: Option<usize>,
    pub idle_conn_timeout: Option<Duration>,
    pub redact_headers: Option<Vec<String>>,
    /// Config file to read instead of `ROE_CONFIG`.
    pub config_file: Option<PathBuf>,
    pub request_hooks: Vec<RequestHook>,
    pub response_hooks: Vec<ResponseHook>,
}

impl fmt::Debug for ConfigParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigParams")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("organization_id", &self.organization_id)
            .field("base_url", &self.base_url)
            .field("config_file", &self.config_file)
            .finish_non_exhaustive()
    }
}

pub(crate) fn config_error(message: &str) -> RoeError {
    RoeError::Config(message.to_owned())
}
