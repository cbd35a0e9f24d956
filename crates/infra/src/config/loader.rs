//! Configuration loader
//!
//! Resolves a [`ClientConfig`] from four layers, highest priority first:
//!
//! 1. Explicit [`ConfigParams`]
//! 2. Environment variables
//! 3. An optional config file (`ConfigParams::config_file` or `ROE_CONFIG`)
//! 4. Built-in defaults
//!
//! ## Environment Variables
//! - `ROE_API_KEY`, `ROE_ORGANIZATION_ID`: credentials (required)
//! - `ROE_BASE_URL`: API root
//! - `ROE_TIMEOUT`, `ROE_IDLE_CONN_TIMEOUT`: durations, bare numbers are seconds
//! - `ROE_RETRY_INITIAL_MS`, `ROE_RETRY_MAX_MS`: durations, bare numbers are
//!   milliseconds
//! - `ROE_MAX_RETRIES`, `ROE_MAX_IDLE_CONNS`, `ROE_MAX_IDLE_CONNS_PER_HOST`:
//!   integers
//! - `ROE_RETRY_MULTIPLIER`, `ROE_RETRY_JITTER`: floats
//! - `ROE_DEBUG`, `ROE_AUTO_REQUEST_ID`: booleans (`1`, `t`, `true`, `0`,
//!   `f`, `false`, any case)
//! - `ROE_PROXY`: proxy URL
//! - `ROE_EXTRA_HEADERS`: `Name:Value` or `Name=Value` entries separated by
//!   `;`, `,` or newlines
//! - `ROE_REQUEST_ID`, `ROE_REQUEST_ID_HEADER`: request-id handling
//! - `ROE_CONFIG`: path of a JSON or TOML config file
//!
//! ## Config File
//! The file uses the same settings in snake_case without the `ROE_` prefix
//! (`api_key`, `retry_initial_ms`, ...). `extra_headers` is a table.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use roe_common::BackoffPolicy;
use roe_domain::{Result, RoeError};
use serde::Deserialize;
use url::Url;

use super::{
    config_error, ClientConfig, ConfigParams, DEFAULT_RETRY_INITIAL, DEFAULT_RETRY_JITTER,
    DEFAULT_RETRY_MAX, DEFAULT_RETRY_MULTIPLIER,
};

/// Resolve configuration from `params`, the process environment and the
/// optional config file.
///
/// # Errors
/// Returns [`RoeError::Config`] when a value cannot be parsed or the result
/// fails [`ClientConfig::validate`].
pub fn load(params: ConfigParams) -> Result<ClientConfig> {
    load_with_env(params, |key| std::env::var(key).ok())
}

/// Resolve configuration from the environment alone.
///
/// # Errors
/// See [`load`].
pub fn load_from_env() -> Result<ClientConfig> {
    load(ConfigParams::default())
}

/// Like [`load`], reading environment variables through `env`.
///
/// # Errors
/// See [`load`].
pub fn load_with_env<F>(params: ConfigParams, env: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file_path = params
        .config_file
        .clone()
        .or_else(|| non_empty(env("ROE_CONFIG")).map(PathBuf::from));
    let file = match file_path {
        Some(path) => load_from_file(&path)?,
        None => FileConfig::default(),
    };
    let settings = Settings { env: &env, file: file.settings() };
    let retry = resolve_retry(&params, &settings)?;

    let mut config = ClientConfig::new(
        params.api_key.or_else(|| settings.get("ROE_API_KEY")).unwrap_or_default(),
        params.organization_id.or_else(|| settings.get("ROE_ORGANIZATION_ID")).unwrap_or_default(),
    );

    if let Some(base_url) = params.base_url.or_else(|| settings.get("ROE_BASE_URL")) {
        config.base_url = base_url;
    }

    if let Some(timeout) = params.timeout {
        config.timeout = timeout;
    } else if let Some(raw) = settings.get("ROE_TIMEOUT") {
        let secs = parse_duration_secs("ROE_TIMEOUT", &raw, DurationUnit::Seconds)?;
        config.timeout = non_negative(secs, "timeout must be non-negative")?;
    }

    if let Some(max_retries) = params.max_retries {
        config.max_retries = max_retries;
    } else if let Some(raw) = settings.get("ROE_MAX_RETRIES") {
        config.max_retries = parse_count("ROE_MAX_RETRIES", &raw, "max retries must be >= 0")?;
    }

    if let Some(debug) = params.debug {
        config.debug = debug;
    } else if let Some(raw) = settings.get("ROE_DEBUG") {
        config.debug = parse_bool("ROE_DEBUG", &raw)?;
    }

    if let Some(raw) = params.proxy.or_else(|| settings.get("ROE_PROXY")) {
        let proxy = Url::parse(&raw)
            .map_err(|err| RoeError::Config(format!("invalid proxy URL {raw}: {err}")))?;
        config.proxy = Some(proxy);
    }

    config.extra_headers = params.extra_headers;
    match settings.get("ROE_EXTRA_HEADERS") {
        Some(raw) => append_headers(&mut config.extra_headers, parse_header_list(&raw)?)?,
        None => append_headers(&mut config.extra_headers, file.header_entries())?,
    }

    if let Some(header) = params.request_id_header.or_else(|| settings.get("ROE_REQUEST_ID_HEADER"))
    {
        config.request_id_header = Some(header);
    }
    config.default_request_id =
        params.default_request_id.or_else(|| settings.get("ROE_REQUEST_ID"));
    if let Some(auto) = params.auto_request_id {
        config.auto_request_id = auto;
    } else if let Some(raw) = settings.get("ROE_AUTO_REQUEST_ID") {
        config.auto_request_id = parse_bool("ROE_AUTO_REQUEST_ID", &raw)?;
    }

    config.retry = retry;

    if let Some(max) = params.max_idle_conns {
        config.max_idle_conns = max;
    } else if let Some(raw) = settings.get("ROE_MAX_IDLE_CONNS") {
        config.max_idle_conns =
            parse_count("ROE_MAX_IDLE_CONNS", &raw, "max idle conns must be >= 0")?;
    }
    if let Some(max) = params.max_idle_conns_per_host {
        config.max_idle_conns_per_host = max;
    } else if let Some(raw) = settings.get("ROE_MAX_IDLE_CONNS_PER_HOST") {
        config.max_idle_conns_per_host =
            parse_count("ROE_MAX_IDLE_CONNS_PER_HOST", &raw, "max idle conns must be >= 0")?;
    }
    if let Some(timeout) = params.idle_conn_timeout {
        config.idle_conn_timeout = timeout;
    } else if let Some(raw) = settings.get("ROE_IDLE_CONN_TIMEOUT") {
        let secs = parse_duration_secs("ROE_IDLE_CONN_TIMEOUT", &raw, DurationUnit::Seconds)?;
        config.idle_conn_timeout = non_negative(secs, "idle connection timeout must be non-negative")?;
    }

    if let Some(redact) = params.redact_headers {
        config.redact_headers = redact;
    }
    config.request_hooks = params.request_hooks;
    config.response_hooks = params.response_hooks;

    config.validate()?;
    tracing::debug!(
        base_url = %config.base_url,
        max_retries = config.max_retries,
        timeout_ms = u64::try_from(config.timeout.as_millis()).unwrap_or(u64::MAX),
        "client configuration resolved"
    );
    Ok(config)
}

/// Read a JSON or TOML config file; the format follows the extension.
///
/// # Errors
/// Returns [`RoeError::Config`] if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Err(RoeError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| RoeError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<FileConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RoeError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RoeError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(RoeError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Contents of a config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub organization_id: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<FileValue>,
    pub max_retries: Option<i64>,
    pub debug: Option<bool>,
    pub proxy: Option<String>,
    pub extra_headers: BTreeMap<String, String>,
    pub request_id: Option<String>,
    pub request_id_header: Option<String>,
    pub auto_request_id: Option<bool>,
    pub retry_initial_ms: Option<FileValue>,
    pub retry_max_ms: Option<FileValue>,
    pub retry_multiplier: Option<f64>,
    pub retry_jitter: Option<f64>,
    pub max_idle_conns: Option<i64>,
    pub max_idle_conns_per_host: Option<i64>,
    pub idle_conn_timeout: Option<FileValue>,
}

/// A file value that may be written as a number or a string such as `"5s"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FileValue {
    Number(f64),
    Text(String),
}

impl FileValue {
    fn render(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl FileConfig {
    /// Values keyed by the environment variable they stand in for.
    fn settings(&self) -> HashMap<&'static str, String> {
        let mut out = HashMap::new();
        let mut put = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                out.insert(key, value);
            }
        };
        put("ROE_API_KEY", self.api_key.clone());
        put("ROE_ORGANIZATION_ID", self.organization_id.clone());
        put("ROE_BASE_URL", self.base_url.clone());
        put("ROE_TIMEOUT", self.timeout.as_ref().map(FileValue::render));
        put("ROE_MAX_RETRIES", self.max_retries.map(|n| n.to_string()));
        put("ROE_DEBUG", self.debug.map(|b| b.to_string()));
        put("ROE_PROXY", self.proxy.clone());
        put("ROE_REQUEST_ID", self.request_id.clone());
        put("ROE_REQUEST_ID_HEADER", self.request_id_header.clone());
        put("ROE_AUTO_REQUEST_ID", self.auto_request_id.map(|b| b.to_string()));
        put("ROE_RETRY_INITIAL_MS", self.retry_initial_ms.as_ref().map(FileValue::render));
        put("ROE_RETRY_MAX_MS", self.retry_max_ms.as_ref().map(FileValue::render));
        put("ROE_RETRY_MULTIPLIER", self.retry_multiplier.map(|n| n.to_string()));
        put("ROE_RETRY_JITTER", self.retry_jitter.map(|n| n.to_string()));
        put("ROE_MAX_IDLE_CONNS", self.max_idle_conns.map(|n| n.to_string()));
        put("ROE_MAX_IDLE_CONNS_PER_HOST", self.max_idle_conns_per_host.map(|n| n.to_string()));
        put("ROE_IDLE_CONN_TIMEOUT", self.idle_conn_timeout.as_ref().map(FileValue::render));
        out
    }

    fn header_entries(&self) -> Vec<(String, String)> {
        self.extra_headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

struct Settings<'a, F> {
    env: &'a F,
    file: HashMap<&'static str, String>,
}

impl<F> Settings<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Environment first, then the config file. Blank values count as unset.
    fn get(&self, key: &'static str) -> Option<String> {
        non_empty((self.env)(key)).or_else(|| non_empty(self.file.get(key).cloned()))
    }
}

fn resolve_retry<F>(params: &ConfigParams, settings: &Settings<'_, F>) -> Result<BackoffPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    const INTERVALS: &str = "retry intervals must be positive";

    let mut retry = BackoffPolicy::new(
        DEFAULT_RETRY_INITIAL,
        DEFAULT_RETRY_MAX,
        DEFAULT_RETRY_MULTIPLIER,
        DEFAULT_RETRY_JITTER,
    );

    if let Some(initial) = params.retry_initial {
        retry.initial = initial;
    } else if let Some(raw) = settings.get("ROE_RETRY_INITIAL_MS") {
        let secs = parse_duration_secs("ROE_RETRY_INITIAL_MS", &raw, DurationUnit::Millis)?;
        retry.initial = positive(secs, INTERVALS)?;
    }
    if let Some(max) = params.retry_max {
        retry.max = max;
    } else if let Some(raw) = settings.get("ROE_RETRY_MAX_MS") {
        let secs = parse_duration_secs("ROE_RETRY_MAX_MS", &raw, DurationUnit::Millis)?;
        retry.max = positive(secs, INTERVALS)?;
    }
    if let Some(multiplier) = params.retry_multiplier {
        retry.multiplier = multiplier;
    } else if let Some(raw) = settings.get("ROE_RETRY_MULTIPLIER") {
        retry.multiplier = parse_float("ROE_RETRY_MULTIPLIER", &raw)?;
    }
    if let Some(jitter) = params.retry_jitter {
        retry.jitter = jitter;
    } else if let Some(raw) = settings.get("ROE_RETRY_JITTER") {
        retry.jitter = parse_float("ROE_RETRY_JITTER", &raw)?;
    }
    Ok(retry)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn invalid(key: &str, value: &str) -> RoeError {
    RoeError::Config(format!("invalid {key} value {value:?}"))
}

/// Accepts exactly the spellings `strconv`-style parsers do: `1`, `t`,
/// `true`, `0`, `f`, `false` in upper, lower or title case.
fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_float(key: &str, value: &str) -> Result<f64> {
    value.parse::<f64>().map_err(|_| invalid(key, value))
}

fn parse_count<T>(key: &str, value: &str, negative: &str) -> Result<T>
where
    T: TryFrom<i64>,
{
    let n = value.parse::<i64>().map_err(|_| invalid(key, value))?;
    if n < 0 {
        return Err(config_error(negative));
    }
    T::try_from(n).map_err(|_| invalid(key, value))
}

#[derive(Debug, Clone, Copy)]
enum DurationUnit {
    Seconds,
    Millis,
}

/// Parse a duration into signed seconds.
///
/// Accepts a bare number in `unit`, or one or more `<number><unit>` terms
/// such as `1m30s` or `250ms` (`ns`, `us`, `ms`, `s`, `m`, `h`).
fn parse_duration_secs(key: &str, value: &str, unit: DurationUnit) -> Result<f64> {
    if let Ok(n) = value.parse::<f64>() {
        return Ok(match unit {
            DurationUnit::Seconds => n,
            DurationUnit::Millis => n / 1000.0,
        });
    }
    parse_unit_terms(value).ok_or_else(|| invalid(key, value))
}

fn parse_unit_terms(value: &str) -> Option<f64> {
    let (sign, mut rest) = match value.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, value.strip_prefix('+').unwrap_or(value)),
    };
    if rest.is_empty() {
        return None;
    }

    let mut total = 0.0;
    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let number: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        total += number * scale;
        rest = &rest[unit_len..];
    }
    Some(sign * total)
}

fn non_negative(secs: f64, message: &str) -> Result<Duration> {
    if secs < 0.0 {
        return Err(config_error(message));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| config_error(message))
}

fn positive(secs: f64, message: &str) -> Result<Duration> {
    if secs <= 0.0 {
        return Err(config_error(message));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| config_error(message))
}

/// Split `Name:Value` / `Name=Value` entries separated by `;`, `,` or
/// newlines. `=` is the separator whenever an entry contains one.
pub(crate) fn parse_header_list(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split([';', ',', '\n'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let separator = if entry.contains('=') { '=' } else { ':' };
            let (key, value) = entry
                .split_once(separator)
                .ok_or_else(|| RoeError::Config(format!("invalid header entry {entry:?}")))?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(RoeError::Config(format!("invalid header entry {entry:?}")));
            }
            Ok((key.to_owned(), value.to_owned()))
        })
        .collect()
}

fn append_headers(headers: &mut HeaderMap, entries: Vec<(String, String)>) -> Result<()> {
    for (key, value) in entries {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| RoeError::Config(format!("invalid header name {key:?}: {err}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|err| RoeError::Config(format!("invalid value for header {key}: {err}")))?;
        headers.append(name, value);
    }
    Ok(())
}
