use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use roe_common::{generate_request_id, CancelContext};
use roe_domain::constants::{BODY_PREVIEW_LIMIT, REDACTED_PLACEHOLDER};
use roe_domain::{is_retryable_status, Result, RoeError};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::request::{ApiRequest, RequestBody};
use crate::api::auth::AuthHeaders;
use crate::api::errors::{api_error_from_response, parse_retry_after};
use crate::config::{ClientConfig, HookResponse};
use crate::upload::{DynamicInputs, FilePart};

/// HTTP transport with retry, cancellation and request hooks.
///
/// Every call runs up to `max_retries + 1` attempts. Connection failures and
/// timeouts are retried, as are 5xx, 408 and 429 responses; any other non-2xx
/// response fails immediately. Waiting between attempts honours
/// `Retry-After` and stops as soon as the caller's context is done.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    config: Arc<ClientConfig>,
    auth: AuthHeaders,
    request_id_header: Option<HeaderName>,
    default_request_id: Option<HeaderValue>,
    redact: HashSet<String>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("max_retries", &self.config.max_retries)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Build the transport and its connection pool from `config`.
    ///
    /// # Errors
    /// Returns [`RoeError::Config`] for header names, header values or proxy
    /// settings that cannot be used, and [`RoeError::Transport`] if the
    /// underlying client fails to initialise.
    pub fn new(config: Arc<ClientConfig>) -> Result<Self> {
        let auth = AuthHeaders::new(&config.api_key)?;

        let request_id_header = config
            .request_id_header
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(|name| {
                HeaderName::from_bytes(name.trim().as_bytes()).map_err(|err| {
                    RoeError::Config(format!("invalid request id header {name:?}: {err}"))
                })
            })
            .transpose()?;
        let default_request_id = config
            .default_request_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| {
                HeaderValue::from_str(id)
                    .map_err(|err| RoeError::Config(format!("invalid default request id: {err}")))
            })
            .transpose()?;

        // System proxy variables still apply; an explicit proxy replaces them.
        let mut builder =
            ReqwestClient::builder().pool_max_idle_per_host(config.max_idle_conns_per_host);
        if !config.timeout.is_zero() {
            builder = builder.timeout(config.timeout);
        }
        if !config.idle_conn_timeout.is_zero() {
            builder = builder.pool_idle_timeout(config.idle_conn_timeout);
        }
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|err| RoeError::Config(format!("invalid proxy {proxy}: {err}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(RoeError::transport)?;
        debug!(
            max_idle_conns = config.max_idle_conns,
            max_idle_conns_per_host = config.max_idle_conns_per_host,
            proxy = config.proxy.is_some(),
            "http transport built"
        );

        let redact = config.redact_headers.iter().map(|h| h.to_ascii_lowercase()).collect();

        Ok(Self { client, config, auth, request_id_header, default_request_id, redact })
    }

    /// Configuration shared with the owning [`crate::RoeClient`].
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Join the base URL and `path`, then set each query parameter.
    ///
    /// # Errors
    /// Returns [`RoeError::Config`] if the result is not a valid URL.
    pub fn build_url(&self, path: &str, query: &BTreeMap<String, String>) -> Result<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        let mut url = Url::parse(&joined)
            .map_err(|err| RoeError::Config(format!("invalid request URL {joined}: {err}")))?;

        if !query.is_empty() {
            let mut merged: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
            merged.extend(query.iter().map(|(k, v)| (k.clone(), v.clone())));
            url.query_pairs_mut().clear().extend_pairs(merged.iter());
        }
        Ok(url)
    }

    /// Run `request` with retries and return the raw 2xx body.
    ///
    /// # Errors
    /// - [`RoeError::Cancelled`] if `ctx` finishes before or during any
    ///   attempt or backoff sleep
    /// - [`RoeError::Api`] for a non-retryable status, or the last retryable
    ///   one once attempts run out
    /// - [`RoeError::Transport`] when the last attempt failed below HTTP
    pub async fn execute(&self, ctx: &CancelContext, request: &ApiRequest) -> Result<Bytes> {
        let url = self.build_url(request.path(), request.query_params())?;
        let attempts = self.config.max_retries.saturating_add(1);

        let mut attempt = 0;
        loop {
            ctx.check()?;

            let mut outgoing = self.build_request(&url, request)?;
            self.attach_request_id(&mut outgoing);
            self.run_request_hooks(&mut outgoing);
            self.log_request(&outgoing, attempt);

            let method = outgoing.method().clone();
            let target = outgoing.url().clone();
            let started = Instant::now();
            let is_last = attempt + 1 >= attempts;

            let response = match ctx.run(self.client.execute(outgoing)).await? {
                Ok(response) => response,
                Err(err) if is_last => return Err(RoeError::transport(err)),
                Err(err) => {
                    if self.config.debug {
                        debug!(
                            attempt = attempt + 1,
                            attempts,
                            error = %err,
                            "retrying after transport error"
                        );
                    }
                    ctx.sleep(self.config.retry.delay(attempt)).await?;
                    attempt += 1;
                    continue;
                }
            };

            let status = response.status();
            let headers = response.headers().clone();
            let body = ctx.run(response.bytes()).await?.map_err(RoeError::transport)?;

            self.log_response(&method, &target, status, &headers, &body, started.elapsed());
            self.run_response_hooks(&HookResponse {
                method: &method,
                url: &target,
                status,
                headers: &headers,
                body: &body,
            });

            if status.is_success() {
                return Ok(body);
            }

            let error = api_error_from_response(
                status.as_u16(),
                &body,
                &headers,
                self.request_id_header.as_ref(),
            );
            if is_last || !is_retryable_status(status.as_u16()) {
                return Err(error.into());
            }

            let delay = self.config.retry.retry_delay(attempt, parse_retry_after(&headers));
            if self.config.debug {
                debug!(
                    attempt = attempt + 1,
                    attempts,
                    status = status.as_u16(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying after status"
                );
            }
            ctx.sleep(delay).await?;
            attempt += 1;
        }
    }

    /// Run `request` and decode the 2xx body as JSON.
    ///
    /// # Errors
    /// Everything [`execute`](Self::execute) returns, plus
    /// [`RoeError::Decode`] naming `what` if the body does not decode.
    pub async fn send_json<T>(&self, ctx: &CancelContext, request: &ApiRequest, what: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let body = self.execute(ctx, request).await?;
        decode_json(&body, what)
    }

    /// Encode `inputs` once, then POST them to `path` as a form or multipart
    /// body.
    ///
    /// # Errors
    /// Input classification and file errors are returned before any request
    /// is made; otherwise see [`execute`](Self::execute).
    pub async fn post_inputs(
        &self,
        ctx: &CancelContext,
        path: &str,
        inputs: DynamicInputs,
    ) -> Result<Bytes> {
        let encoded = inputs.encode().await?;
        self.execute(ctx, &ApiRequest::post(path).inputs(encoded)).await
    }

    fn build_request(&self, url: &Url, request: &ApiRequest) -> Result<reqwest::Request> {
        let mut builder = self.client.request(request.method().clone(), url.clone());
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.body(bytes.clone()),
            RequestBody::Form(fields) => builder.body(encode_form(fields)),
            RequestBody::Multipart { fields, files } => {
                builder.multipart(multipart_form(fields, files)?)
            }
        };
        let mut outgoing = builder.build().map_err(RoeError::transport)?;

        let headers = outgoing.headers_mut();
        self.auth.apply(headers);
        append_all(headers, &self.config.extra_headers);
        append_all(headers, request.headers());
        Ok(outgoing)
    }

    fn attach_request_id(&self, request: &mut reqwest::Request) {
        let Some(name) = &self.request_id_header else { return };
        if request.headers().contains_key(name) {
            return;
        }
        let value = match &self.default_request_id {
            Some(value) => value.clone(),
            None if self.config.auto_request_id => {
                match HeaderValue::from_str(&generate_request_id()) {
                    Ok(value) => value,
                    Err(_) => return,
                }
            }
            None => return,
        };
        request.headers_mut().insert(name.clone(), value);
    }

    fn run_request_hooks(&self, request: &mut reqwest::Request) {
        for (index, hook) in self.config.request_hooks.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| hook(&mut *request))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(hook = index, error = %err, "request hook failed"),
                Err(payload) => {
                    warn!(hook = index, panic = %panic_message(&*payload), "request hook panicked");
                }
            }
        }
    }

    fn run_response_hooks(&self, response: &HookResponse<'_>) {
        for (index, hook) in self.config.response_hooks.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| hook(response))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(hook = index, error = %err, "response hook failed"),
                Err(payload) => {
                    warn!(hook = index, panic = %panic_message(&*payload), "response hook panicked");
                }
            }
        }
    }

    fn log_request(&self, request: &reqwest::Request, attempt: u32) {
        if !self.config.debug {
            return;
        }
        debug!(
            method = %request.method(),
            url = %request.url(),
            attempt = attempt + 1,
            headers = ?self.redacted(request.headers()),
            "sending request"
        );
    }

    fn log_response(
        &self,
        method: &Method,
        url: &Url,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
        elapsed: Duration,
    ) {
        if !self.config.debug {
            return;
        }
        let request_id = self
            .request_id_header
            .as_ref()
            .and_then(|name| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        debug!(
            %method,
            %url,
            status = status.as_u16(),
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            request_id,
            body = %body_preview(body),
            "received response"
        );
    }

    /// Header pairs for logging, with redacted names masked.
    pub(crate) fn redacted(&self, headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(name, value)| {
                let shown = if self.redact.contains(name.as_str()) {
                    REDACTED_PLACEHOLDER.to_owned()
                } else {
                    value.to_str().unwrap_or("<binary>").to_owned()
                };
                (name.as_str().to_owned(), shown)
            })
            .collect()
    }
}

/// Decode a JSON response body.
pub(crate) fn decode_json<T>(body: &[u8], what: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(body)
        .map_err(|source| RoeError::Decode { context: what.to_owned(), source })
}

fn append_all(target: &mut HeaderMap, source: &HeaderMap) {
    for (name, value) in source {
        target.append(name.clone(), value.clone());
    }
}

fn encode_form(fields: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new()).extend_pairs(fields).finish()
}

fn multipart_form(fields: &[(String, String)], files: &[FilePart]) -> Result<Form> {
    let mut form = Form::new();
    for (key, value) in fields {
        form = form.text(key.clone(), value.clone());
    }
    for file in files {
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)
            .map_err(|err| {
                RoeError::invalid_input(format!(
                    "invalid content type {} for {}: {err}",
                    file.content_type, file.field
                ))
            })?;
        form = form.part(file.field.clone(), part);
    }
    Ok(form)
}

/// First [`BODY_PREVIEW_LIMIT`] characters of `body`, marked when cut.
pub(crate) fn body_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(BODY_PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.into_owned(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
