//! Description of one logical API call, independent of retries.

use std::collections::BTreeMap;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use roe_domain::Result;
use serde::Serialize;

use crate::upload::{EncodedInputs, FilePart};

/// Body kept in memory so every attempt sends identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Bytes),
    Form(Vec<(String, String)>),
    Multipart { fields: Vec<(String, String)>, files: Vec<FilePart> },
}

/// Method, path, query, per-call headers and body of a request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
    body: RequestBody,
}

impl ApiRequest {
    /// Request with no query, headers or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `DELETE path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a query parameter, replacing any earlier value for `key`.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    /// Append a header; existing values for the same name are kept.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Serialize `payload` as the JSON body.
    ///
    /// # Errors
    /// Returns [`roe_domain::RoeError::Serialization`] if `payload` cannot be
    /// encoded.
    pub fn json<T>(mut self, payload: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        self.body = RequestBody::Json(Bytes::from(serde_json::to_vec(payload)?));
        Ok(self.header(CONTENT_TYPE, HeaderValue::from_static("application/json")))
    }

    /// Use already encoded run inputs as the body.
    #[must_use]
    pub fn inputs(mut self, inputs: EncodedInputs) -> Self {
        match inputs {
            EncodedInputs::Form(fields) => {
                self.body = RequestBody::Form(fields);
                self.header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                )
            }
            EncodedInputs::Multipart { fields, files } => {
                self.body = RequestBody::Multipart { fields, files };
                self
            }
        }
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters, sorted by key.
    pub fn query_params(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Per-call headers, applied after the config headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Buffered body.
    pub fn body(&self) -> &RequestBody {
        &self.body
    }
}
