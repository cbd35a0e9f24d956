//! HTTP transport
//!
//! A single `HttpClient` owns the connection pool, retry loop, request-id
//! propagation, hook invocation and body logging. Resource clients build
//! an [`ApiRequest`] and hand it over.

pub mod client;
pub mod request;

pub use client::HttpClient;
pub(crate) use client::decode_json;
pub use request::{ApiRequest, RequestBody};
