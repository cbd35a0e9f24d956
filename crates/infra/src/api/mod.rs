//! Resource clients for the Roe API
//!
//! Each client translates domain operations into transport calls on a
//! shared [`HttpClient`](crate::http::HttpClient). Every operation has a
//! `*_with_context` form taking a [`CancelContext`](roe_common::CancelContext)
//! and a convenience form that runs with a fresh, never-cancelled context.
//!
//! # Architecture
//!
//! - `agents`: agent CRUD and run submission (async, batched, sync)
//! - `versions`: agent version CRUD
//! - `jobs`: status/result retrieval; implements `roe_core::JobsPort`
//! - `auth` and `errors`: header injection and response-to-error mapping
//!   used by the transport

pub mod agents;
pub mod auth;
pub mod errors;
pub mod jobs;
pub mod versions;

pub use agents::{AgentsClient, BatchInputs};
pub use auth::AuthHeaders;
pub use errors::{api_error_from_response, parse_retry_after};
pub use jobs::JobsClient;
pub use versions::VersionsClient;

use roe_domain::{Result, RoeError};

/// Reject an empty identifier before any request is built.
pub(crate) fn require_id(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RoeError::invalid_input(format!("{name} cannot be empty")));
    }
    Ok(())
}
