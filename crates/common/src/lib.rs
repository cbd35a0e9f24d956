//! Shared utilities for the Roe client crates.
//!
//! # Feature Tiers
//!
//! - `foundation`: backoff math, request ids, chunking, string heuristics
//! - `runtime`: cooperative cancellation on top of tokio (default)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod ids;
#[cfg(feature = "foundation")]
pub mod resilience;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cancel;

#[cfg(feature = "runtime")]
pub use cancel::{CancelContext, CancelReason};
#[cfg(feature = "foundation")]
pub use ids::generate_request_id;
#[cfg(feature = "foundation")]
pub use resilience::BackoffPolicy;
#[cfg(feature = "foundation")]
pub use utils::chunk::{chunk, MAX_BATCH_SIZE};
#[cfg(feature = "foundation")]
pub use utils::strings::{is_http_url, is_uuid_string, looks_like_path};
