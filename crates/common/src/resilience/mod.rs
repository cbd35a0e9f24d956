//! Retry timing for transient failures
//!
//! The HTTP transport owns the retry loop itself; this module only answers
//! "how long should the next wait be", so the same policy can be reused by
//! anything that needs exponential backoff with bounded jitter.

pub mod backoff;

pub use backoff::BackoffPolicy;
