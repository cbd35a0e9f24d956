//! Client constants
//!
//! Values shared between the job poller and the HTTP layer.

use std::time::Duration;

pub use roe_common::MAX_BATCH_SIZE;

// Job polling
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(7200);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

// HTTP identity
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const USER_AGENT: &str = concat!("roe-rust/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_BASE_URL: &str = "https://api.roe-ai.com";
pub const DEFAULT_REQUEST_ID_HEADER: &str = "X-Request-ID";

// Logging
pub const BODY_PREVIEW_LIMIT: usize = 512;
pub const REDACTED_PLACEHOLDER: &str = "[redacted]";
