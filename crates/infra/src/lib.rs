//! # Roe Infrastructure
//!
//! HTTP implementation of the Roe agent execution API.
//!
//! This crate contains:
//! - Configuration loading (explicit params, `ROE_*` environment, config file)
//! - The retrying HTTP transport with request-id propagation and hooks
//! - Run input encoding and file uploads
//! - Agent, version and job clients
//!
//! ## Architecture
//! - Implements `roe_core::JobsPort` so `Job`/`JobBatch` can poll over HTTP
//! - Depends on `roe-common`, `roe-domain` and `roe-core`
//! - Contains all I/O; the other crates stay pure
//!
//! ```no_run
//! # async fn demo() -> roe_domain::Result<()> {
//! use std::time::Duration;
//!
//! use roe_infra::{DynamicInputs, RoeClient};
//!
//! let client = RoeClient::from_env()?;
//! let mut inputs = DynamicInputs::new();
//! inputs.insert("prompt", "Summarize this contract");
//! let job = client.agents().run("agent-id", inputs, None).await?;
//! let result = job.wait(Duration::ZERO, Duration::ZERO).await?;
//! println!("{} outputs", result.outputs.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod http;
pub mod upload;

// Re-export commonly used items
pub use api::{AgentsClient, BatchInputs, JobsClient, VersionsClient};
pub use client::RoeClient;
pub use config::{ClientConfig, ConfigParams, HookResponse, RequestHook, ResponseHook};
pub use upload::{DynamicInputs, FileUpload, InputValue};
