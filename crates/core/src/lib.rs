//! # Roe Core
//!
//! Job polling logic, independent of any transport.
//!
//! This crate contains:
//! - The `JobsPort` trait the HTTP jobs client implements
//! - `Job` and `JobBatch`, the poll-until-terminal state machines
//!
//! ## Architecture Principles
//! - Only depends on `roe-common` and `roe-domain`
//! - No HTTP code; every remote call goes through `JobsPort`
//! - All waiting happens on the caller's task, never on a spawned one

pub mod jobs;

pub use jobs::ports::JobsPort;
pub use jobs::{Job, JobBatch};
