//! # Roe Domain
//!
//! Wire types and the error taxonomy for the Roe agent execution API.
//!
//! This crate contains:
//! - Job, batch, agent and version payloads as the API sends them
//! - `ApiError` (status-mapped API failures) and the crate-wide `RoeError`
//! - Constants shared by the poller and the HTTP layer
//!
//! ## Architecture
//! - Depends only on `roe-common` for cancellation reasons
//! - No I/O; everything here is plain data plus conversions

pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
