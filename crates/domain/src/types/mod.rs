//! API payload types
//!
//! Field names mirror the JSON the service sends. Fields the service may
//! omit or null out decode to their defaults.

pub mod agents;
pub mod jobs;
pub mod page;

pub use agents::{
    AgentInputDefinition, AgentUpdate, AgentVersion, AgentVersionUpdate, BaseAgent,
    ListVersionsParams, NewAgent, NewAgentVersion, UserInfo,
};
pub use jobs::{
    AgentDatum, JobDataDeleteResponse, JobResult, JobResultBatchEntry, JobStatus, JobStatusBatchEntry,
    JobStatusInfo, Reference,
};
pub use page::Page;

use serde::{Deserialize, Deserializer};

/// Decode a JSON `null` or missing value as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
