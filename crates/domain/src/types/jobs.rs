//! Job status, result and batch payloads.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::null_as_default;
use crate::errors::RoeError;

/// Lifecycle state of a job. Travels on the wire as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Started,
    Retry,
    Success,
    Failure,
    Cancelled,
    Cached,
}

impl JobStatus {
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Started,
        Self::Retry,
        Self::Success,
        Self::Failure,
        Self::Cancelled,
        Self::Cached,
    ];

    /// Integer code used on the wire.
    pub fn code(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Started => 1,
            Self::Retry => 2,
            Self::Success => 3,
            Self::Failure => 4,
            Self::Cancelled => 5,
            Self::Cached => 6,
        }
    }

    /// Status for a wire code; `None` when out of range.
    pub fn from_code(code: u64) -> Option<Self> {
        usize::try_from(code).ok().and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Lowercase status name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Retry => "retry",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Cached => "cached",
        }
    }

    /// Terminal states never transition again; polling stops on them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Cancelled | Self::Cached)
    }

    /// Terminal states that count as a failed job.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == lowered)
            .ok_or_else(|| format!("unknown job status: {s}"))
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl Visitor<'_> for StatusVisitor {
            type Value = JobStatus;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a job status code (0-6) or name")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<JobStatus, E> {
                JobStatus::from_code(v)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<JobStatus, E> {
                u64::try_from(v)
                    .ok()
                    .and_then(JobStatus::from_code)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<JobStatus, E> {
                v.parse().map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

/// One named output value of a completed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDatum {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_type: String,
    /// String-encoded value; often itself JSON.
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl AgentDatum {
    /// Reference links found in this datum's value.
    ///
    /// The value must be a JSON object with a `references` array; any other
    /// shape yields nothing.
    pub fn references(&self) -> Vec<Reference> {
        let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(&self.value) else {
            return Vec::new();
        };
        let Some(Value::Array(items)) = parsed.get("references") else {
            return Vec::new();
        };
        items.iter().filter_map(Value::as_str).filter_map(Reference::from_url).collect()
    }
}

/// A downloadable artifact linked from a job output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub resource_id: String,
}

impl Reference {
    const MARKER: &'static str = "/references/";

    /// Parse `.../references/<id>[/]`; the id is whatever follows the last
    /// marker, minus one trailing slash.
    pub fn from_url(url: &str) -> Option<Self> {
        let (_, tail) = url.rsplit_once(Self::MARKER)?;
        let resource_id = tail.strip_suffix('/').unwrap_or(tail);
        Some(Self { url: url.to_owned(), resource_id: resource_id.to_owned() })
    }
}

/// Response of the single-job status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatusInfo {
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Final payload of a completed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub agent_version_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<Value>,
    #[serde(default)]
    pub input_tokens: Option<i64>,
    #[serde(default)]
    pub output_tokens: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: Vec<AgentDatum>,
}

impl JobResult {
    /// Every reference linked from the outputs, in output order.
    pub fn references(&self) -> Vec<Reference> {
        self.outputs.iter().flat_map(AgentDatum::references).collect()
    }
}

/// One entry of the batch status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatusBatchEntry {
    pub id: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub last_updated_at: Option<Value>,
}

/// One entry of the batch result endpoint.
///
/// `result` is left undecoded because the service does not guarantee its
/// shape; [`JobResultBatchEntry::into_job_result`] does the conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResultBatchEntry {
    pub id: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub corrected_outputs: Vec<AgentDatum>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_version_id: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<Value>,
    #[serde(default)]
    pub input_tokens: Option<i64>,
    #[serde(default)]
    pub output_tokens: Option<i64>,
}

impl JobResultBatchEntry {
    /// Convert into a [`JobResult`].
    ///
    /// Fails with [`RoeError::JobNotFound`] when the entry is missing its
    /// agent or version id, and with [`RoeError::OutputDecode`] when an
    /// output element cannot be decoded. Corrected outputs are used when the
    /// result itself produced no outputs.
    pub fn into_job_result(self) -> Result<JobResult, RoeError> {
        let (Some(agent_id), Some(agent_version_id)) = (self.agent_id, self.agent_version_id)
        else {
            return Err(RoeError::JobNotFound { job_id: self.id });
        };

        let mut outputs = match self.result {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    serde_json::from_value::<AgentDatum>(item).map_err(|source| {
                        RoeError::OutputDecode { job_id: self.id.clone(), index: Some(index), source }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => serde_json::from_value::<Vec<AgentDatum>>(other).map_err(|source| {
                RoeError::OutputDecode { job_id: self.id.clone(), index: None, source }
            })?,
        };

        if outputs.is_empty() && !self.corrected_outputs.is_empty() {
            outputs = self.corrected_outputs;
        }

        Ok(JobResult {
            agent_id,
            agent_version_id,
            inputs: self.inputs,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            outputs,
        })
    }
}

/// Response of the delete-data endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDataDeleteResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub deleted_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    #[serde(default)]
    pub outputs_sanitized: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn datum(value: &str) -> AgentDatum {
        AgentDatum { key: "out".into(), value: value.into(), ..AgentDatum::default() }
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = JobStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![JobStatus::Success, JobStatus::Failure, JobStatus::Cancelled, JobStatus::Cached]
        );
        assert!(JobStatus::Failure.is_failure());
        assert!(JobStatus::Cancelled.is_failure());
        assert!(!JobStatus::Cached.is_failure());
    }

    #[test]
    fn status_decodes_from_code_or_name() {
        let from_code: JobStatus = serde_json::from_str("3").unwrap();
        assert_eq!(from_code, JobStatus::Success);
        let from_name: JobStatus = serde_json::from_str(r#""CANCELLED""#).unwrap();
        assert_eq!(from_name, JobStatus::Cancelled);
        assert!(serde_json::from_str::<JobStatus>("7").is_err());
        assert!(serde_json::from_str::<JobStatus>("-1").is_err());
        assert_eq!(serde_json::to_string(&JobStatus::Cached).unwrap(), "6");
    }

    #[test]
    fn status_info_tolerates_missing_fields() {
        let info: JobStatusInfo = serde_json::from_str(r#"{"status":1}"#).unwrap();
        assert_eq!(info.status, JobStatus::Started);
        assert!(info.error_message.is_none());
    }

    #[test]
    fn references_strip_trailing_slash() {
        let result = JobResult {
            outputs: vec![datum(r#"{"references":["https://x/references/abc123/"]}"#)],
            ..JobResult::default()
        };
        let refs = result.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].resource_id, "abc123");
        assert_eq!(refs[0].url, "https://x/references/abc123/");
    }

    #[test]
    fn references_skip_malformed_values() {
        let result = JobResult {
            outputs: vec![
                datum("not json"),
                datum(r#"["https://x/references/a/"]"#),
                datum(r#"{"references":"https://x/references/a/"}"#),
                datum(r#"{"references":[42,"https://x/other/b","https://x/references/c"]}"#),
            ],
            ..JobResult::default()
        };
        let refs = result.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].resource_id, "c");
    }

    #[test]
    fn batch_entry_without_ids_is_not_found() {
        let entry = JobResultBatchEntry { id: "job-7".into(), ..Default::default() };
        let err = entry.into_job_result().unwrap_err();
        assert!(matches!(err, RoeError::JobNotFound { ref job_id } if job_id == "job-7"));
        assert_eq!(err.to_string(), "job job-7 not found or deleted");
    }

    #[test]
    fn batch_entry_decodes_each_output() {
        let entry: JobResultBatchEntry = serde_json::from_value(json!({
            "id": "job-1",
            "status": 3,
            "agent_id": "agent",
            "agent_version_id": "version",
            "result": [
                {"key": "a", "description": "", "data_type": "text/plain", "value": "1"},
                {"key": "b", "description": "", "data_type": "text/plain", "value": "2"}
            ],
            "inputs": null,
            "input_tokens": 10
        }))
        .unwrap();
        let result = entry.into_job_result().unwrap();
        assert_eq!(result.outputs.len(), 2);
        assert_eq!(result.outputs[1].value, "2");
        assert_eq!(result.input_tokens, Some(10));
        assert!(result.inputs.is_empty());
    }

    #[test]
    fn batch_entry_reports_bad_element_index() {
        let entry: JobResultBatchEntry = serde_json::from_value(json!({
            "id": "job-1",
            "agent_id": "agent",
            "agent_version_id": "version",
            "result": [{"key": "a", "value": "ok"}, {"key": "b", "value": 17}]
        }))
        .unwrap();
        let err = entry.into_job_result().unwrap_err();
        assert!(matches!(err, RoeError::OutputDecode { index: Some(1), .. }));
        assert!(err.to_string().starts_with("job job-1: decode output[1]"));
    }

    #[test]
    fn non_array_result_is_a_decode_error() {
        let entry: JobResultBatchEntry = serde_json::from_value(json!({
            "id": "job-1",
            "agent_id": "agent",
            "agent_version_id": "version",
            "result": {"key": "a"}
        }))
        .unwrap();
        let err = entry.into_job_result().unwrap_err();
        assert!(matches!(err, RoeError::OutputDecode { index: None, .. }));
    }

    #[test]
    fn corrected_outputs_fill_empty_result() {
        let entry: JobResultBatchEntry = serde_json::from_value(json!({
            "id": "job-1",
            "agent_id": "agent",
            "agent_version_id": "version",
            "result": null,
            "corrected_outputs": [{"key": "fixed", "value": "yes"}]
        }))
        .unwrap();
        let result = entry.into_job_result().unwrap();
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.outputs[0].key, "fixed");
    }

    #[test]
    fn corrected_outputs_ignored_when_result_present() {
        let entry: JobResultBatchEntry = serde_json::from_value(json!({
            "id": "job-1",
            "agent_id": "agent",
            "agent_version_id": "version",
            "result": [{"key": "original", "value": "1"}],
            "corrected_outputs": [{"key": "fixed", "value": "2"}]
        }))
        .unwrap();
        let result = entry.into_job_result().unwrap();
        assert_eq!(result.outputs[0].key, "original");
    }
}
