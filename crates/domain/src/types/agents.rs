//! Agent and agent-version payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::null_as_default;

/// Declared input of an agent version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInputDefinition {
    pub key: String,
    pub data_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub example: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub accepts_multiple_files: bool,
}

/// Creator metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// An agent as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseAgent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserInfo>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disable_cache: bool,
    #[serde(default)]
    pub cache_failed_jobs: bool,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub engine_class_id: String,
    #[serde(default)]
    pub current_version_id: Option<String>,
    #[serde(default)]
    pub job_count: u64,
    #[serde(default)]
    pub most_recent_job: Option<DateTime<Utc>>,
    #[serde(default)]
    pub engine_name: String,
}

/// One saved version of an agent's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentVersion {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserInfo>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub engine_class_id: String,
    #[serde(default)]
    pub engine_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_definitions: Vec<AgentInputDefinition>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub engine_config: Map<String, Value>,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub base_agent: BaseAgent,
}

/// Payload for creating an agent. `organization_id` is filled in by the
/// client from its configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewAgent {
    pub name: String,
    pub engine_class_id: String,
    pub input_definitions: Vec<AgentInputDefinition>,
    pub engine_config: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewAgent {
    /// New agent with the required name and engine class.
    pub fn new(name: impl Into<String>, engine_class_id: impl Into<String>) -> Self {
        Self { name: name.into(), engine_class_id: engine_class_id.into(), ..Self::default() }
    }

    /// Append an input definition.
    #[must_use]
    pub fn input(mut self, definition: AgentInputDefinition) -> Self {
        self.input_definitions.push(definition);
        self
    }

    /// Replace the engine configuration.
    #[must_use]
    pub fn engine_config(mut self, config: Map<String, Value>) -> Self {
        self.engine_config = config;
        self
    }

    /// Name for the initial version.
    #[must_use]
    pub fn version_name(mut self, version_name: impl Into<String>) -> Self {
        self.version_name = Some(version_name.into());
        self
    }

    /// Description for the initial version.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of an agent; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_failed_jobs: Option<bool>,
}

/// Payload for creating a new version of an existing agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewAgentVersion {
    pub input_definitions: Vec<AgentInputDefinition>,
    pub engine_config: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update for a version; unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentVersionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Query options for the paginated version listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListVersionsParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub get_supports_eval: Option<bool>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn agent_decodes_with_nullable_fields() {
        let agent: BaseAgent = serde_json::from_value(json!({
            "id": "agent-1",
            "name": "Extractor",
            "created_at": "2025-03-01T12:00:00Z",
            "current_version_id": null,
            "most_recent_job": null,
            "job_count": 4
        }))
        .unwrap();
        assert_eq!(agent.id, "agent-1");
        assert!(agent.current_version_id.is_none());
        assert!(agent.created_at.is_some());
        assert_eq!(agent.job_count, 4);
    }

    #[test]
    fn version_embeds_base_agent() {
        let version: AgentVersion = serde_json::from_value(json!({
            "id": "v-1",
            "version_name": "v1",
            "input_definitions": [{"key": "text", "data_type": "text/plain"}],
            "engine_config": null,
            "base_agent": {"id": "agent-1"}
        }))
        .unwrap();
        assert_eq!(version.base_agent.id, "agent-1");
        assert_eq!(version.input_definitions[0].key, "text");
        assert!(version.engine_config.is_empty());
    }

    #[test]
    fn update_omits_unset_fields() {
        let update = AgentUpdate { disable_cache: Some(true), ..AgentUpdate::default() };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"disable_cache": true}));
    }

    #[test]
    fn new_agent_builder_serializes_optional_fields() {
        let agent = NewAgent::new("Summarizer", "engine-1").version_name("v1");
        let value = serde_json::to_value(&agent).unwrap();
        assert_eq!(value["version_name"], "v1");
        assert!(value.get("description").is_none());
        assert_eq!(value["input_definitions"], json!([]));
    }

    #[test]
    fn input_definition_skips_defaults() {
        let def = AgentInputDefinition {
            key: "pdf".into(),
            data_type: "application/pdf".into(),
            ..AgentInputDefinition::default()
        };
        let value = serde_json::to_value(&def).unwrap();
        assert!(value.get("example").is_none());
        assert!(value.get("accepts_multiple_files").is_none());
    }
}
