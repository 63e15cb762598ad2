//! The document schema: `Document`, `Metadata`, `Node`,
//! `Relation`, and `ExecutionConfig`, exactly as produced by an external
//! document author and consumed by the validator.
//!
//! Every optional field is genuinely optional in the wire format; the
//! compiler (`crate::compile`), not this module, is responsible for
//! filling in defaults.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cogflow_common::{NodeState, NodeType, RelationType};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

fn default_json_map() -> BTreeMap<String, Json> {
    BTreeMap::new()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub metadata: Metadata,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default)]
    pub execution: Option<ExecutionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRef {
    pub id: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
    #[serde(default = "default_json_map")]
    pub extensions: BTreeMap<String, Json>,
}

impl Metadata {
    pub fn semver(&self) -> Result<Version, semver::Error> {
        Version::parse(&self.version)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeData {
    #[serde(default)]
    pub value: Option<cogflow_common::Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default = "default_json_map")]
    pub parameters: BTreeMap<String, Json>,
    #[serde(default)]
    pub state: Option<NodeState>,
    /// Carried from `original_source/` (document format.md §3.1 of SPEC_FULL): free-form
    /// tags surfaced only in facade `analyze` reporting, never read by the
    /// engine.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Touched by the scheduler whenever a node's value changes; provenance
    /// only, not invariant-bearing.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data: NodeData,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub custom_type: Option<String>,
    #[serde(default = "default_json_map")]
    pub extensions: BTreeMap<String, Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationCondition {
    pub field: String,
    pub operator: String,
    pub value: cogflow_common::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelationMetadata {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub strength: Option<f64>,
    #[serde(default)]
    pub bidirectional: Option<bool>,
    #[serde(default)]
    pub activation_conditions: Vec<ActivationCondition>,
    #[serde(default)]
    pub custom_type: Option<String>,
    #[serde(default = "default_json_map")]
    pub extensions: BTreeMap<String, Json>,
    #[serde(default)]
    pub metadata: RelationMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
    Adaptive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub exit_points: Vec<String>,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub mode: Option<ExecutionMode>,
}

impl ExecutionConfig {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations.unwrap_or(Self::DEFAULT_MAX_ITERATIONS)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(Self::DEFAULT_TIMEOUT_MS)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode.unwrap_or(ExecutionMode::Adaptive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document_json() {
        let json = serde_json::json!({
                "metadata": {
                    "id": "doc-1",
                    "name": "Sample",
                    "version": "1.0.0",
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z",
                },
                "nodes": [
                    {"id": "n1", "type": "concept", "label": "N1"}
                ],
        });
        let doc: Document = serde_json::from_value(json).unwrap();
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.relations.len(), 0);
        assert!(doc.execution.is_none());
    }

    #[test]
    fn execution_config_defaults_apply_when_absent() {
        let cfg = ExecutionConfig {
            entry_points: vec![],
            exit_points: vec![],
            max_iterations: None,
            timeout_ms: None,
            mode: None,
        };
        assert_eq!(cfg.max_iterations(), 1000);
        assert_eq!(cfg.timeout_ms(), 30_000);
        assert_eq!(cfg.mode(), ExecutionMode::Adaptive);
    }
}
