//! Template document creation: a minimal, valid skeleton an
//! author can start editing from.

use chrono::Utc;
use std::collections::BTreeMap;

use cogflow_common::NodeType;
use cogflow_engine::document::{Document, ExecutionConfig, Metadata, Node, NodeData};
use cogflow_engine::ExecutionMode;

pub fn create_template(id: &str, name: &str, author: Option<&str>) -> Document {
    let now = Utc::now();
    Document {
        metadata: Metadata {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            version: "0.1.0".to_string(),
            created_at: now,
            updated_at: now,
            author: author.map(str::to_string),
            tags: vec![],
            dependencies: vec![],
            extensions: BTreeMap::new(),
        },
        nodes: vec![Node {
                id: "start".to_string(),
                node_type: NodeType::Concept,
                label: "Start".to_string(),
                description: Some("placeholder entry node".to_string()),
                data: NodeData::default(),
                position: None,
                custom_type: None,
                extensions: BTreeMap::new(),
        }],
        relations: vec![],
        execution: Some(ExecutionConfig {
                entry_points: vec!["start".to_string()],
                exit_points: vec!["start".to_string()],
                max_iterations: None,
                timeout_ms: None,
                mode: Some(ExecutionMode::Adaptive),
        }),
    }
}
