//! Document validator: one function per phase, composed by
//! `validate`. A failing phase-1 check returns immediately with a bare
//! summary; later phases accumulate errors and warnings and keep going so
//! a single report names every problem, not just the first.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use cogflow_common::{is_valid_identifier, ConditionOperator, ErrorKind, EngineError, NodeType};
use cogflow_expr::parens_balanced;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::graph_algo::detect_cycle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub node_count: usize,
    pub relation_count: usize,
    pub entry_points: usize,
    pub exit_points: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<EngineError>,
    pub warnings: Vec<EngineError>,
    pub summary: ValidationSummary,
}

fn bare_summary(doc: &Document) -> ValidationSummary {
    ValidationSummary {
        node_count: doc.nodes.len(),
        relation_count: doc.relations.len(),
        entry_points: doc
        .execution
        .as_ref()
        .map(|e| e.entry_points.len())
        .unwrap_or(0),
        exit_points: doc
        .execution
        .as_ref()
        .map(|e| e.exit_points.len())
        .unwrap_or(0),
    }
}

/// Runs all four phases in order; phase 1 failures short-circuit
/// the remaining phases.
#[tracing::instrument(skip(doc), fields(document_id = %doc.metadata.id))]
pub fn validate(doc: &Document) -> ValidationResult {
    let mut errors = Vec::new();

    check_schema(doc, &mut errors);
    if errors.iter().any(|e| e.is_fatal()) {
        tracing::debug!(error_count = errors.len(), "schema phase failed, short-circuiting");
        return ValidationResult {
            valid: false,
            errors,
            warnings: Vec::new(),
            summary: bare_summary(doc),
        };
    }

    check_references(doc, &mut errors);
    check_structure(doc, &mut errors);

    let mut warnings = Vec::new();
    check_warnings(doc, &mut warnings);

    let valid = !errors.iter().any(|e| e.is_fatal());
    ValidationResult {
        valid,
        errors,
        warnings,
        summary: bare_summary(doc),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path} as JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// `validate_file`: on IO or parse failure, returns a
/// `ValidationResult` carrying a single `schema` error and a bare (all-zero)
/// summary, matching the "always produces a summary" contract of.
pub fn validate_file(path: &std::path::Path) -> ValidationResult {
    let path_str = path.display().to_string();
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(source) => {
            return schema_failure(&path_str, &LoadError::Io { path: path_str.clone(), source }.to_string())
        }
    };
    let doc: Document = match serde_json::from_str(&content) {
        Ok(d) => d,
        Err(source) => {
            return schema_failure(
                &path_str,
                &LoadError::Json { path: path_str.clone(), source }.to_string())
        }
    };
    validate(&doc)
}

fn schema_failure(path: &str, message: &str) -> ValidationResult {
    ValidationResult {
        valid: false,
        errors: vec![EngineError::new(ErrorKind::Schema, message).with_path(path)],
        warnings: Vec::new(),
        summary: ValidationSummary {
            node_count: 0,
            relation_count: 0,
            entry_points: 0,
            exit_points: 0,
        },
    }
}

/// Phase 1: required fields, enum legality, numeric bounds, identifier
/// patterns, timestamp/version shape.
fn check_schema(doc: &Document, errors: &mut Vec<EngineError>) {
    if !is_valid_identifier(&doc.metadata.id) {
        errors.push(EngineError::new(
                ErrorKind::Schema,
                format!("metadata.id '{}' does not match [A-Za-z0-9_-]+", doc.metadata.id)));
    }
    if doc.metadata.semver().is_err() {
        errors.push(EngineError::new(
                ErrorKind::Schema,
                format!("metadata.version '{}' is not a valid MAJOR.MINOR.PATCH", doc.metadata.version)));
    }
    if doc.nodes.is_empty() {
        errors.push(EngineError::new(ErrorKind::Schema, "document must declare at least one node"));
    }

    for node in &doc.nodes {
        if !is_valid_identifier(&node.id) {
            errors.push(
                EngineError::new(
                    ErrorKind::Schema,
                    format!("node id '{}' does not match [A-Za-z0-9_-]+", node.id))
                .with_node(node.id.as_str()));
        }
        if node.node_type == NodeType::Custom && node.custom_type.is_none() {
            errors.push(
                EngineError::new(ErrorKind::Schema, "custom node requires custom_type")
                .with_node(node.id.as_str()));
        }
        if let Some(confidence) = node.data.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                errors.push(
                    EngineError::new(
                        ErrorKind::Schema,
                        format!("node '{}' confidence {confidence} out of range [0,1]", node.id))
                    .with_node(node.id.as_str()));
            }
        }
    }

    for rel in &doc.relations {
        if !is_valid_identifier(&rel.id) {
            errors.push(
                EngineError::new(
                    ErrorKind::Schema,
                    format!("relation id '{}' does not match [A-Za-z0-9_-]+", rel.id))
                .with_relation(rel.id.as_str()));
        }
        if let Some(strength) = rel.strength {
            if !(0.0..=1.0).contains(&strength) {
                errors.push(
                    EngineError::new(
                        ErrorKind::Schema,
                        format!("relation '{}' strength {strength} out of range [0,1]", rel.id))
                    .with_relation(rel.id.as_str()));
            }
        }
        for cond in &rel.activation_conditions {
            if ConditionOperator::parse(&cond.operator).is_none() {
                errors.push(
                    EngineError::new(
                        ErrorKind::Schema,
                        format!("relation '{}' has unknown operator '{}'", rel.id, cond.operator))
                    .with_relation(rel.id.as_str()));
            }
        }
    }
}

/// Phase 2: duplicate ids, relation endpoint resolution, entry/exit point
/// resolution.
fn check_references(doc: &Document, errors: &mut Vec<EngineError>) {
    let mut seen_nodes = HashSet::new();
    for node in &doc.nodes {
        if !seen_nodes.insert(node.id.clone()) {
            errors.push(
                EngineError::new(ErrorKind::Reference, format!("duplicate node id '{}'", node.id))
                .with_node(node.id.as_str()));
        }
    }

    let mut seen_relations = HashSet::new();
    for rel in &doc.relations {
        if !seen_relations.insert(rel.id.clone()) {
            errors.push(
                EngineError::new(ErrorKind::Reference, format!("duplicate relation id '{}'", rel.id))
                .with_relation(rel.id.as_str()));
        }
        if !seen_nodes.contains(&rel.source) {
            errors.push(
                EngineError::new(
                    ErrorKind::Reference,
                    format!("relation '{}' source '{}' does not exist", rel.id, rel.source))
                .with_relation(rel.id.as_str()));
        }
        if !seen_nodes.contains(&rel.target) {
            errors.push(
                EngineError::new(
                    ErrorKind::Reference,
                    format!("relation '{}' target '{}' does not exist", rel.id, rel.target))
                .with_relation(rel.id.as_str()));
        }
    }

    if let Some(exec) = &doc.execution {
        for id in exec.entry_points.iter().chain(exec.exit_points.iter()) {
            if !seen_nodes.contains(id) {
                errors.push(EngineError::new(
                        ErrorKind::Reference,
                        format!("execution config references unknown node '{id}'")));
            }
        }
    }
}

/// Phase 3: cycle detection over the causal subgraph, formula safety,
/// activation-condition operator legality (duplicated here deliberately is
/// avoided — operator legality already checked in phase 1; phase 3 instead
/// re-validates formula bodies, which require the node's own data).
fn check_structure(doc: &Document, errors: &mut Vec<EngineError>) {
    let index: HashMap<&str, usize> = doc.nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
    let mut adj = vec![Vec::new(); doc.nodes.len()];
    for rel in &doc.relations {
        if !rel.relation_type.is_causal() {
            continue;
        }
        if let (Some(&s), Some(&t)) = (index.get(rel.source.as_str()), index.get(rel.target.as_str())) {
            adj[s].push(t);
            if rel.bidirectional.unwrap_or(false) {
                adj[t].push(s);
            }
        }
    }

    if let Some(cycle_idx) = detect_cycle(doc.nodes.len(), &adj) {
        let path: Vec<String> = cycle_idx.iter().map(|&i| doc.nodes[i].id.clone()).collect();
        errors.push(EngineError::new(
                ErrorKind::Cycle,
                format!("cycle detected in causal relations: {}", path.join(" -> "))));
    }

    for node in &doc.nodes {
        if node.node_type != NodeType::Formula {
            continue;
        }
        let expr = node
        .data
        .parameters
        .get("expression")
        .or_else(|| node.data.parameters.get("formula"))
        .and_then(|v| v.as_str());
        let Some(expr) = expr else { continue };

        if !parens_balanced(expr) {
            errors.push(
                EngineError::new(ErrorKind::Logic, format!("formula '{}' has unbalanced parentheses", node.id))
                .with_node(node.id.as_str()));
            continue;
        }
        if let Err(violation) = cogflow_expr::check_whitelist(expr) {
            errors.push(
                EngineError::new(ErrorKind::Logic, format!("formula '{}': {violation}", node.id))
                .with_node(node.id.as_str()));
        }
        if let Err(e) = cogflow_expr::tokenize(expr) {
            if matches!(
                e,
                cogflow_expr::TokenizerError::Safety(cogflow_expr::SafetyViolation::BannedIdentifier(_))
            ) {
                errors.push(
                    EngineError::new(ErrorKind::Logic, format!("formula '{}': {e}", node.id))
                    .with_node(node.id.as_str()));
            }
        }
    }
}

/// Phase 4 (non-fatal): low confidence, long simple paths, isolated nodes.
fn check_warnings(doc: &Document, warnings: &mut Vec<EngineError>) {
    for node in &doc.nodes {
        if let Some(confidence) = node.data.confidence {
            if confidence < 0.3 {
                warnings.push(
                    EngineError::warning(
                        ErrorKind::Logic,
                        format!("node '{}' has low confidence {confidence}", node.id))
                    .with_node(node.id.as_str()));
            }
        }
    }

    let index: HashMap<&str, usize> = doc.nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
    let mut adj = vec![Vec::new(); doc.nodes.len()];
    let mut incident = vec![false; doc.nodes.len()];
    for rel in &doc.relations {
        if let (Some(&s), Some(&t)) = (index.get(rel.source.as_str()), index.get(rel.target.as_str())) {
            adj[s].push(t);
            incident[s] = true;
            incident[t] = true;
            if rel.bidirectional.unwrap_or(false) {
                adj[t].push(s);
                incident[s] = true;
            }
        }
    }

    for (i, node) in doc.nodes.iter().enumerate() {
        if !incident[i] {
            warnings.push(
                EngineError::warning(ErrorKind::Logic, format!("node '{}' has no incident relations", node.id))
                .with_node(node.id.as_str()));
        }
    }

    for start in 0..doc.nodes.len() {
        if let Some(path) = longest_simple_path_from(start, &adj, 11) {
            if path.len() > 10 {
                let names: Vec<String> = path.iter().map(|&i| doc.nodes[i].id.clone()).collect();
                warnings.push(EngineError::warning(
                        ErrorKind::Logic,
                        format!("path longer than 10 nodes: {}", names.join(" -> "))));
                break;
            }
        }
    }
}

/// Bounded DFS returning the first simple path found that reaches
/// `target_len` nodes, or the longest path explored if none does. `cap`
/// bounds recursion depth so a dense graph cannot blow the stack looking
/// for a warning nobody will act on differently past length 11.
fn longest_simple_path_from(start: usize, adj: &[Vec<usize>], cap: usize) -> Option<Vec<usize>> {
    fn dfs(v: usize, adj: &[Vec<usize>], visiting: &mut Vec<usize>, cap: usize) -> bool {
        if visiting.len() >= cap {
            return true;
        }
        for &next in &adj[v] {
            if visiting.contains(&next) {
                continue;
            }
            visiting.push(next);
            if dfs(next, adj, visiting, cap) {
                return true;
            }
            visiting.pop();
        }
        false
    }

    let mut visiting = vec![start];
    if dfs(start, adj, &mut visiting, cap) {
        Some(visiting)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::*;
    use cogflow_common::{NodeType, RelationType};
    use std::collections::BTreeMap;

    fn node(id: &str, node_type: NodeType) -> Node {
        Node {
            id: id.into(),
            node_type,
            label: id.into(),
            description: None,
            data: NodeData::default(),
            position: None,
            custom_type: None,
            extensions: BTreeMap::new(),
        }
    }

    fn relation(id: &str, rel_type: RelationType, source: &str, target: &str) -> Relation {
        Relation {
            id: id.into(),
            relation_type: rel_type,
            source: source.into(),
            target: target.into(),
            label: None,
            strength: None,
            bidirectional: None,
            activation_conditions: vec![],
            custom_type: None,
            extensions: BTreeMap::new(),
            metadata: RelationMetadata::default(),
        }
    }

    fn base_doc() -> Document {
        Document {
            metadata: Metadata {
                id: "doc-1".into(),
                name: "Test".into(),
                description: None,
                version: "1.0.0".into(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                author: None,
                tags: vec![],
                dependencies: vec![],
                extensions: BTreeMap::new(),
            },
            nodes: vec![],
            relations: vec![],
            execution: None,
        }
    }

    #[test]
    fn single_node_no_relations_is_valid() {
        let mut doc = base_doc();
        doc.nodes.push(node("n1", NodeType::Concept));
        let result = validate(&doc);
        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(result.summary.node_count, 1);
    }

    #[test]
    fn cycle_in_depends_on_subgraph_is_rejected() {
        let mut doc = base_doc();
        doc.nodes.push(node("a", NodeType::Concept));
        doc.nodes.push(node("b", NodeType::Concept));
        doc.nodes.push(node("c", NodeType::Concept));
        doc.relations.push(relation("r1", RelationType::DependsOn, "a", "b"));
        doc.relations.push(relation("r2", RelationType::DependsOn, "b", "c"));
        doc.relations.push(relation("r3", RelationType::DependsOn, "c", "a"));

        let result = validate(&doc);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Cycle));
    }

    #[test]
    fn contains_relations_do_not_trigger_cycle_detection() {
        let mut doc = base_doc();
        doc.nodes.push(node("a", NodeType::Concept));
        doc.nodes.push(node("b", NodeType::Concept));
        doc.relations.push(relation("r1", RelationType::Contains, "a", "b"));
        doc.relations.push(relation("r2", RelationType::Contains, "b", "a"));

        let result = validate(&doc);
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn dangling_relation_endpoint_is_a_reference_error() {
        let mut doc = base_doc();
        doc.nodes.push(node("a", NodeType::Concept));
        doc.relations.push(relation("r1", RelationType::Causes, "a", "missing"));

        let result = validate(&doc);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Reference));
    }

    #[test]
    fn formula_with_unsafe_token_is_rejected() {
        let mut doc = base_doc();
        let mut n = node("f1", NodeType::Formula);
        n.data.parameters.insert(
            "expression".into(),
            serde_json::json!("process + 1"));
        doc.nodes.push(n);

        let result = validate(&doc);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Logic));
    }

    #[test]
    fn custom_node_without_custom_type_fails_schema() {
        let mut doc = base_doc();
        doc.nodes.push(node("x", NodeType::Custom));
        let result = validate(&doc);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Schema));
    }

    #[test]
    fn validate_file_reads_a_valid_document_from_disk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("doc.json");

        let mut doc = base_doc();
        doc.nodes.push(node("n1", NodeType::Concept));
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        let result = validate_file(&path);
        assert!(result.valid);
    }

    #[test]
    fn validate_file_on_missing_path_is_a_schema_error() {
        let result = validate_file(std::path::Path::new("/no/such/document.json"));
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Schema));
    }

    #[test]
    fn validate_file_on_malformed_json_is_a_schema_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("doc.json");
        std::fs::write(&path, b"{ not valid json").unwrap();

        let result = validate_file(&path);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Schema));
    }
}
