//! Document analysis: complexity bucketing, node/
//! relation type distributions, and a short list of issues and
//! recommendations a document author can act on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use cogflow_engine::document::Document;
use cogflow_engine::CompiledGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityBucket {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub complexity_bucket: ComplexityBucket,
    pub node_type_distribution: HashMap<String, usize>,
    pub relation_type_distribution: HashMap<String, usize>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Buckets thresholds: a graph's max depth and node count
/// together decide low/medium/high, the same two inputs the compiler
/// already tracks in `CompilationInfo::complexity`.
pub fn analyze(doc: &Document, graph: &CompiledGraph) -> AnalysisResult {
    let node_count = graph.nodes.len();
    let max_depth = graph.compilation.complexity.max_depth;
    let avg_branching = graph.compilation.complexity.avg_branching;
    let cycle_count = graph.compilation.complexity.cycle_count;

    let complexity_bucket = if max_depth > 10 || avg_branching > 3.0 || node_count > 50 {
        ComplexityBucket::High
    } else if max_depth > 5 || avg_branching > 2.0 || node_count > 20 {
        ComplexityBucket::Medium
    } else {
        ComplexityBucket::Low
    };

    let mut node_type_distribution = HashMap::new();
    for node in &graph.nodes {
        *node_type_distribution.entry(node.node_type.to_string()).or_insert(0) += 1;
    }

    let mut relation_type_distribution = HashMap::new();
    for rel in &graph.relations {
        *relation_type_distribution.entry(rel.relation_type.to_string()).or_insert(0) += 1;
    }

    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if cycle_count > 0 {
        issues.push(format!("graph contains {cycle_count} back edge(s) in its causal subgraph"));
        recommendations.push("review depends_on/causes edges for unintended feedback loops".to_string());
    }
    if graph.entry_points.len() > 1 && graph.entry_points.len() as f64 / node_count as f64 > 0.5 {
        issues.push("more than half of nodes are entry points".to_string());
        recommendations.push("consider adding explicit dependencies to clarify execution order".to_string());
    }
    let isolated = graph
    .nodes
    .iter()
    .filter(|n| graph.predecessors(&n.id).is_empty() && graph.successors(&n.id).is_empty())
    .count();
    if isolated > 0 {
        issues.push(format!("{isolated} node(s) have no incoming or outgoing relations"));
        recommendations.push("connect isolated nodes or remove them".to_string());
    }
    if doc.metadata.tags.is_empty() {
        recommendations.push("add metadata.tags to help this document surface in search".to_string());
    }

    AnalysisResult {
        complexity_bucket,
        node_type_distribution,
        relation_type_distribution,
        issues,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogflow_common::{NodeType as NT, RelationType as RT};
    use cogflow_engine::document::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn node(id: &str, node_type: NT) -> Node {
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

    fn relation(id: &str, rel_type: RT, source: &str, target: &str) -> Relation {
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

    fn doc() -> Document {
        Document {
            metadata: Metadata {
                id: "d".into(),
                name: "D".into(),
                description: None,
                version: "1.0.0".into(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                author: None,
                tags: vec![],
                dependencies: vec![],
                extensions: BTreeMap::new(),
            },
            nodes: vec![node("a", NT::Concept), node("b", NT::Concept)],
            relations: vec![relation("r1", RT::Causes, "a", "b")],
            execution: None,
        }
    }

    #[test]
    fn small_acyclic_graph_is_low_complexity() {
        let d = doc();
        let g = cogflow_engine::compile(&d);
        let result = analyze(&d, &g);
        assert_eq!(result.complexity_bucket, ComplexityBucket::Low);
        assert_eq!(result.node_type_distribution.get("concept"), Some(&2));
    }

    #[test]
    fn cyclic_graph_surfaces_an_issue() {
        let mut d = doc();
        d.relations.push(relation("r2", RT::Causes, "b", "a"));
        let g = cogflow_engine::compile(&d);
        let result = analyze(&d, &g);
        assert!(result.issues.iter().any(|i| i.contains("back edge")));
    }

    proptest::proptest! {
        #[test]
        fn node_count_over_fifty_is_always_high_complexity(extra in 51usize..100) {
            let mut d = doc();
            d.nodes.clear();
            d.relations.clear();
            for i in 0..extra {
                d.nodes.push(node(&format!("n{i}"), NT::Concept));
            }
            let g = cogflow_engine::compile(&d);
            let result = analyze(&d, &g);
            proptest::prop_assert_eq!(result.complexity_bucket, ComplexityBucket::High);
        }
    }
}
