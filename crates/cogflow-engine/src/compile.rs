//! Graph compiler: lowers a validated `Document` into a
//! `CompiledGraph` using the arena-plus-index discipline of Design
//! Notes — two dense arrays (`nodes`, `relations`) plus index maps, the
//! Rust-idiomatic analogue of the teacher's `VertexId`-indexed dependency
//! graph.

use chrono::{DateTime, Utc};
use cogflow_common::{NodeState, NodeType};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::document::{Document, ExecutionConfig, Node, Relation};
use crate::graph_algo::count_back_edges;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    Speed,
    Memory,
    Balanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationTag {
    #[serde(rename = "type")]
    pub mode: OptimizationMode,
    pub applied: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complexity {
    pub max_depth: usize,
    pub avg_branching: f64,
    pub cycle_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationInfo {
    pub timestamp: DateTime<Utc>,
    pub node_count: usize,
    pub relation_count: usize,
    pub complexity: Complexity,
}

/// The execution-ready graph. Nodes and
/// relations live in dense, input-ordered `Vec`s; everything else is an
/// index into one of those two arrays, never a string lookup on the hot
/// path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledGraph {
    pub metadata: crate::document::Metadata,
    pub execution_config: ExecutionConfig,
    pub nodes: Vec<Node>,
    pub relations: Vec<Relation>,
    #[serde(skip)]
    pub node_index: FxHashMap<String, usize>,
    #[serde(skip)]
    pub relation_index: FxHashMap<String, usize>,
    /// Forward adjacency keyed by node *index*: `node_index[i] -> [j,...]`.
    #[serde(skip)]
    pub forward: Vec<Vec<usize>>,
    /// Reverse adjacency, same keying.
    #[serde(skip)]
    pub reverse: Vec<Vec<usize>>,
    /// `contains` edges, kept out of `forward`/`reverse` per
    /// — structural only, queried via `containing`/`contained_by`.
    #[serde(skip)]
    contains_forward: Vec<Vec<usize>>,
    #[serde(skip)]
    contains_reverse: Vec<Vec<usize>>,
    pub entry_points: Vec<String>,
    pub exit_points: Vec<String>,
    pub compilation: CompilationInfo,
    pub optimization: Option<OptimizationTag>,
}

impl CompiledGraph {
    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn relation_by_id(&self, id: &str) -> Option<&Relation> {
        self.relation_index.get(id).map(|&i| &self.relations[i])
    }

    pub fn predecessors(&self, id: &str) -> Vec<&Node> {
        match self.node_index.get(id) {
            Some(&i) => self.reverse[i].iter().map(|&j| &self.nodes[j]).collect(),
            None => Vec::new(),
        }
    }

    pub fn successors(&self, id: &str) -> Vec<&Node> {
        match self.node_index.get(id) {
            Some(&i) => self.forward[i].iter().map(|&j| &self.nodes[j]).collect(),
            None => Vec::new(),
        }
    }

    /// The relation object connecting `source` to `target`, if any
    /// (picks the first match in input order; duplicate edges between the
    /// same pair are not expected in practice but not forbidden either).
    pub fn relation_between(&self, source: &str, target: &str) -> Option<&Relation> {
        self.relations
        .iter()
        .find(|r| r.source == source && r.target == target)
    }

    /// Structural query: nodes this node's `contains` edges
    /// point at.
    pub fn containing(&self, id: &str) -> Vec<&Node> {
        match self.node_index.get(id) {
            Some(&i) => self.contains_forward[i].iter().map(|&j| &self.nodes[j]).collect(),
            None => Vec::new(),
        }
    }

    /// Structural query: nodes whose `contains` edge points at this node.
    pub fn contained_by(&self, id: &str) -> Vec<&Node> {
        match self.node_index.get(id) {
            Some(&i) => self.contains_reverse[i].iter().map(|&j| &self.nodes[j]).collect(),
            None => Vec::new(),
        }
    }

    /// Export rendering: adjacency keyed by node id, not dense
    /// index — the shape an external JSON consumer actually wants, versus
    /// the `#[serde(skip)]`ped index-keyed maps used internally.
    pub fn to_export_json(&self) -> Json {
        let forward_by_id: std::collections::BTreeMap<&str, Vec<&str>> = self
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| {
                (
                    n.id.as_str(),
                    self.forward[i].iter().map(|&j| self.nodes[j].id.as_str()).collect())
        })
        .collect();
        let reverse_by_id: std::collections::BTreeMap<&str, Vec<&str>> = self
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| {
                (
                    n.id.as_str(),
                    self.reverse[i].iter().map(|&j| self.nodes[j].id.as_str()).collect())
        })
        .collect();

        serde_json::json!({
                "metadata": self.metadata,
                "execution_config": self.execution_config,
                "nodes": self.nodes,
                "relations": self.relations,
                "forward_adjacency": forward_by_id,
                "reverse_adjacency": reverse_by_id,
                "entry_points": self.entry_points,
                "exit_points": self.exit_points,
                "compilation": self.compilation,
                "optimization": self.optimization,
        })
    }
}

/// Compiles a validated document. Callers are expected to have already run
/// `crate::validate::validate` and checked `valid`; this function does not
/// re-validate.
#[tracing::instrument(skip(doc), fields(document_id = %doc.metadata.id))]
pub fn compile(doc: &Document) -> CompiledGraph {
    tracing::debug!(nodes = doc.nodes.len(), relations = doc.relations.len(), "compiling document");
    let mut nodes = doc.nodes.clone();
    let mut relations = doc.relations.clone();

    for node in &mut nodes {
        if node.data.confidence.is_none() {
            node.data.confidence = Some(1.0);
        }
        if node.data.weight.is_none() {
            node.data.weight = Some(1.0);
        }
        if node.data.state.is_none() {
            node.data.state = Some(NodeState::Active);
        }
    }
    for rel in &mut relations {
        if rel.strength.is_none() {
            rel.strength = Some(1.0);
        }
        if rel.bidirectional.is_none() {
            rel.bidirectional = Some(false);
        }
    }

    let node_index: FxHashMap<String, usize> =
    nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();
    let relation_index: FxHashMap<String, usize> =
    relations.iter().enumerate().map(|(i, r)| (r.id.clone(), i)).collect();

    let mut forward = vec![Vec::new(); nodes.len()];
    let mut reverse = vec![Vec::new(); nodes.len()];
    let mut contains_forward = vec![Vec::new(); nodes.len()];
    let mut contains_reverse = vec![Vec::new(); nodes.len()];

    for rel in &relations {
        let (Some(&s), Some(&t)) = (node_index.get(&rel.source), node_index.get(&rel.target)) else {
            continue;
        };
        if rel.relation_type == NodeRelationKind::Contains {
            contains_forward[s].push(t);
            contains_reverse[t].push(s);
            continue;
        }
        forward[s].push(t);
        reverse[t].push(s);
        // bidirectional relations are added to *both*
        // adjacency structures, preserved for compatibility even though it
        // double-counts branching factor.
        if rel.bidirectional == Some(true) {
            forward[t].push(s);
            reverse[s].push(t);
        }
    }

    let entry_points = infer_entry_points(&nodes, &reverse);
    let exit_points = infer_exit_points(&nodes, &forward);

    let mut execution_config = doc.execution.clone().unwrap_or(ExecutionConfig {
            entry_points: vec![],
            exit_points: vec![],
            max_iterations: None,
            timeout_ms: None,
            mode: None,
    });
    if execution_config.max_iterations.is_none() {
        execution_config.max_iterations = Some(ExecutionConfig::DEFAULT_MAX_ITERATIONS);
    }
    if execution_config.timeout_ms.is_none() {
        execution_config.timeout_ms = Some(ExecutionConfig::DEFAULT_TIMEOUT_MS);
    }
    if execution_config.mode.is_none() {
        execution_config.mode = Some(crate::document::ExecutionMode::Adaptive);
    }

    let complexity = compute_complexity(&nodes, &forward);

    CompiledGraph {
        metadata: doc.metadata.clone(),
        execution_config,
        nodes,
        relations,
        node_index,
        relation_index,
        forward,
        reverse,
        contains_forward,
        contains_reverse,
        entry_points,
        exit_points,
        compilation: CompilationInfo {
            timestamp: Utc::now(),
            node_count: doc.nodes.len(),
            relation_count: doc.relations.len(),
            complexity,
        },
        optimization: None,
    }
}

// Re-exported locally to avoid a long `cogflow_common::RelationType::Contains`
// at every call site below.
use cogflow_common::RelationType as NodeRelationKind;

fn infer_entry_points(nodes: &[Node], reverse: &[Vec<usize>]) -> Vec<String> {
    let mut entries: Vec<String> = nodes
    .iter()
    .enumerate()
    .filter(|(i, n)| {
            reverse[*i].is_empty()
            || n.node_type == NodeType::Event
            || n.data.state == Some(NodeState::Active)
    })
    .map(|(_, n)| n.id.clone())
    .collect();

    if entries.is_empty() {
        if let Some(first) = nodes.first() {
            entries.push(first.id.clone());
        }
    }
    entries
}

fn infer_exit_points(nodes: &[Node], forward: &[Vec<usize>]) -> Vec<String> {
    nodes
    .iter()
    .enumerate()
    .filter(|(i, n)| {
            forward[*i].is_empty() || (n.node_type == NodeType::Action && forward[*i].len() <= 1)
    })
    .map(|(_, n)| n.id.clone())
    .collect()
}

fn compute_complexity(nodes: &[Node], forward: &[Vec<usize>]) -> Complexity {
    let n = nodes.len();
    let max_depth = max_bfs_depth(n, forward);

    let branching_nodes: Vec<usize> = forward.iter().map(|v| v.len()).filter(|&d| d > 0).collect();
    let avg_branching = if branching_nodes.is_empty() {
        0.0
    } else {
        branching_nodes.iter().sum::<usize>() as f64 / branching_nodes.len() as f64
    };

    let cycle_count = count_back_edges(n, forward);

    Complexity { max_depth, avg_branching, cycle_count }
}

/// BFS depth from every unvisited node, handling disconnected components
///, returning the maximum depth observed across all of them.
fn max_bfs_depth(n: usize, forward: &[Vec<usize>]) -> usize {
    let mut visited = vec![false; n];
    let mut max_depth = 0usize;

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((start, 0usize));
        visited[start] = true;
        while let Some((v, depth)) = queue.pop_front() {
            max_depth = max_depth.max(depth);
            for &next in &forward[v] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back((next, depth + 1));
                }
            }
        }
    }
    max_depth
}

/// `optimize`: takes the graph by value and returns it — the
/// compiler stays pure, so `optimize(optimize(g, m), m) == optimize(g, m)`
/// holds and is exercised as a property test.
pub fn optimize(mut graph: CompiledGraph, mode: OptimizationMode) -> CompiledGraph {
    match mode {
        OptimizationMode::Speed => sort_adjacency_by_strength(&mut graph),
        OptimizationMode::Memory => strip_defaults(&mut graph, |_| true),
        OptimizationMode::Balanced => {
            sort_adjacency_by_strength(&mut graph);
            strip_defaults(&mut graph, |n| {
                    !matches!(n.node_type, NodeType::Condition | NodeType::Formula)
            });
        }
    }

    graph.optimization = Some(OptimizationTag {
            mode,
            applied: true,
            timestamp: Utc::now(),
    });
    annotate_extensions(&mut graph);
    graph
}

fn sort_adjacency_by_strength(graph: &mut CompiledGraph) {
    let strength_of = |source_idx: usize, target_idx: usize, graph: &CompiledGraph| -> f64 {
        let source_id = &graph.nodes[source_idx].id;
        let target_id = &graph.nodes[target_idx].id;
        graph
        .relation_between(source_id, target_id)
        .and_then(|r| r.strength)
        .unwrap_or(1.0)
    };

    for i in 0..graph.forward.len() {
        let mut targets = graph.forward[i].clone();
        targets.sort_by(|&a, &b| {
                strength_of(i, b, graph)
                .partial_cmp(&strength_of(i, a, graph))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        graph.forward[i] = targets;
    }
}

fn strip_defaults(graph: &mut CompiledGraph, node_filter: impl Fn(&Node) -> bool) {
    for node in &mut graph.nodes {
        if node_filter(node) {
            if node.data.confidence == Some(1.0) {
                node.data.confidence = None;
            }
            if node.data.weight == Some(1.0) {
                node.data.weight = None;
            }
            if node.data.state == Some(NodeState::Active) {
                node.data.state = None;
            }
        }
    }
    for rel in &mut graph.relations {
        if rel.strength == Some(1.0) {
            rel.strength = None;
        }
        if rel.bidirectional == Some(false) {
            rel.bidirectional = None;
        }
    }
}

/// Writes the optimization tag into `graph.metadata.extensions` as well, so
/// JSON export surfaces it without a bespoke field alongside `graph.optimization`.
fn annotate_extensions(graph: &mut CompiledGraph) {
    if let Some(tag) = &graph.optimization {
        let json: Json = serde_json::to_value(tag).unwrap_or(Json::Null);
        graph.metadata.extensions.insert("optimization".to_string(), json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::*;
    use cogflow_common::{NodeType as NT, RelationType as RT};
    use proptest::prelude::*;
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

    fn doc_with(nodes: Vec<Node>, relations: Vec<Relation>) -> Document {
        Document {
            metadata: Metadata {
                id: "doc".into(),
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
            nodes,
            relations,
            execution: None,
        }
    }

    #[test]
    fn single_node_is_both_entry_and_exit() {
        let doc = doc_with(vec![node("n1", NT::Concept)], vec![]);
        let g = compile(&doc);
        assert_eq!(g.entry_points, vec!["n1".to_string()]);
        assert_eq!(g.exit_points, vec!["n1".to_string()]);
    }

    #[test]
    fn defaults_are_filled_in() {
        let doc = doc_with(vec![node("n1", NT::Concept)], vec![]);
        let g = compile(&doc);
        assert_eq!(g.nodes[0].data.confidence, Some(1.0));
        assert_eq!(g.nodes[0].data.weight, Some(1.0));
    }

    #[test]
    fn bidirectional_relation_appears_in_both_adjacencies() {
        let mut rel = relation("r1", RT::Causes, "a", "b");
        rel.bidirectional = Some(true);
        let doc = doc_with(vec![node("a", NT::Concept), node("b", NT::Concept)], vec![rel]);
        let g = compile(&doc);
        let a = g.node_index["a"];
        let b = g.node_index["b"];
        assert!(g.forward[a].contains(&b));
        assert!(g.forward[b].contains(&a));
        assert!(g.reverse[a].contains(&b));
        assert!(g.reverse[b].contains(&a));
    }

    #[test]
    fn contains_relations_are_excluded_from_causal_adjacency() {
        let rel = relation("r1", RT::Contains, "a", "b");
        let doc = doc_with(vec![node("a", NT::Concept), node("b", NT::Concept)], vec![rel]);
        let g = compile(&doc);
        let a = g.node_index["a"];
        assert!(g.forward[a].is_empty());
        assert_eq!(g.containing("a").len(), 1);
    }

    #[test]
    fn optimize_is_idempotent() {
        let rel = relation("r1", RT::Causes, "a", "b");
        let doc = doc_with(vec![node("a", NT::Concept), node("b", NT::Concept)], vec![rel]);
        let g = compile(&doc);
        let once = optimize(g.clone(), OptimizationMode::Memory);
        let twice = optimize(optimize(g, OptimizationMode::Memory), OptimizationMode::Memory);
        assert_eq!(once.nodes.len(), twice.nodes.len());
        for (a, b) in once.nodes.iter().zip(twice.nodes.iter()) {
            assert_eq!(a.data.confidence, b.data.confidence);
            assert_eq!(a.data.weight, b.data.weight);
        }
    }

    proptest! {
        #[test]
        fn optimize_is_idempotent_over_random_chains(
            chain_len in 1usize..12,
            mode_idx in 0usize..3,
        ) {
            let modes = [OptimizationMode::Speed, OptimizationMode::Memory, OptimizationMode::Balanced];
            let mode = modes[mode_idx];

            let nodes: Vec<Node> = (0..chain_len)
                .map(|i| node(&format!("n{i}"), NT::Concept))
                .collect();
            let relations: Vec<Relation> = (0..chain_len.saturating_sub(1))
                .map(|i| relation(&format!("r{i}"), RT::Causes, &format!("n{i}"), &format!("n{}", i + 1)))
                .collect();
            let doc = doc_with(nodes, relations);
            let g = compile(&doc);

            let once = optimize(g.clone(), mode);
            let twice = optimize(optimize(g, mode), mode);

            prop_assert_eq!(once.nodes.len(), twice.nodes.len());
            for (a, b) in once.nodes.iter().zip(twice.nodes.iter()) {
                prop_assert_eq!(a.data.confidence, b.data.confidence);
                prop_assert_eq!(a.data.weight, b.data.weight);
            }
            prop_assert_eq!(
                once.optimization.as_ref().map(|t| t.mode),
                twice.optimization.as_ref().map(|t| t.mode)
            );
        }
    }
}
