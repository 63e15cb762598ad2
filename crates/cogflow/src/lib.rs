//! Platform facade: the single entry point a CLI or HTTP
//! adapter calls — load/validate/compile/cache, analyze, execute, simulate,
//! and summarize execution history.
//!
//! Caches are `dashmap::DashMap`, the way the teacher's eval engine already
//! reaches for `dashmap` for its own internal caches, giving the
//! single-writer-discipline guarantee of without a hand-rolled
//! `Mutex`/`RwLock`.

pub mod analyze;
pub mod export;
pub mod report;
pub mod template;

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use dashmap::DashMap;

use cogflow_common::Value;
use cogflow_engine::{
    compile as compile_document, document::Document, evaluate::CustomRegistry, execute as run_execution,
    optimize as optimize_graph, validate as validate_document, validate_file, CompiledGraph,
    ExecutionOverrides, ExecutionResult, OptimizationMode, ValidationResult,
};

pub use analyze::{AnalysisResult, ComplexityBucket};
pub use export::ExportFormat;
pub use report::Report;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("no compiled graph cached under id '{0}'")]
    NotLoaded(String),
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

#[derive(Debug, Clone)]
pub struct LoadResult {
    pub validation: ValidationResult,
    pub graph: Option<CompiledGraph>,
}

pub struct Platform {
    graphs: DashMap<String, CompiledGraph>,
    history: DashMap<String, Vec<(chrono::DateTime<Utc>, ExecutionResult)>>,
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform {
    pub fn new() -> Self {
        Self {
            graphs: DashMap::new(),
            history: DashMap::new(),
        }
    }

    /// Loads a document from `path`: validates, and on success compiles and
    /// caches it under `metadata.id`.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub fn load_document(&self, path: &Path) -> Result<LoadResult, PlatformError> {
        let content = std::fs::read_to_string(path).map_err(|source| PlatformError::Io {
                path: path.display().to_string(),
                source,
        })?;
        let doc: Document = serde_json::from_str(&content).map_err(|source| PlatformError::Json {
                path: path.display().to_string(),
                source,
        })?;
        Ok(self.load_document_object(&doc))
    }

    /// Validates (and, if valid, compiles and caches) a document object
    /// directly, skipping file IO.
    pub fn load_document_object(&self, doc: &Document) -> LoadResult {
        let validation = validate_document(doc);
        if !validation.valid {
            return LoadResult { validation, graph: None };
        }
        let graph = compile_document(doc);
        self.graphs.insert(doc.metadata.id.clone(), graph.clone());
        tracing::debug!(document_id = %doc.metadata.id, "compiled and cached graph");
        LoadResult { validation, graph: Some(graph) }
    }

    /// Validates a document object without touching the cache.
    pub fn validate(&self, doc: &Document) -> ValidationResult {
        validate_document(doc)
    }

    pub fn validate_file(&self, path: &Path) -> ValidationResult {
        validate_file(path)
    }

    /// Batch-validate: one result per path, in input order.
    pub fn validate_many(&self, paths: &[&Path]) -> Vec<ValidationResult> {
        paths.iter().map(|p| validate_file(p)).collect()
    }

    /// Compiles with an optimization mode and re-caches the result under
    /// `doc.metadata.id`.
    pub fn compile_with_optimization(&self, doc: &Document, mode: OptimizationMode) -> CompiledGraph {
        let graph = compile_document(doc);
        let optimized = optimize_graph(graph, mode);
        self.graphs.insert(doc.metadata.id.clone(), optimized.clone());
        optimized
    }

    pub fn cached_graph(&self, id: &str) -> Option<CompiledGraph> {
        self.graphs.get(id).map(|r| r.clone())
    }

    pub fn cached_ids(&self) -> Vec<String> {
        self.graphs.iter().map(|r| r.key().clone()).collect()
    }

    pub fn clear_cache(&self, id: &str) {
        self.graphs.remove(id);
    }

    pub fn clear_all_caches(&self) {
        self.graphs.clear();
    }

    /// Serializes the cached graph's export view (: adjacency keyed
    /// by node id) as pretty JSON.
    pub fn save_graph_json(&self, id: &str) -> Result<String, PlatformError> {
        let graph = self.cached_graph(id).ok_or_else(|| PlatformError::NotLoaded(id.to_string()))?;
        Ok(serde_json::to_string_pretty(&graph.to_export_json()).unwrap_or_default())
    }

    pub fn analyze(&self, doc: &Document) -> AnalysisResult {
        analyze::analyze(doc, &compile_document(doc))
    }

    pub fn report(&self, doc: &Document) -> Report {
        let validation = validate_document(doc);
        let analysis = analyze::analyze(doc, &compile_document(doc));
        report::build(validation, analysis)
    }

    /// Executes a previously loaded document by id; appends the
    /// result (tagged with its start time) to that id's history list.
    #[tracing::instrument(skip(self, inputs, custom))]
    pub fn execute(
        &self,
        id: &str,
        inputs: &HashMap<String, Value>,
        overrides: Option<ExecutionOverrides>,
        custom: &CustomRegistry) -> Result<ExecutionResult, PlatformError> {
        let graph = self.cached_graph(id).ok_or_else(|| PlatformError::NotLoaded(id.to_string()))?;
        let started_at = Utc::now();
        let result = run_execution(&graph, inputs, overrides, custom);
        self.history
        .entry(id.to_string())
        .or_default()
        .push((started_at, result.clone()));
        tracing::debug!(document_id = %id, success = result.success, "execution finished");
        Ok(result)
    }

    /// Validates, compiles, and executes a document straight from a file
    /// path without requiring a prior `load_document` call.
    pub fn execute_file(
        &self,
        path: &Path,
        inputs: &HashMap<String, Value>,
        overrides: Option<ExecutionOverrides>,
        custom: &CustomRegistry) -> Result<ExecutionResult, PlatformError> {
        let load = self.load_document(path)?;
        let graph = load.graph.ok_or_else(|| PlatformError::NotLoaded(path.display().to_string()))?;
        Ok(run_execution(&graph, inputs, overrides, custom))
    }

    /// Simulates against a deep copy of the cached graph, leaving the cache
    /// (and history) untouched.
    pub fn simulate(
        &self,
        id: &str,
        inputs: &HashMap<String, Value>,
        overrides: Option<ExecutionOverrides>,
        custom: &CustomRegistry) -> Result<ExecutionResult, PlatformError> {
        let graph = self.cached_graph(id).ok_or_else(|| PlatformError::NotLoaded(id.to_string()))?;
        Ok(run_execution(&graph, inputs, overrides, custom))
    }

    pub fn history_for(&self, id: &str) -> Vec<ExecutionResult> {
        self.history
        .get(id)
        .map(|entries| entries.iter().map(|(_, r)| r.clone()).collect())
        .unwrap_or_default()
    }

    pub fn clear_history(&self, id: &str) {
        self.history.remove(id);
    }

    pub fn clear_all_history(&self) {
        self.history.clear();
    }

    /// Batch-execute: one result per id, in input order; ids
    /// with no cached graph yield `Err` for that slot without aborting the
    /// batch.
    pub fn execute_many(
        &self,
        requests: &[(&str, HashMap<String, Value>)],
        custom: &CustomRegistry) -> Vec<Result<ExecutionResult, PlatformError>> {
        requests
        .iter()
        .map(|(id, inputs)| self.execute(id, inputs, None, custom))
        .collect()
    }

    pub fn export_history(&self, id: &str, format: ExportFormat) -> Result<String, PlatformError> {
        let results = self.history_for(id);
        Ok(export::render(id, &results, format))
    }

    pub fn create_template(&self, id: &str, name: &str, author: Option<&str>) -> Document {
        template::create_template(id, name, author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogflow_engine::document::*;
    use cogflow_common::{NodeType as NT, RelationType as RT};
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
                id: "weather".into(),
                name: "Weather decision".into(),
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
    fn load_then_fetch_round_trips_through_cache() {
        let platform = Platform::new();
        let load = platform.load_document_object(&doc());
        assert!(load.validation.valid);
        assert!(platform.cached_graph("weather").is_some());
        assert_eq!(platform.cached_ids(), vec!["weather".to_string()]);
    }

    #[test]
    fn execute_records_history() {
        let platform = Platform::new();
        platform.load_document_object(&doc());
        let mut inputs = HashMap::new();
        inputs.insert("a".to_string(), Value::Number(3.0));
        let custom = CustomRegistry::new();
        platform.execute("weather", &inputs, None, &custom).unwrap();
        assert_eq!(platform.history_for("weather").len(), 1);
    }

    #[test]
    fn simulate_does_not_mutate_cache_or_history() {
        let platform = Platform::new();
        platform.load_document_object(&doc());
        let mut inputs = HashMap::new();
        inputs.insert("a".to_string(), Value::Number(3.0));
        let custom = CustomRegistry::new();
        platform.simulate("weather", &inputs, None, &custom).unwrap();
        assert!(platform.history_for("weather").is_empty());
    }

    #[test]
    fn execute_on_unloaded_id_is_an_error() {
        let platform = Platform::new();
        let custom = CustomRegistry::new();
        assert!(platform.execute("missing", &HashMap::new(), None, &custom).is_err());
    }

    #[test]
    fn load_document_reads_and_caches_a_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("weather.json");
        std::fs::write(&path, serde_json::to_string(&doc()).unwrap()).unwrap();

        let platform = Platform::new();
        let load = platform.load_document(&path).unwrap();
        assert!(load.validation.valid);
        assert!(platform.cached_graph("weather").is_some());
    }

    #[test]
    fn load_document_on_missing_file_is_an_io_error() {
        let platform = Platform::new();
        let err = platform.load_document(std::path::Path::new("/no/such/document.json")).unwrap_err();
        assert!(matches!(err, PlatformError::Io { .. }));
    }
}
