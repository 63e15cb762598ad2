//! Execution scheduler: drives sequential, parallel,
//! adaptive, or hybrid iteration to a fixed point.
//!
//! Parallel-mode same-level evaluation uses `rayon`'s global pool exactly
//! as the teacher's eval crate already depends on it for bulk work — each
//! worker gets a read-only snapshot of the state map and returns
//! `(id, Value)` pairs that are applied back on the calling thread after
//! the whole level completes.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use cogflow_common::{EngineError, ErrorKind, Value};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compile::CompiledGraph;
use crate::document::ExecutionMode;
use crate::evaluate::{evaluate_node, CustomRegistry, StateMap};
use crate::graph_algo::tarjan_scc;
use crate::interpreter::EvalLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceAction {
    Evaluate,
    Execute,
    Trigger,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub step: u64,
    pub node_id: String,
    pub action: TraceAction,
    pub timestamp: chrono::DateTime<Utc>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub iterations_completed: u32,
    pub nodes_evaluated: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub final_state: HashMap<String, Value>,
    pub trace: Vec<TraceStep>,
    pub metrics: ExecutionMetrics,
    pub errors: Vec<EngineError>,
}

pub struct ExecutionOverrides {
    pub max_iterations: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub mode: Option<ExecutionMode>,
}

struct Driver<'a> {
    graph: &'a CompiledGraph,
    custom: &'a CustomRegistry,
    limits: EvalLimits,
    state: StateMap,
    trace: Vec<TraceStep>,
    errors: Vec<EngineError>,
    step_counter: u64,
    start: Instant,
    timeout_ms: u64,
    max_iterations: u32,
    iterations_completed: u32,
}

/// `execute`: seeds state from `inputs` (falling back to each
/// node's stored value or type default), then dispatches to the configured
/// (or overridden) scheduling mode.
#[tracing::instrument(skip(graph, inputs, overrides, custom), fields(document_id = %graph.metadata.id))]
pub fn execute(
    graph: &CompiledGraph,
    inputs: &HashMap<String, Value>,
    overrides: Option<ExecutionOverrides>,
    custom: &CustomRegistry) -> ExecutionResult {
    let max_iterations = overrides
    .as_ref()
    .and_then(|o| o.max_iterations)
    .unwrap_or_else(|| graph.execution_config.max_iterations());
    let timeout_ms = overrides
    .as_ref()
    .and_then(|o| o.timeout_ms)
    .unwrap_or_else(|| graph.execution_config.timeout_ms());
    let mode = overrides
    .and_then(|o| o.mode)
    .unwrap_or_else(|| graph.execution_config.mode());

    let mut driver = Driver {
        graph,
        custom,
        limits: EvalLimits::default(),
        state: StateMap::new(),
        trace: Vec::new(),
        errors: Vec::new(),
        step_counter: 0,
        start: Instant::now(),
        timeout_ms,
        max_iterations,
        iterations_completed: 0,
    };

    driver.seed(inputs);

    let resolved_mode = match mode {
        ExecutionMode::Sequential => ResolvedMode::Sequential,
        ExecutionMode::Parallel => ResolvedMode::Parallel,
        ExecutionMode::Adaptive => choose_adaptive_mode(graph),
    };

    tracing::debug!(mode = ?resolved_mode, "dispatching scheduler");
    let outcome = match resolved_mode {
        ResolvedMode::Sequential => driver.run_sequential(),
        ResolvedMode::Parallel => driver.run_parallel(),
        ResolvedMode::Hybrid => driver.run_hybrid(),
    };

    let result = driver.finish(outcome);
    tracing::debug!(success = result.success, iterations = result.metrics.iterations_completed, "execution finished");
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolvedMode {
    Sequential,
    Parallel,
    Hybrid,
}

/// Adaptive heuristic: small/low-branching graphs run
/// sequentially; large acyclic graphs run in parallel; everything else
/// falls back to the cycle-aware hybrid path.
fn choose_adaptive_mode(graph: &CompiledGraph) -> ResolvedMode {
    let node_count = graph.nodes.len();
    let complexity = &graph.compilation.complexity;

    if node_count < 10 || complexity.avg_branching < 2.0 {
        ResolvedMode::Sequential
    } else if complexity.cycle_count == 0 && node_count > 20 {
        ResolvedMode::Parallel
    } else {
        ResolvedMode::Hybrid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    FixedPoint,
    IterationCap,
    Timeout,
    FatalError,
}

impl<'a> Driver<'a> {
    fn seed(&mut self, inputs: &HashMap<String, Value>) {
        for node in &self.graph.nodes {
            if let Some(value) = inputs.get(&node.id) {
                self.state.insert(node.id.clone(), value.clone());
                self.push_trace(&node.id, TraceAction::Evaluate, None, Some(value.clone()), 0);
            } else {
                let default = node
                .data
                .value
                .clone()
                .unwrap_or_else(|| Value::default_for_type(node.node_type));
                self.state.insert(node.id.clone(), default);
            }
        }
    }

    fn push_trace(
        &mut self,
        node_id: &str,
        action: TraceAction,
        input: Option<Value>,
        output: Option<Value>,
        duration_ms: u64) {
        self.step_counter += 1;
        self.trace.push(TraceStep {
                step: self.step_counter,
                node_id: node_id.to_string(),
                action,
                timestamp: Utc::now(),
                input,
                output,
                duration_ms,
        });
    }

    fn timed_out(&self) -> bool {
        self.start.elapsed().as_millis() as u64 > self.timeout_ms
    }

    fn evaluate_one(&mut self, node_id: &str) -> Option<Value> {
        let node = self.graph.node_by_id(node_id)?;
        match evaluate_node(node, self.graph, &self.state, &self.limits, self.custom, Utc::now()) {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    /// Stores a changed value and marks the node completed: one `execute`
    /// trace step carrying the before/after values, then a `complete` step
    /// recording the node's transition to the completed state. The compiled
    /// graph's own `Node::data.state` is never mutated here — the graph is
    /// shared and read-only for the whole execution — so completion lives in
    /// the trace instead, the one per-run, per-node record the scheduler
    /// owns outright.
    fn apply_change(&mut self, node_id: &str, previous: Option<Value>, new_value: Value, duration_ms: u64) {
        self.state.insert(node_id.to_string(), new_value.clone());
        self.push_trace(node_id, TraceAction::Execute, previous, Some(new_value.clone()), duration_ms);
        self.push_trace(node_id, TraceAction::Complete, None, Some(new_value), 0);
    }

    /// DFS post-order over reverse adjacency: a node is visited only after
    /// everything it depends on, the same dependency-first order a
    /// recalculation pass over a `VertexId`-indexed graph would use.
    fn dependency_order(&self) -> Vec<String> {
        let n = self.graph.nodes.len();
        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);

        fn visit(
            i: usize,
            graph: &CompiledGraph,
            visited: &mut [bool],
            order: &mut Vec<String>) {
            if visited[i] {
                return;
            }
            visited[i] = true;
            for &dep in &graph.reverse[i] {
                visit(dep, graph, visited, order);
            }
            order.push(graph.nodes[i].id.clone());
        }

        for i in 0..n {
            visit(i, self.graph, &mut visited, &mut order);
        }
        order
    }

    fn run_sequential(&mut self) -> Outcome {
        let order = self.dependency_order();
        loop {
            if self.timed_out() {
                return Outcome::Timeout;
            }
            if self.iterations_completed >= self.max_iterations {
                return Outcome::IterationCap;
            }

            let mut changed = false;
            for node_id in &order {
                let step_start = Instant::now();
                let previous = self.state.get(node_id).cloned();
                let Some(new_value) = self.evaluate_one(node_id) else { continue };
                if Some(&new_value) != previous.as_ref() {
                    self.apply_change(node_id, previous, new_value, step_start.elapsed().as_millis() as u64);
                    changed = true;
                }
            }
            self.iterations_completed += 1;
            if !changed {
                return Outcome::FixedPoint;
            }
        }
    }

    /// Kahn-like layering over reverse adjacency. Capped at 100
    /// iterations; graphs needing more levels are an
    /// `execution_error`, not a silent drop of unreached nodes.
    fn compute_levels(&self) -> Result<Vec<Vec<usize>>, ()> {
        let n = self.graph.nodes.len();
        let mut remaining: Vec<usize> = (0..n)
        .map(|i| self.graph.reverse[i].len())
        .collect();
        let mut placed = vec![false; n];
        let mut levels = Vec::new();

        for _ in 0..100 {
            let level: Vec<usize> = (0..n)
            .filter(|&i| !placed[i] && remaining[i] == 0)
            .collect();
            if level.is_empty() {
                break;
            }
            for &i in &level {
                placed[i] = true;
            }
            for &i in &level {
                for &successor in &self.graph.forward[i] {
                    if !placed[successor] {
                        remaining[successor] = remaining[successor].saturating_sub(1);
                    }
                }
            }
            levels.push(level);
            if placed.iter().all(|&p| p) {
                return Ok(levels);
            }
        }

        if placed.iter().all(|&p| p) {
            Ok(levels)
        } else if levels.len() >= 100 {
            Err(())
        } else {
            // Remaining nodes are stuck in a cycle not reachable via
            // layering; says they "remain with their seeded
            // values for that pass" rather than erroring.
            Ok(levels)
        }
    }

    fn run_parallel(&mut self) -> Outcome {
        let Ok(levels) = self.compute_levels() else {
            self.errors.push(EngineError::new(
                    ErrorKind::ExecutionError,
                    "parallel-mode dependency layering exceeded 100 levels"));
            return Outcome::FatalError;
        };

        loop {
            if self.timed_out() {
                return Outcome::Timeout;
            }
            if self.iterations_completed >= self.max_iterations {
                return Outcome::IterationCap;
            }

            let mut changed = false;
            for level in &levels {
                if self.timed_out() {
                    return Outcome::Timeout;
                }
                let snapshot = self.state.clone();
                let custom = self.custom;
                let graph = self.graph;
                let limits = self.limits;
                let now = Utc::now();

                let results: Vec<(usize, Option<Value>)> = level
                .par_iter()
                .map(|&idx| {
                        let node = &graph.nodes[idx];
                        let value = evaluate_node(node, graph, &snapshot, &limits, custom, now).ok();
                        (idx, value)
                })
                .collect();

                for (idx, maybe_value) in results {
                    let node_id = &graph.nodes[idx].id;
                    let Some(new_value) = maybe_value else { continue };
                    let previous = self.state.get(node_id).cloned();
                    if Some(&new_value) != previous.as_ref() {
                        self.apply_change(node_id, previous, new_value, 0);
                        changed = true;
                    }
                }
            }
            self.iterations_completed += 1;
            if !changed {
                return Outcome::FixedPoint;
            }
        }
    }

    /// Hybrid: condensation via Tarjan SCC; singleton
    /// components evaluate normally, multi-node components iterate up to
    /// 10 internal rounds or until their own fixed point.
    fn run_hybrid(&mut self) -> Outcome {
        let n = self.graph.nodes.len();
        let sccs = tarjan_scc(n, &self.graph.forward);

        loop {
            if self.timed_out() {
                return Outcome::Timeout;
            }
            if self.iterations_completed >= self.max_iterations {
                return Outcome::IterationCap;
            }

            let mut changed = false;
            for component in &sccs {
                if component.len() == 1 {
                    let node_id = self.graph.nodes[component[0]].id.clone();
                    let previous = self.state.get(&node_id).cloned();
                    if let Some(new_value) = self.evaluate_one(&node_id) {
                        if Some(&new_value) != previous.as_ref() {
                            self.apply_change(&node_id, previous, new_value, 0);
                            changed = true;
                        }
                    }
                } else {
                    for _round in 0..10 {
                        let mut round_changed = false;
                        for &idx in component {
                            let node_id = self.graph.nodes[idx].id.clone();
                            let previous = self.state.get(&node_id).cloned();
                            if let Some(new_value) = self.evaluate_one(&node_id) {
                                if Some(&new_value) != previous.as_ref() {
                                    self.apply_change(&node_id, previous, new_value, 0);
                                    round_changed = true;
                                    changed = true;
                                }
                            }
                        }
                        if !round_changed {
                            break;
                        }
                    }
                }
                if self.timed_out() {
                    return Outcome::Timeout;
                }
            }
            self.iterations_completed += 1;
            if !changed {
                return Outcome::FixedPoint;
            }
        }
    }

    fn finish(mut self, outcome: Outcome) -> ExecutionResult {
        let success = matches!(outcome, Outcome::FixedPoint);
        match outcome {
            Outcome::Timeout => self
            .errors
            .push(EngineError::new(ErrorKind::ExecutionTimeout, "execution exceeded timeout_ms")),
            Outcome::IterationCap => self.errors.push(EngineError::new(
                    ErrorKind::InfiniteLoop,
                    format!("reached max_iterations ({})", self.max_iterations))),
            Outcome::FatalError | Outcome::FixedPoint => {}
        }

        ExecutionResult {
            success,
            final_state: self.state,
            metrics: ExecutionMetrics {
                iterations_completed: self.iterations_completed,
                nodes_evaluated: self.step_counter,
                duration_ms: self.start.elapsed().as_millis() as u64,
            },
            trace: self.trace,
            errors: self.errors,
        }
    }
}
