//! Node evaluator: one free function per node type,
//! dispatched from `evaluate_node`, mirroring the teacher's single
//! `match`-on-node-shape dispatch in its AST interpreter.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use cogflow_common::{ErrorKind, EngineError, Value};
use cogflow_expr::ExprContext;

use crate::compile::CompiledGraph;
use crate::document::{ActivationCondition, Node};
use crate::interpreter::{self, EvalLimits};

pub type StateMap = HashMap<String, Value>;

/// Externally supplied custom-node evaluators (: "there is no global
/// registry"); keyed by `custom_type`.
pub type CustomEvaluator = dyn Fn(&Node, &CompiledGraph, &StateMap) -> Value + Send + Sync;
pub type CustomRegistry = HashMap<String, Box<CustomEvaluator>>;

pub fn evaluate_node(
    node: &Node,
    graph: &CompiledGraph,
    state: &StateMap,
    limits: &EvalLimits,
    custom: &CustomRegistry,
    now: DateTime<Utc>) -> Result<Value, EngineError> {
    use cogflow_common::NodeType::*;
    match node.node_type {
        Concept => Ok(eval_concept(node, graph, state)),
        Condition => eval_condition(node, graph, state),
        Action => eval_action(node, graph, state, limits),
        Event => Ok(eval_event(node, graph, state, now)),
        Formula => eval_formula(node, graph, state, limits),
        Custom => Ok(eval_custom(node, graph, state, custom)),
    }
}

fn current_value(node: &Node, state: &StateMap) -> Value {
    state
    .get(&node.id)
    .cloned()
    .unwrap_or_else(|| node.data.value.clone().unwrap_or(Value::default_for_type(node.node_type)))
}

/// Concept: weighted average of numeric predecessor values,
/// weighted by incoming-relation strength; falls back to the stored/current
/// value with no predecessors or zero total weight.
fn eval_concept(node: &Node, graph: &CompiledGraph, state: &StateMap) -> Value {
    let predecessors = graph.predecessors(&node.id);
    if predecessors.is_empty() {
        return current_value(node, state);
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for pred in &predecessors {
        let Some(relation) = graph.relation_between(&pred.id, &node.id) else {
            continue;
        };
        let Some(value) = state.get(&pred.id).and_then(Value::as_number) else {
            continue;
        };
        let weight = relation.strength.unwrap_or(1.0);
        weighted_sum += value * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        current_value(node, state)
    } else {
        Value::Number(weighted_sum / total_weight)
    }
}

fn condition_holds(cond: &ActivationCondition, subject_value: &Value) -> bool {
    use cogflow_common::ConditionOperator::*;
    let Some(op) = cogflow_common::ConditionOperator::parse(&cond.operator) else {
        return false;
    };
    match op {
        Eq => subject_value == &cond.value,
        Neq => subject_value != &cond.value,
        Gt => subject_value.partial_cmp_value(&cond.value) == Some(std::cmp::Ordering::Greater),
        Lt => subject_value.partial_cmp_value(&cond.value) == Some(std::cmp::Ordering::Less),
        Gte => matches!(
            subject_value.partial_cmp_value(&cond.value),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
        Lte => matches!(
            subject_value.partial_cmp_value(&cond.value),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        Contains => match (subject_value, &cond.value) {
            (Value::Text(haystack), Value::Text(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.contains(needle),
            _ => false,
        },
    }
}

/// `field` on an activation condition addresses the predecessor's current
/// value directly (`data.value`) or a sub-key of an object value
/// (`data.value.foo`); anything else resolves to `Value::Null`.
fn resolve_field(field: &str, value: &Value) -> Value {
    let rest = field.strip_prefix("data.value").unwrap_or(field);
    let rest = rest.trim_start_matches('.');
    if rest.is_empty() {
        return value.clone();
    }
    match value {
        Value::Object(map) => map.get(rest).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Condition: either the `parameters.logic` boolean-grammar
/// path, or activation-condition matching against predecessors, or raw
/// truthiness with no predecessors.
fn eval_condition(node: &Node, graph: &CompiledGraph, state: &StateMap) -> Result<Value, EngineError> {
    if let Some(logic) = node.data.parameters.get("logic").and_then(|v| v.as_str()) {
        let substituted = substitute_node_ids(logic, graph, state);
        return cogflow_expr::evaluate_bool_logic(&substituted)
        .map(Value::Bool)
        .map_err(|e| {
                EngineError::new(ErrorKind::ConditionError, e.to_string()).with_node(node.id.as_str())
        });
    }

    let predecessors = graph.predecessors(&node.id);
    if predecessors.is_empty() {
        return Ok(Value::Bool(current_value(node, state).is_truthy()));
    }

    let any_satisfied = predecessors.iter().any(|pred| {
            let Some(relation) = graph.relation_between(&pred.id, &node.id) else {
                return false;
            };
            if relation.activation_conditions.is_empty() {
                return true;
            }
            let Some(pred_value) = state.get(&pred.id) else {
                return false;
            };
            relation
            .activation_conditions
            .iter()
            .all(|cond| condition_holds(cond, &resolve_field(&cond.field, pred_value)))
    });

    Ok(Value::Bool(any_satisfied))
}

/// Replaces every node id appearing in `logic` with its current truthiness
/// literal (`true`/`false`) before handing the string to the boolean
/// parser — string substitution of *literals*, never of code (///).
fn substitute_node_ids(logic: &str, graph: &CompiledGraph, state: &StateMap) -> String {
    let mut result = logic.to_string();
    let mut ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    // Replace longer ids first so one id is never a prefix-substring of another.
    ids.sort_by_key(|id| std::cmp::Reverse(id.len()));
    for id in ids {
        if !result.contains(id) {
            continue;
        }
        let truth = state
        .get(id)
        .map(Value::is_truthy)
        .unwrap_or(false);
        result = result.replace(id, if truth { "true" } else { "false" });
    }
    result
}

/// An incoming edge gates open when its relation's activation conditions
/// (if any) hold against the predecessor's current value; with no declared
/// conditions it falls back to the predecessor value's raw truthiness.
fn predecessor_edge_satisfied(pred_id: &str, node_id: &str, graph: &CompiledGraph, state: &StateMap) -> bool {
    let relation = graph.relation_between(pred_id, node_id);
    let Some(pred_value) = state.get(pred_id) else {
        return false;
    };
    match relation.filter(|r| !r.activation_conditions.is_empty()) {
        Some(relation) => relation
        .activation_conditions
        .iter()
        .all(|cond| condition_holds(cond, &resolve_field(&cond.field, pred_value))),
        None => pred_value.is_truthy(),
    }
}

/// Action: gated on every predecessor edge being satisfied (activation
/// conditions when the relation declares them, else raw truthiness); when
/// open, optionally applies `parameters.operation` over `parameters.inputs`.
fn eval_action(
    node: &Node,
    graph: &CompiledGraph,
    state: &StateMap,
    _limits: &EvalLimits) -> Result<Value, EngineError> {
    let predecessors = graph.predecessors(&node.id);
    let gated_open = predecessors
    .iter()
    .all(|pred| predecessor_edge_satisfied(&pred.id, &node.id, graph, state));

    if !gated_open {
        return Ok(current_value(node, state));
    }

    let Some(operation) = node.data.parameters.get("operation").and_then(|v| v.as_str()) else {
        return Ok(Value::Bool(true));
    };

    let Some(inputs) = node.data.parameters.get("inputs").and_then(|v| v.as_array()) else {
        return Ok(Value::Bool(true));
    };
    let values: Vec<f64> = inputs
    .iter()
    .filter_map(|v| v.as_str())
    .filter_map(|id| state.get(id))
    .filter_map(Value::as_number)
    .collect();

    let result = match operation {
        "sum" => values.iter().sum::<f64>(),
        "multiply" => values.iter().product::<f64>(),
        "transform" => values.first().copied().unwrap_or(0.0),
        other => {
            return Err(
                EngineError::new(ErrorKind::NodeExecution, format!("unknown action operation '{other}'"))
                .with_node(node.id.as_str()))
        }
    };
    Ok(Value::Number(result))
}

/// Event: time-based or state-watch triggering.
fn eval_event(node: &Node, graph: &CompiledGraph, state: &StateMap, now: DateTime<Utc>) -> Value {
    let trigger_type = node.data.parameters.get("triggerType").and_then(|v| v.as_str());
    match trigger_type {
        Some("time") => {
            let interval_secs = node.data.parameters.get("interval").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let last_trigger = node
            .data
            .last_updated
            .map(|t| now.signed_duration_since(t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(f64::INFINITY);
            Value::Bool(last_trigger >= interval_secs)
        }
        Some("state") => {
            let watched = node.data.parameters.get("watch").and_then(|v| v.as_str());
            let trigger_value = node.data.parameters.get("triggerValue").map(Value::from_json);
            match (watched, trigger_value) {
                (Some(watched_id), Some(expected)) => {
                    Value::Bool(state.get(watched_id) == Some(&expected))
                }
                _ => current_value(node, state),
            }
        }
        _ => {
            let _ = graph;
            current_value(node, state)
        }
    }
}

/// Formula: builds a variable context from the node's own
/// current value plus every predecessor's current value and hands it to
/// the sandboxed expression evaluator.
fn eval_formula(
    node: &Node,
    graph: &CompiledGraph,
    state: &StateMap,
    limits: &EvalLimits) -> Result<Value, EngineError> {
    let expr = node
    .data
    .parameters
    .get("expression")
    .or_else(|| node.data.parameters.get("formula"))
    .and_then(|v| v.as_str())
    .ok_or_else(|| {
            EngineError::new(ErrorKind::FormulaError, "formula node missing expression/formula")
            .with_node(node.id.as_str())
    })?;

    let mut ctx = ExprContext::new();
    ctx.insert(node.id.clone(), current_value(node, state));
    for pred in graph.predecessors(&node.id) {
        if let Some(v) = state.get(&pred.id) {
            ctx.insert(pred.id.clone(), v.clone());
        }
    }

    interpreter::evaluate_formula(expr, &ctx, limits).map_err(|e| e.with_node(node.id.as_str()))
}

/// Custom: dispatches to an externally supplied registry
/// entry keyed by `custom_type`; never a global registry.
fn eval_custom(node: &Node, graph: &CompiledGraph, state: &StateMap, custom: &CustomRegistry) -> Value {
    let Some(custom_type) = &node.custom_type else {
        return current_value(node, state);
    };
    match custom.get(custom_type) {
        Some(evaluator) => evaluator(node, graph, state),
        None => current_value(node, state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::document::*;
    use cogflow_common::{NodeState, NodeType as NT, RelationType as RT};
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
    fn concept_with_no_predecessors_yields_stored_value() {
        let mut n = node("c1", NT::Concept);
        n.data.value = Some(Value::Number(7.0));
        let doc = doc_with(vec![n], vec![]);
        let g = compile(&doc);
        let state = StateMap::new();
        let limits = EvalLimits::default();
        let custom = CustomRegistry::new();
        let v = evaluate_node(&g.nodes[0], &g, &state, &limits, &custom, Utc::now()).unwrap();
        assert_eq!(v, Value::Number(7.0));
    }

    #[test]
    fn concept_weighted_average_of_predecessors() {
        let mut rel1 = relation("r1", RT::Causes, "a", "c");
        rel1.strength = Some(1.0);
        let mut rel2 = relation("r2", RT::Causes, "b", "c");
        rel2.strength = Some(3.0);
        let doc = doc_with(
            vec![node("a", NT::Concept), node("b", NT::Concept), node("c", NT::Concept)],
            vec![rel1, rel2]);
        let g = compile(&doc);
        let mut state = StateMap::new();
        state.insert("a".into(), Value::Number(10.0));
        state.insert("b".into(), Value::Number(2.0));
        let limits = EvalLimits::default();
        let custom = CustomRegistry::new();
        let c_node = g.node_by_id("c").unwrap();
        let v = evaluate_node(c_node, &g, &state, &limits, &custom, Utc::now()).unwrap();
        // (10*1 + 2*3) / 4 = 4.0
        assert_eq!(v, Value::Number(4.0));
    }

    #[test]
    fn action_stays_unchanged_when_gated_closed() {
        let rel = relation("r1", RT::Causes, "p", "act");
        let mut act = node("act", NT::Action);
        act.data.value = Some(Value::Bool(false));
        act.data.state = Some(NodeState::Active);
        let doc = doc_with(vec![node("p", NT::Condition), act], vec![rel]);
        let g = compile(&doc);
        let mut state = StateMap::new();
        state.insert("p".into(), Value::Bool(false));
        let limits = EvalLimits::default();
        let custom = CustomRegistry::new();
        let act_node = g.node_by_id("act").unwrap();
        let v = evaluate_node(act_node, &g, &state, &limits, &custom, Utc::now()).unwrap();
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn action_gate_honors_relation_activation_conditions_over_raw_truthiness() {
        // "act_false" only opens when its predecessor's value is literally
        // `false` — the opposite of the raw-truthiness fallback — because
        // its incoming relation declares an activation condition.
        let mut rel = relation("r1", RT::Causes, "p", "act_false");
        rel.activation_conditions = vec![ActivationCondition {
            field: "data.value".into(),
            operator: "eq".into(),
            value: Value::Bool(false),
        }];
        let mut act = node("act_false", NT::Action);
        act.data.value = Some(Value::Bool(false));
        let doc = doc_with(vec![node("p", NT::Condition), act], vec![rel]);
        let g = compile(&doc);
        let limits = EvalLimits::default();
        let custom = CustomRegistry::new();
        let act_node = g.node_by_id("act_false").unwrap();

        let mut state = StateMap::new();
        state.insert("p".into(), Value::Bool(true));
        let v = evaluate_node(act_node, &g, &state, &limits, &custom, Utc::now()).unwrap();
        assert_eq!(v, Value::Bool(false), "predecessor true should not satisfy an eq-false guard");

        state.insert("p".into(), Value::Bool(false));
        let v = evaluate_node(act_node, &g, &state, &limits, &custom, Utc::now()).unwrap();
        assert_eq!(v, Value::Bool(true), "predecessor false should satisfy an eq-false guard and gate open");
    }

    #[test]
    fn condition_logic_substitutes_node_ids_into_boolean_grammar() {
        let mut cond = node("good_weather", NT::Condition);
        cond.data.parameters.insert("logic".into(), serde_json::json!("temp_ok & wind_ok"));
        let doc = doc_with(vec![node("temp_ok", NT::Condition), node("wind_ok", NT::Condition), cond], vec![]);
        let g = compile(&doc);
        let mut state = StateMap::new();
        state.insert("temp_ok".into(), Value::Bool(true));
        state.insert("wind_ok".into(), Value::Bool(false));
        let limits = EvalLimits::default();
        let custom = CustomRegistry::new();
        let n = g.node_by_id("good_weather").unwrap();
        let v = evaluate_node(n, &g, &state, &limits, &custom, Utc::now()).unwrap();
        assert_eq!(v, Value::Bool(false));
    }
}
