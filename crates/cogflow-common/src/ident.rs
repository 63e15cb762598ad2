//! Identifier pattern and the closed node/relation type sets.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static IDENTIFIER_PATTERN: Lazy<Regex> =
Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern compiles"));

/// `true` iff `s` matches `[A-Za-z0-9_-]+`.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty() && IDENTIFIER_PATTERN.is_match(s)
}

static VERSION_PATTERN: Lazy<Regex> =
Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("static pattern compiles"));

pub fn is_valid_version_shape(s: &str) -> bool {
    VERSION_PATTERN.is_match(s)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Concept,
    Condition,
    Action,
    Event,
    Formula,
    Custom,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Concept => "concept",
            NodeType::Condition => "condition",
            NodeType::Action => "action",
            NodeType::Event => "event",
            NodeType::Formula => "formula",
            NodeType::Custom => "custom",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Active,
    Inactive,
    Pending,
    Completed,
    Failed,
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Causes,
    Triggers,
    Blocks,
    Contains,
    DependsOn,
    Influences,
    Custom,
}

impl RelationType {
    /// Relation types whose subgraph must be acyclic ( invariants,
    /// §4.2 phase 3). `Contains` is deliberately excluded (Open
    /// Question 4): it is a structural, non-causal relation.
    pub fn is_causal(self) -> bool {
        matches!(
            self,
            RelationType::Causes | RelationType::Triggers | RelationType::DependsOn
        )
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationType::Causes => "causes",
            RelationType::Triggers => "triggers",
            RelationType::Blocks => "blocks",
            RelationType::Contains => "contains",
            RelationType::DependsOn => "depends_on",
            RelationType::Influences => "influences",
            RelationType::Custom => "custom",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
}

impl ConditionOperator {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
                "eq" => ConditionOperator::Eq,
                "neq" => ConditionOperator::Neq,
                "gt" => ConditionOperator::Gt,
                "lt" => ConditionOperator::Lt,
                "gte" => ConditionOperator::Gte,
                "lte" => ConditionOperator::Lte,
                "contains" => ConditionOperator::Contains,
                _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_pattern_rejects_spaces_and_empty() {
        assert!(is_valid_identifier("good_id-1"));
        assert!(!is_valid_identifier("bad id"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn version_pattern_requires_three_dotted_numbers() {
        assert!(is_valid_version_shape("1.2.3"));
        assert!(!is_valid_version_shape("1.2"));
        assert!(!is_valid_version_shape("v1.2.3"));
    }

    #[test]
    fn causal_relation_types_exclude_contains() {
        assert!(RelationType::Causes.is_causal());
        assert!(RelationType::Triggers.is_causal());
        assert!(RelationType::DependsOn.is_causal());
        assert!(!RelationType::Contains.is_causal());
        assert!(!RelationType::Influences.is_causal());
        assert!(!RelationType::Blocks.is_causal());
    }
}
