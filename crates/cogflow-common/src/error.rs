//! Error taxonomy shared by the validator, compiler, and execution engine
//!.
//!
//! Validation errors (`schema`, `reference`, `cycle`, `logic`) and runtime
//! errors (`execution_timeout`, `infinite_loop`, `formula_timeout`,
//! `formula_memory`, `formula_error`, `condition_error`, `extension_error`,
//! `node_execution`, `execution_error`) share one context-carrying struct so
//! the facade can aggregate both kinds into a single list without an enum
//! of enums.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // Validation
    Schema,
    Reference,
    Cycle,
    Logic,
    // Runtime
    ExecutionTimeout,
    InfiniteLoop,
    FormulaTimeout,
    FormulaMemory,
    FormulaError,
    ConditionError,
    ExtensionError,
    NodeExecution,
    ///: >100 dependency levels in parallel mode.
    ExecutionError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Schema => "schema",
            ErrorKind::Reference => "reference",
            ErrorKind::Cycle => "cycle",
            ErrorKind::Logic => "logic",
            ErrorKind::ExecutionTimeout => "execution_timeout",
            ErrorKind::InfiniteLoop => "infinite_loop",
            ErrorKind::FormulaTimeout => "formula_timeout",
            ErrorKind::FormulaMemory => "formula_memory",
            ErrorKind::FormulaError => "formula_error",
            ErrorKind::ConditionError => "condition_error",
            ErrorKind::ExtensionError => "extension_error",
            ErrorKind::NodeExecution => "node_execution",
            ErrorKind::ExecutionError => "execution_error",
        };
        f.write_str(s)
    }
}

impl ErrorKind {
    /// Whether this kind stops the validation pipeline outright (schema) or
    /// is collected as one entry among possibly many (everything else).
    pub fn default_severity(self) -> Severity {
        Severity::Error
    }
}

/// A single validation or runtime error/warning, carrying enough context
/// (node/relation id, path) for CLI and report rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            severity: kind.default_severity(),
            kind,
            message: message.into(),
            path: None,
            node_id: None,
            relation_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn warning(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::new(kind, message)
        }
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_relation(mut self, relation_id: impl Into<String>) -> Self {
        self.relation_id = Some(relation_id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_tag() {
        let e = EngineError::new(ErrorKind::Cycle, "A -> B -> A");
        assert_eq!(format!("{e}"), "[cycle] A -> B -> A");
    }

    #[test]
    fn warning_has_warning_severity() {
        let e = EngineError::warning(ErrorKind::Schema, "low confidence");
        assert_eq!(e.severity, Severity::Warning);
        assert!(!e.is_fatal());
    }
}
