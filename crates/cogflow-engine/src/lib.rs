//! Document schema, validator, compiler, scheduler, and node evaluator for
//! cognitive-model graphs — the three tightly coupled subsystems (document
//! validator, graph compiler, execution engine) that contain the hard
//! engineering of this crate family.

pub mod compile;
pub mod document;
pub mod evaluate;
pub mod graph_algo;
pub mod interpreter;
pub mod schedule;
pub mod validate;

pub use compile::{compile, optimize, CompiledGraph, Complexity, OptimizationMode};
pub use document::{Document, ExecutionConfig, ExecutionMode, Metadata, Node, Relation};
pub use evaluate::{evaluate_node, CustomRegistry, StateMap};
pub use interpreter::EvalLimits;
pub use schedule::{execute, ExecutionOverrides, ExecutionResult};
pub use validate::{validate, validate_file, ValidationResult};
