//! Core value, error, and identifier types shared across the cogflow
//! validator, compiler, and execution engine crates.

pub mod error;
pub mod ident;
pub mod value;

pub use error::{EngineError, ErrorKind, Severity};
pub use ident::{
    is_valid_identifier, is_valid_version_shape, ConditionOperator, NodeState, NodeType,
    RelationType,
};
pub use value::Value;
