//! Sandboxed expression grammars used by formula and condition nodes.
//!
//! Two distinct grammars live here, deliberately kept apart:
//! - the arithmetic formula grammar (`tokenizer`, `ast`, `parser`, `interp`)
//! used by `NodeType::Formula` and any inline numeric computation.
//! - the boolean condition-logic grammar (`boolean`) used by
//! `condition.parameters.logic`, which substitutes predecessor states
//! into `true`/`false` literals before parsing.
//!
//! Neither grammar ever constructs or executes host code; both are parsed
//! into an AST and walked.

pub mod ast;
pub mod boolean;
pub mod interp;
pub mod parser;
pub mod safety;
pub mod tokenizer;

pub use ast::{BinaryOp, ExprNode, UnaryOp};
pub use boolean::{evaluate as evaluate_bool_logic, BoolExpr, BoolExprError};
pub use interp::{evaluate as evaluate_expr, Context as ExprContext, EvalError};
pub use parser::{parens_balanced, parse, ParseError};
pub use safety::{check_whitelist, SafetyViolation};
pub use tokenizer::{tokenize, Token, TokenKind, TokenizerError};
