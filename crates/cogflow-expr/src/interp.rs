//! Walks an `ExprNode` tree to a `Value`, resolving `Var` references against
//! a caller-supplied context (predecessor node values) and `Call`s against a
//! small fixed builtin-function table (: abs, min, max, sqrt, pow,
//! sin, cos, tan, log, exp, floor, ceil, round).

use std::collections::HashMap;

use cogflow_common::Value;
use smallvec::SmallVec;

use crate::ast::{BinaryOp, ExprNode, UnaryOp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    UnknownVariable(String),
    UnknownFunction(String),
    ArityMismatch { name: String, expected: usize, found: usize },
    NotANumber(String),
    DivisionByZero,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::UnknownVariable(name) => write!(f, "unknown variable '{name}'"),
            EvalError::UnknownFunction(name) => write!(f, "unknown function '{name}'"),
            EvalError::ArityMismatch { name, expected, found } => write!(
                f,
                "function '{name}' expects {expected} argument(s), found {found}"
            ),
            EvalError::NotANumber(repr) => write!(f, "expected a number, found '{repr}'"),
            EvalError::DivisionByZero => write!(f, "division by zero"),
        }
    }
}
impl std::error::Error for EvalError {}

pub type Context = HashMap<String, Value>;

pub fn evaluate(node: &ExprNode, ctx: &Context) -> Result<Value, EvalError> {
    match node {
        ExprNode::Number(n) => Ok(Value::Number(*n)),
        ExprNode::Var(name) => ctx
        .get(name)
        .cloned()
        .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        ExprNode::Array(items) => {
            let values = items
            .iter()
            .map(|i| evaluate(i, ctx))
            .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(values))
        }
        ExprNode::Unary { op, expr } => {
            let v = as_number(&evaluate(expr, ctx)?)?;
            Ok(Value::Number(match op {
                        UnaryOp::Neg => -v,
                        UnaryOp::Pos => v,
            }))
        }
        ExprNode::Binary { op, left, right } => {
            let l = as_number(&evaluate(left, ctx)?)?;
            let r = as_number(&evaluate(right, ctx)?)?;
            let result = match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => {
                    if r == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    l / r
                }
            };
            Ok(Value::Number(result))
        }
        ExprNode::Call { name, args } => eval_call(name, args, ctx),
    }
}

fn as_number(v: &Value) -> Result<f64, EvalError> {
    v.as_number().ok_or_else(|| EvalError::NotANumber(v.canonical_string()))
}

fn eval_call(name: &str, args: &[ExprNode], ctx: &Context) -> Result<Value, EvalError> {
    // Most builtins take 1-2 arguments; `min`/`max` are the only variadic
    // cases and rarely see more than a handful, so a small inline buffer
    // avoids a heap allocation on the common path.
    let nums: SmallVec<[f64; 4]> = args
    .iter()
    .map(|a| evaluate(a, ctx).and_then(|v| as_number(&v)))
    .collect::<Result<SmallVec<[f64; 4]>, _>>()?;

    let unary = |f: fn(f64) -> f64| -> Result<Value, EvalError> {
        arity(name, &nums, 1)?;
        Ok(Value::Number(f(nums[0])))
    };

    match name.to_ascii_lowercase().as_str() {
        "abs" => unary(f64::abs),
        "sqrt" => unary(f64::sqrt),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "round" => unary(f64::round),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "log" | "ln" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "exp" => unary(f64::exp),
        "min" => {
            if nums.is_empty() {
                return Err(EvalError::ArityMismatch { name: name.into(), expected: 1, found: 0 });
            }
            Ok(Value::Number(nums.iter().cloned().fold(f64::INFINITY, f64::min)))
        }
        "max" => {
            if nums.is_empty() {
                return Err(EvalError::ArityMismatch { name: name.into(), expected: 1, found: 0 });
            }
            Ok(Value::Number(nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max)))
        }
        "pow" => {
            arity(name, &nums, 2)?;
            Ok(Value::Number(nums[0].powf(nums[1])))
        }
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

fn arity(name: &str, nums: &[f64], expected: usize) -> Result<(), EvalError> {
    if nums.len() != expected {
        Err(EvalError::ArityMismatch {
                name: name.to_string(),
                expected,
                found: nums.len(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn resolves_variables_from_context() {
        let mut ctx = Context::new();
        ctx.insert("x".into(), Value::Number(4.0));
        let ast = parse("x * 2").unwrap();
        assert_eq!(evaluate(&ast, &ctx).unwrap(), Value::Number(8.0));
    }

    #[test]
    fn applies_builtin_functions() {
        let ctx = Context::new();
        let ast = parse("max(1, 5, 3)").unwrap();
        assert_eq!(evaluate(&ast, &ctx).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let ctx = Context::new();
        let ast = parse("1 / 0").unwrap();
        assert!(matches!(evaluate(&ast, &ctx), Err(EvalError::DivisionByZero)));
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let ctx = Context::new();
        let ast = parse("unknown_node_value + 1").unwrap();
        assert!(matches!(evaluate(&ast, &ctx), Err(EvalError::UnknownVariable(_))));
    }
}
