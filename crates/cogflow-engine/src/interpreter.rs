//! Sandboxed expression evaluation with resource limits.
//!
//! `cogflow-expr` owns the grammar (tokenizer, parser, safety whitelist);
//! this module owns the *contract* around it — timeout and memory
//! accounting, and translating `cogflow-expr` errors into the shared
//! `EngineError` taxonomy so the scheduler and node evaluator never match
//! on a second error type.

use std::time::Instant;

use cogflow_common::{ErrorKind, EngineError, Value};
use cogflow_expr::{evaluate_expr, parse, ExprContext};

#[derive(Debug, Clone, Copy)]
pub struct EvalLimits {
    pub timeout_ms: u64,
    pub memory_bytes: usize,
}

impl EvalLimits {
    pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
    pub const DEFAULT_MEMORY_BYTES: usize = 10 * 1024 * 1024;
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            memory_bytes: Self::DEFAULT_MEMORY_BYTES,
        }
    }
}

/// Outcome shape from 's contract: `{success, value, error?,
/// elapsed_ms, bytes_used}` — elapsed time and byte count are reported even
/// on failure.
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub success: bool,
    pub value: Option<Value>,
    pub error: Option<EngineError>,
    pub elapsed_ms: u64,
    pub bytes_used: usize,
}

/// Parses and evaluates `expr` against `ctx` under `limits`. Parsing itself
/// counts toward the timeout budget, since a pathological expression could
/// in principle make parsing expensive too (though the grammar is small
/// enough that this never actually triggers in practice).
pub fn evaluate_formula(
    expr: &str,
    ctx: &ExprContext,
    limits: &EvalLimits) -> Result<Value, EngineError> {
    let outcome = evaluate_with_outcome(expr, ctx, limits);
    match outcome.error {
        Some(e) => Err(e),
        None => Ok(outcome.value.unwrap_or(Value::Null)),
    }
}

pub fn evaluate_with_outcome(expr: &str, ctx: &ExprContext, limits: &EvalLimits) -> EvalOutcome {
    let start = Instant::now();

    let ast = match parse(expr) {
        Ok(ast) => ast,
        Err(e) => {
            return EvalOutcome {
                success: false,
                value: None,
                error: Some(EngineError::new(ErrorKind::FormulaError, e.to_string())),
                elapsed_ms: elapsed_ms(start),
                bytes_used: 0,
            }
        }
    };

    if elapsed_ms(start) > limits.timeout_ms {
        return timeout_outcome(start);
    }

    let value = match evaluate_expr(&ast, ctx) {
        Ok(v) => v,
        Err(e) => {
            return EvalOutcome {
                success: false,
                value: None,
                error: Some(EngineError::new(ErrorKind::FormulaError, e.to_string())),
                elapsed_ms: elapsed_ms(start),
                bytes_used: 0,
            }
        }
    };

    let elapsed = elapsed_ms(start);
    if elapsed > limits.timeout_ms {
        return timeout_outcome(start);
    }

    let bytes_used = value.canonical_string().len();
    if bytes_used > limits.memory_bytes {
        return EvalOutcome {
            success: false,
            value: None,
            error: Some(EngineError::new(
                    ErrorKind::FormulaMemory,
                    format!("result size {bytes_used} bytes exceeds limit {}", limits.memory_bytes))),
            elapsed_ms: elapsed,
            bytes_used,
        };
    }

    EvalOutcome {
        success: true,
        value: Some(value),
        error: None,
        elapsed_ms: elapsed,
        bytes_used,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn timeout_outcome(start: Instant) -> EvalOutcome {
    EvalOutcome {
        success: false,
        value: None,
        error: Some(EngineError::new(ErrorKind::FormulaTimeout, "formula evaluation exceeded timeout_ms")),
        elapsed_ms: elapsed_ms(start),
        bytes_used: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_simple_formula_successfully() {
        let mut ctx = ExprContext::new();
        ctx.insert("x".into(), Value::Number(3.0));
        let limits = EvalLimits::default();
        let outcome = evaluate_with_outcome("x * 2 + 1", &ctx, &limits);
        assert!(outcome.success);
        assert_eq!(outcome.value, Some(Value::Number(7.0)));
    }

    #[test]
    fn unsafe_token_is_reported_as_formula_error() {
        let ctx = ExprContext::new();
        let limits = EvalLimits::default();
        let outcome = evaluate_with_outcome("require('fs')", &ctx, &limits);
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::FormulaError);
    }

    #[test]
    fn memory_limit_rejects_oversized_results() {
        let ctx = ExprContext::new();
        let limits = EvalLimits { timeout_ms: 5000, memory_bytes: 1 };
        let outcome = evaluate_with_outcome("123456", &ctx, &limits);
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::FormulaMemory);
    }
}
