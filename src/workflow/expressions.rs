//! Source expressions for init instructions and output variables
//!
//! Supports:
//! - literals: `0`, `2.5`, `true`, `null`, `'2024-03-01'`
//! - rooted paths: `driving.latitude`, `parameters.TBASE`, `status.states.LAI`
//! - either form wrapped in `${{ }}`: `${{ time.simulation_start_day }}`
//!
//! The language is closed on purpose: expressions are compiled once from the
//! workflow document and interpreted against a context, never executed.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

use super::context::ExecutionContext;
use super::path::{ContextPath, PathError};

static EXPRESSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{\{\s*(.+?)\s*\}\}$").unwrap());

/// Errors that can occur while compiling an expression
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Empty expression")]
    Empty,

    #[error("Unterminated string literal: {0}")]
    UnterminatedString(String),

    #[error("Invalid path: {0}")]
    Path(#[from] PathError),
}

/// A compiled expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Path(ContextPath),
}

impl Expression {
    /// Compile an expression from its source text
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let mut text = source.trim();
        if let Some(caps) = EXPRESSION_REGEX.captures(text) {
            if let Some(inner) = caps.get(1) {
                text = inner.as_str().trim();
            }
        }

        if text.is_empty() {
            return Err(ExpressionError::Empty);
        }

        if let Some(literal) = parse_literal(text)? {
            return Ok(Expression::Literal(literal));
        }

        Ok(Expression::Path(ContextPath::parse(text)?))
    }

    /// Evaluate against a context. `None` means unavailable.
    pub fn evaluate(&self, ctx: &ExecutionContext) -> Option<Value> {
        match self {
            Expression::Literal(Value::Null) => None,
            Expression::Literal(value) => Some(value.clone()),
            Expression::Path(path) => ctx.resolve(path),
        }
    }

    pub fn as_path(&self) -> Option<&ContextPath> {
        match self {
            Expression::Path(path) => Some(path),
            Expression::Literal(_) => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Path(path) => write!(f, "{}", path),
        }
    }
}

fn parse_literal(text: &str) -> Result<Option<Value>, ExpressionError> {
    match text {
        "null" => return Ok(Some(Value::Null)),
        "true" => return Ok(Some(Value::Bool(true))),
        "false" => return Ok(Some(Value::Bool(false))),
        _ => {}
    }

    if let Some(quote) = text.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let inner = &text[1..];
        return match inner.strip_suffix(quote) {
            Some(body) => Ok(Some(Value::String(body.to_string()))),
            None => Err(ExpressionError::UnterminatedString(text.to_string())),
        };
    }

    if let Ok(int) = text.parse::<i64>() {
        return Ok(Some(Value::from(int)));
    }
    if let Ok(float) = text.parse::<f64>() {
        if float.is_finite() {
            return Ok(Some(Value::from(float)));
        }
    }

    Ok(None)
}
