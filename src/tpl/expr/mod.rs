//! The template expression language.
//!
//! Expressions show up in `if`/`elseif` conditions, loop iterables, attribute
//! values, include parameters and `#{}` / `!{}` markers. The language covers
//! literals, `$var` / `var` names, member and index access, arithmetic,
//! comparison, logical operators, ternaries, null coalescing and an
//! allow-listed set of functions. There is no way to reach the host.
//!
//! Failures never escape [`evaluate`]: they are logged at debug level and the
//! result is `Value::Null`.

mod builtins;
mod eval;
mod lexer;
mod parser;

use crate::tpl::render_context::Context;
use crate::value::Value;
use log::debug;
use thiserror::Error;

pub use parser::parse_expr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// `$name`: undefined names read as null.
    Var(String),
    /// bare `name`: undefined names are an error.
    Ident(String),
    List(Vec<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(Op, Box<Expr>, Box<Expr>),
    /// `c ? a : b`, or `c ?: b` when the middle is `None`.
    Ternary(Box<Expr>, Option<Box<Expr>>, Box<Expr>),
    Coalesce(Box<Expr>, Box<Expr>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("undefined name `{0}`")]
    UndefinedName(String),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{name}` expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
}

/// Whether `s` is exactly one `[A-Za-z_][A-Za-z0-9_]*` identifier.
pub(crate) fn is_ident(s: &str) -> bool {
    !s.is_empty() && lexer::ident_len(s) == s.len()
}

/// Evaluates `expr` against `ctx`.
///
/// A lone `$name` or an existing bare `name` is looked up directly; anything
/// else is parsed and interpreted. Errors degrade to `Value::Null`.
pub fn evaluate(expr: &str, ctx: &Context) -> Value {
    let expr = expr.trim();

    if let Some(name) = expr.strip_prefix('$')
        && is_ident(name)
    {
        return ctx.get(name).cloned().unwrap_or_default();
    }
    if is_ident(expr)
        && let Some(v) = ctx.get(expr)
    {
        return v.clone();
    }

    match try_evaluate(expr, ctx) {
        Ok(v) => v,
        Err(e) => {
            debug!("expression `{}` evaluated to null: {}", expr, e);
            Value::Null
        }
    }
}

/// Parses and interprets `expr`, reporting failures.
pub fn try_evaluate(expr: &str, ctx: &Context) -> Result<Value, ExprError> {
    let ast = parse_expr(expr)?;
    eval::Evaluator::new(ctx).eval(&ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;

    #[test]
    fn test_fast_paths() {
        let ctx = context! { name => "Jane" };
        assert_eq!(evaluate("$name", &ctx), Value::Str("Jane".to_string()));
        assert_eq!(evaluate("  name ", &ctx), Value::Str("Jane".to_string()));
        assert_eq!(evaluate("$missing", &ctx), Value::Null);
    }

    #[test]
    fn test_errors_degrade_to_null() {
        let ctx = Context::new();
        assert_eq!(evaluate("missing", &ctx), Value::Null);
        assert_eq!(evaluate("1 +", &ctx), Value::Null);
        assert_eq!(evaluate("1 / 0", &ctx), Value::Null);
        assert_eq!(evaluate("system('ls')", &ctx), Value::Null);
        assert_eq!(evaluate("", &ctx), Value::Null);
    }

    #[test]
    fn test_try_evaluate_reports() {
        let ctx = Context::new();
        assert_eq!(
            try_evaluate("nope", &ctx),
            Err(ExprError::UndefinedName("nope".to_string()))
        );
        assert_eq!(
            try_evaluate("exec(1)", &ctx),
            Err(ExprError::UnknownFunction("exec".to_string()))
        );
    }
}
