use crate::tpl::expr::{Expr, ExprError, Op, UnaryOp, builtins};
use crate::tpl::render_context::Context;
use crate::value::Value;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Tree-walking interpreter for parsed expressions.
pub struct Evaluator<'a> {
    ctx: &'a Context,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(name) => Ok(self.ctx.get(name).cloned().unwrap_or_default()),
            Expr::Ident(name) => self
                .ctx
                .get(name)
                .cloned()
                .ok_or_else(|| ExprError::UndefinedName(name.clone())),
            Expr::List(items) => items
                .iter()
                .map(|e| self.eval(e))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Member(obj, name) => {
                let obj = self.eval(obj)?;
                Ok(obj.get(name).cloned().unwrap_or_default())
            }
            Expr::Index(obj, idx) => {
                let obj = self.eval(obj)?;
                let idx = self.eval(idx)?;
                Ok(index(&obj, &idx))
            }
            Expr::Call(name, args) => self.call(name, args),
            Expr::Unary(op, operand) => unary(*op, &self.eval(operand)?),
            Expr::Binary(Op::And, l, r) => {
                Ok(Value::Bool(self.eval(l)?.is_truthy() && self.eval(r)?.is_truthy()))
            }
            Expr::Binary(Op::Or, l, r) => {
                Ok(Value::Bool(self.eval(l)?.is_truthy() || self.eval(r)?.is_truthy()))
            }
            Expr::Binary(op, l, r) => binary(*op, &self.eval(l)?, &self.eval(r)?),
            Expr::Ternary(cond, then, otherwise) => {
                let c = self.eval(cond)?;
                if !c.is_truthy() {
                    return self.eval(otherwise);
                }
                match then {
                    Some(then) => self.eval(then),
                    None => Ok(c),
                }
            }
            Expr::Coalesce(l, r) => match self.eval(l) {
                Ok(v) if !v.is_null() => Ok(v),
                _ => self.eval(r),
            },
        }
    }

    fn call(&self, name: &str, args: &[Expr]) -> Result<Value, ExprError> {
        // `isset(x)`, `empty(x)` and `default(x, d)` must work on undefined names.
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let lenient = name == "isset" || (i == 0 && matches!(name, "empty" | "default"));
            let v = if lenient {
                self.eval(arg).unwrap_or_default()
            } else {
                self.eval(arg)?
            };
            values.push(v);
        }
        builtins::call(name, values)
    }
}

/// `obj[idx]`. Lists accept negative indexes counted from the end; strings
/// index by character. Misses yield null.
fn index(obj: &Value, idx: &Value) -> Value {
    let position = |len: usize| {
        let n = idx.as_i64()?;
        let n = if n < 0 { len as i64 + n } else { n };
        usize::try_from(n).ok()
    };
    match obj {
        Value::List(l) => position(l.len())
            .and_then(|i| l.get(i))
            .cloned()
            .unwrap_or_default(),
        Value::Map(m) => m.get(&idx.to_string()).cloned().unwrap_or_default(),
        Value::Str(s) => position(s.chars().count())
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::Str(c.to_string()))
            .unwrap_or_default(),
        _ => Value::Null,
    }
}

/// Numeric view used by arithmetic: null is 0, booleans are 0/1, numeric
/// strings parse.
pub(crate) fn to_number(v: &Value) -> Result<Value, ExprError> {
    match v {
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => Ok(v.clone()),
        Value::Null => Ok(Value::Int(0)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Str(s) => {
            let t = s.trim();
            if let Ok(n) = t.parse::<i64>() {
                Ok(Value::Int(n))
            } else if let Some(n) = t.parse::<f64>().ok().filter(|n| n.is_finite()) {
                Ok(Value::Float(n))
            } else {
                Err(ExprError::TypeError(format!("non-numeric string `{}`", s)))
            }
        }
        other => Err(ExprError::TypeError(format!(
            "{} is not a number",
            other.type_name()
        ))),
    }
}

fn unary(op: UnaryOp, v: &Value) -> Result<Value, ExprError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
        UnaryOp::Pos => to_number(v),
        UnaryOp::Neg => match to_number(v)? {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or(ExprError::Overflow),
            Value::Float(n) => Ok(Value::Float(-n)),
            Value::Decimal(d) => Ok(Value::Decimal(-d)),
            _ => unreachable!("to_number only returns numbers"),
        },
    }
}

fn binary(op: Op, l: &Value, r: &Value) -> Result<Value, ExprError> {
    match op {
        Op::Eq => Ok(Value::Bool(l.loose_eq(r))),
        Op::Ne => Ok(Value::Bool(!l.loose_eq(r))),
        Op::StrictEq => Ok(Value::Bool(l.strict_eq(r))),
        Op::StrictNe => Ok(Value::Bool(!l.strict_eq(r))),
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let ord = l.compare(r).ok_or_else(|| {
                ExprError::TypeError(format!(
                    "cannot compare {} with {}",
                    l.type_name(),
                    r.type_name()
                ))
            })?;
            Ok(Value::Bool(match op {
                Op::Lt => ord == Ordering::Less,
                Op::Le => ord != Ordering::Greater,
                Op::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        Op::Concat => Ok(Value::Str(format!("{}{}", l, r))),
        Op::Add => match (to_number(l), to_number(r)) {
            (Ok(a), Ok(b)) => arith(op, a, b),
            _ if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) => {
                Ok(Value::Str(format!("{}{}", l, r)))
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        },
        Op::Sub | Op::Mul | Op::Div | Op::Rem => arith(op, to_number(l)?, to_number(r)?),
        Op::And | Op::Or => unreachable!("logical operators short-circuit in eval"),
    }
}

fn arith(op: Op, a: Value, b: Value) -> Result<Value, ExprError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_arith(op, x, y),
        (Value::Decimal(x), Value::Decimal(y)) => decimal_arith(op, x, y),
        (Value::Decimal(x), Value::Int(y)) => decimal_arith(op, x, Decimal::from(y)),
        (Value::Int(x), Value::Decimal(y)) => decimal_arith(op, Decimal::from(x), y),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => float_arith(op, x, y),
            _ => Err(ExprError::TypeError("non-numeric operands".to_string())),
        },
    }
}

fn int_arith(op: Op, x: i64, y: i64) -> Result<Value, ExprError> {
    let result = match op {
        Op::Add => x.checked_add(y),
        Op::Sub => x.checked_sub(y),
        Op::Mul => x.checked_mul(y),
        Op::Div => {
            if y == 0 {
                return Err(ExprError::DivisionByZero);
            }
            if x.checked_rem(y) != Some(0) {
                return Ok(Value::Float(x as f64 / y as f64));
            }
            x.checked_div(y)
        }
        Op::Rem => {
            if y == 0 {
                return Err(ExprError::DivisionByZero);
            }
            x.checked_rem(y)
        }
        _ => unreachable!("not an arithmetic operator"),
    };
    result.map(Value::Int).ok_or(ExprError::Overflow)
}

fn decimal_arith(op: Op, x: Decimal, y: Decimal) -> Result<Value, ExprError> {
    if matches!(op, Op::Div | Op::Rem) && y.is_zero() {
        return Err(ExprError::DivisionByZero);
    }
    let result = match op {
        Op::Add => x.checked_add(y),
        Op::Sub => x.checked_sub(y),
        Op::Mul => x.checked_mul(y),
        Op::Div => x.checked_div(y),
        Op::Rem => x.checked_rem(y),
        _ => unreachable!("not an arithmetic operator"),
    };
    result.map(Value::Decimal).ok_or(ExprError::Overflow)
}

fn float_arith(op: Op, x: f64, y: f64) -> Result<Value, ExprError> {
    if matches!(op, Op::Div | Op::Rem) && y == 0.0 {
        return Err(ExprError::DivisionByZero);
    }
    let result = match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div => x / y,
        Op::Rem => x % y,
        _ => unreachable!("not an arithmetic operator"),
    };
    if result.is_finite() {
        Ok(Value::Float(result))
    } else {
        Err(ExprError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::tpl::expr::try_evaluate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn eval(src: &str, ctx: &Context) -> Value {
        try_evaluate(src, ctx).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        let ctx = Context::new();
        assert_eq!(eval("1 + 2 * 3", &ctx), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3", &ctx), Value::Int(9));
        assert_eq!(eval("7 / 2", &ctx), Value::Float(3.5));
        assert_eq!(eval("8 / 2", &ctx), Value::Int(4));
        assert_eq!(eval("7 % 3", &ctx), Value::Int(1));
        assert_eq!(eval("-2 - -3", &ctx), Value::Int(1));
        assert_eq!(eval("'5' + 1", &ctx), Value::Int(6));
        assert_eq!(eval("1.5 * 2", &ctx), Value::Float(3.0));
        assert_eq!(
            try_evaluate("9223372036854775807 + 1", &ctx),
            Err(ExprError::Overflow)
        );
        assert_eq!(try_evaluate("5 % 0", &ctx), Err(ExprError::DivisionByZero));
        assert!(matches!(
            try_evaluate("[1] * 2", &ctx),
            Err(ExprError::TypeError(_))
        ));
    }

    #[test]
    fn test_string_concatenation() {
        let ctx = context! { first => "Ada", last => "Lovelace" };
        assert_eq!(
            eval("$first + ' ' + $last", &ctx),
            Value::Str("Ada Lovelace".to_string())
        );
        assert_eq!(eval("'n' ~ (1 + 1)", &ctx), Value::Str("n2".to_string()));
        assert_eq!(eval("'n' ~ 1 + 1", &ctx), Value::Str("n11".to_string()));
    }

    #[test]
    fn test_decimal_arithmetic() {
        let ctx = context! { price => Decimal::from_str("19.99").unwrap() };
        assert_eq!(
            eval("$price * 2", &ctx),
            Value::Decimal(Decimal::from_str("39.98").unwrap())
        );
    }

    #[test]
    fn test_comparison_and_logic() {
        let ctx = context! { x => 5, s => "abc", flag => false };
        assert_eq!(eval("$x > 3 && $x <= 5", &ctx), Value::Bool(true));
        assert_eq!(eval("$x == '5'", &ctx), Value::Bool(true));
        assert_eq!(eval("$x === '5'", &ctx), Value::Bool(false));
        assert_eq!(eval("$s < 'abd'", &ctx), Value::Bool(true));
        assert_eq!(eval("$flag || not $flag", &ctx), Value::Bool(true));
        assert_eq!(eval("$missing == null", &ctx), Value::Bool(true));
        assert_eq!(eval("$missing < 1", &ctx), Value::Bool(true));
        assert!(try_evaluate("[1] < 'x'", &ctx).is_err());
    }

    #[test]
    fn test_logic_short_circuits() {
        let ctx = Context::new();
        // the right side would be an undefined-name error
        assert_eq!(eval("false && nope", &ctx), Value::Bool(false));
        assert_eq!(eval("true || nope", &ctx), Value::Bool(true));
    }

    #[test]
    fn test_ternary_and_coalesce() {
        let ctx = context! { n => 0, name => "x" };
        assert_eq!(eval("$n ? 'yes' : 'no'", &ctx), Value::Str("no".to_string()));
        assert_eq!(eval("$name ?: 'anon'", &ctx), Value::Str("x".to_string()));
        assert_eq!(eval("$n ?: 'zero'", &ctx), Value::Str("zero".to_string()));
        assert_eq!(eval("$missing ?? 'd'", &ctx), Value::Str("d".to_string()));
        assert_eq!(eval("undefined_name ?? 'd'", &ctx), Value::Str("d".to_string()));
        assert_eq!(eval("$n ?? 'd'", &ctx), Value::Int(0));
    }

    #[test]
    fn test_member_and_index_access() {
        let ctx = context! {
            row => context! { name => "Ann", tags => vec!["a", "b", "c"] },
            list => vec![10, 20]
        };
        assert_eq!(eval("$row.name", &ctx), Value::Str("Ann".to_string()));
        assert_eq!(eval("$row->name", &ctx), Value::Str("Ann".to_string()));
        assert_eq!(eval("$row['tags'][1]", &ctx), Value::Str("b".to_string()));
        assert_eq!(eval("row.tags[-1]", &ctx), Value::Str("c".to_string()));
        assert_eq!(eval("$list.0", &ctx), Value::Int(10));
        assert_eq!(eval("$list[5]", &ctx), Value::Null);
        assert_eq!(eval("$row.nope.deeper", &ctx), Value::Null);
        assert_eq!(eval("'hey'[1]", &ctx), Value::Str("e".to_string()));
    }

    #[test]
    fn test_undefined_bare_name_is_an_error() {
        let ctx = Context::new();
        assert_eq!(
            try_evaluate("nope + 1", &ctx),
            Err(ExprError::UndefinedName("nope".to_string()))
        );
        assert_eq!(eval("isset(nope)", &ctx), Value::Bool(false));
        assert_eq!(eval("empty(nope)", &ctx), Value::Bool(true));
    }
}
