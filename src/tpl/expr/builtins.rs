//! Allow-listed functions callable from expressions.
//!
//! `a.f(b)` is dispatched here as `f(a, b)`. Names arrive lowercased.

use crate::tpl::expr::ExprError;
use crate::tpl::expr::eval::to_number;
use crate::value::Value;
use rust_decimal::prelude::*;
use std::cmp::Ordering;

/// Upper bound on the number of elements `range` may produce.
const MAX_RANGE_LEN: i64 = 100_000;

pub fn call(name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    match name {
        "count" | "len" | "length" => {
            let [v] = exact(name, args)?;
            Ok(Value::Int(match &v {
                Value::Null => 0,
                other => other.len().unwrap_or(1) as i64,
            }))
        }
        "empty" => {
            let [v] = exact(name, args)?;
            Ok(Value::Bool(!v.is_truthy()))
        }
        "isset" => {
            if args.is_empty() {
                return Err(arity_error(name, "at least 1", 0));
            }
            Ok(Value::Bool(args.iter().all(|v| !v.is_null())))
        }
        "default" => {
            let [v, fallback] = exact(name, args)?;
            Ok(match &v {
                Value::Null => fallback,
                Value::Str(s) if s.is_empty() => fallback,
                _ => v,
            })
        }
        "upper" | "strtoupper" => map_str(name, args, |s| s.to_uppercase()),
        "lower" | "strtolower" => map_str(name, args, |s| s.to_lowercase()),
        "capitalize" | "ucfirst" => map_str(name, args, |s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }),
        "trim" => map_str(name, args, |s| s.trim().to_string()),
        "join" | "implode" => {
            check_arity(name, &args, 1, 2)?;
            let mut args = args.into_iter();
            let first = args.next().unwrap_or_default();
            let second = args.next();
            // join(list, sep) and implode(sep, list); either order is accepted
            let (list, sep) = match (first, second) {
                (Value::Str(sep), Some(list)) if !matches!(list, Value::Str(_)) => {
                    (list, sep)
                }
                (list, Some(sep)) => (list, sep.to_string()),
                (list, None) => (list, String::new()),
            };
            let parts: Vec<String> = match list.entries() {
                Some(entries) => entries.into_iter().map(|(_, v)| v.to_string()).collect(),
                None => vec![list.to_string()],
            };
            Ok(Value::Str(parts.join(&sep)))
        }
        "split" => {
            let [s, sep] = exact(name, args)?;
            Ok(split(&s.to_string(), &sep.to_string()))
        }
        "explode" => {
            let [sep, s] = exact(name, args)?;
            Ok(split(&s.to_string(), &sep.to_string()))
        }
        "replace" => {
            let [subject, search, with] = exact(name, args)?;
            Ok(replace(&subject, &search, &with))
        }
        "str_replace" => {
            let [search, with, subject] = exact(name, args)?;
            Ok(replace(&subject, &search, &with))
        }
        "substr" => {
            check_arity(name, &args, 2, 3)?;
            let s = args[0].to_string();
            let start = int_arg(name, &args[1])?;
            let len = match args.get(2) {
                None | Some(Value::Null) => None,
                Some(v) => Some(int_arg(name, v)?),
            };
            Ok(Value::Str(substr(&s, start, len)))
        }
        "abs" => {
            let [v] = exact(name, args)?;
            match to_number(&v)? {
                Value::Int(n) => n.checked_abs().map(Value::Int).ok_or(ExprError::Overflow),
                Value::Float(n) => Ok(Value::Float(n.abs())),
                Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
                _ => unreachable!("to_number only returns numbers"),
            }
        }
        "round" => {
            check_arity(name, &args, 1, 2)?;
            let precision = match args.get(1) {
                Some(p) => int_arg(name, p)?.clamp(0, 15) as u32,
                None => 0,
            };
            match to_number(&args[0])? {
                Value::Int(n) => Ok(Value::Int(n)),
                Value::Float(n) => {
                    let factor = 10f64.powi(precision as i32);
                    Ok(Value::Float((n * factor).round() / factor))
                }
                Value::Decimal(d) => Ok(Value::Decimal(
                    d.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero),
                )),
                _ => unreachable!("to_number only returns numbers"),
            }
        }
        "floor" | "ceil" => {
            let [v] = exact(name, args)?;
            let up = name == "ceil";
            match to_number(&v)? {
                Value::Int(n) => Ok(Value::Int(n)),
                Value::Float(n) => Ok(Value::Float(if up { n.ceil() } else { n.floor() })),
                Value::Decimal(d) => Ok(Value::Decimal(if up { d.ceil() } else { d.floor() })),
                _ => unreachable!("to_number only returns numbers"),
            }
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(arity_error(name, "at least 1", 0));
            }
            // a single collection argument compares its elements
            let items: Vec<Value> = if args.len() == 1 && args[0].entries().is_some() {
                match args.into_iter().next() {
                    Some(Value::List(l)) => l,
                    Some(Value::Map(m)) => m.into_values().collect(),
                    _ => Vec::new(),
                }
            } else {
                args
            };
            let wanted = if name == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best: Option<Value> = None;
            for item in items {
                best = match best {
                    None => Some(item),
                    Some(b) => {
                        let ord = item.compare(&b).ok_or_else(|| {
                            ExprError::TypeError(format!(
                                "{}: cannot compare {} with {}",
                                name,
                                item.type_name(),
                                b.type_name()
                            ))
                        })?;
                        Some(if ord == wanted { item } else { b })
                    }
                };
            }
            Ok(best.unwrap_or_default())
        }
        "keys" => {
            let [v] = exact(name, args)?;
            Ok(Value::List(
                v.entries()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, _)| k)
                    .collect(),
            ))
        }
        "values" => {
            let [v] = exact(name, args)?;
            Ok(Value::List(
                v.entries()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(_, v)| v.clone())
                    .collect(),
            ))
        }
        "first" | "last" => {
            let [v] = exact(name, args)?;
            let last = name == "last";
            Ok(match &v {
                Value::Str(s) => {
                    let c = if last { s.chars().last() } else { s.chars().next() };
                    c.map(|c| Value::Str(c.to_string())).unwrap_or_default()
                }
                other => {
                    let entries = other.entries().unwrap_or_default();
                    let picked = if last { entries.last() } else { entries.first() };
                    picked.map(|(_, v)| (*v).clone()).unwrap_or_default()
                }
            })
        }
        "contains" => {
            let [haystack, needle] = exact(name, args)?;
            Ok(Value::Bool(contains(&haystack, &needle)))
        }
        "in_array" => {
            let [needle, haystack] = exact(name, args)?;
            Ok(Value::Bool(contains(&haystack, &needle)))
        }
        "range" => {
            check_arity(name, &args, 2, 3)?;
            let start = int_arg(name, &args[0])?;
            let end = int_arg(name, &args[1])?;
            let step = match args.get(2) {
                Some(s) => int_arg(name, s)?.checked_abs().ok_or(ExprError::Overflow)?,
                None => 1,
            };
            if step == 0 {
                return Err(ExprError::TypeError("range: step must not be 0".to_string()));
            }
            let span = (end as i128 - start as i128).abs() / step as i128 + 1;
            if span > MAX_RANGE_LEN as i128 {
                return Err(ExprError::TypeError(format!(
                    "range: more than {} elements",
                    MAX_RANGE_LEN
                )));
            }
            // i128 keeps `i * step` exact when start and end are far apart
            let step = if end < start { -(step as i128) } else { step as i128 };
            (0..span)
                .map(|i| {
                    i64::try_from(start as i128 + i * step)
                        .map(Value::Int)
                        .map_err(|_| ExprError::Overflow)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

fn arity_error(name: &str, expected: &str, got: usize) -> ExprError {
    ExprError::Arity {
        name: name.to_string(),
        expected: expected.to_string(),
        got,
    }
}

fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), ExprError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(arity_error(name, &expected, args.len()));
    }
    Ok(())
}

fn exact<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], ExprError> {
    let got = args.len();
    args.try_into()
        .map_err(|_| arity_error(name, &N.to_string(), got))
}

fn map_str(name: &str, args: Vec<Value>, f: impl Fn(&str) -> String) -> Result<Value, ExprError> {
    let [v] = exact(name, args)?;
    Ok(Value::Str(f(&v.to_string())))
}

fn int_arg(name: &str, v: &Value) -> Result<i64, ExprError> {
    v.as_i64().ok_or_else(|| {
        ExprError::TypeError(format!("{}: expected an integer, got {}", name, v.type_name()))
    })
}

fn split(s: &str, sep: &str) -> Value {
    let parts = if sep.is_empty() {
        s.chars().map(|c| Value::Str(c.to_string())).collect()
    } else {
        s.split(sep).map(|p| Value::Str(p.to_string())).collect()
    };
    Value::List(parts)
}

fn replace(subject: &Value, search: &Value, with: &Value) -> Value {
    let subject = subject.to_string();
    let search = search.to_string();
    if search.is_empty() {
        return Value::Str(subject);
    }
    Value::Str(subject.replace(&search, &with.to_string()))
}

/// Character-based substring. A negative `start` counts from the end; a
/// negative `len` leaves that many characters off the end.
fn substr(s: &str, start: i64, len: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let total = chars.len() as i64;
    let from = if start < 0 { (total + start).max(0) } else { start.min(total) };
    let to = match len {
        None => total,
        Some(n) if n < 0 => (total + n).max(from),
        Some(n) => from.saturating_add(n).min(total),
    };
    chars[from as usize..to as usize].iter().collect()
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Str(s) => s.contains(&needle.to_string()),
        other => other
            .entries()
            .unwrap_or_default()
            .iter()
            .any(|(_, v)| v.loose_eq(needle)),
    }
}
