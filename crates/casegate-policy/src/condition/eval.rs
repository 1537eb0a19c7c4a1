//! Evaluation of an [`Expr`] against a JSON context.
//!
//! Evaluation is total: every input produces a boolean.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value;

use super::{CmpOp, Expr, Method, PropertyPath};

/// An operand after resolution.
enum Operand<'a> {
    Unknown,
    Known(Cow<'a, Value>),
}

/// Boolean value of an expression in a condition position.
pub(super) fn truthy(expr: &Expr, ctx: &Value) -> bool {
    match expr {
        Expr::Wildcard => true,
        Expr::And(lhs, rhs) => truthy(lhs, ctx) && truthy(rhs, ctx),
        Expr::Or(lhs, rhs) => truthy(lhs, ctx) || truthy(rhs, ctx),
        Expr::Comparison { lhs, op, rhs } => compare(resolve(lhs, ctx), *op, resolve(rhs, ctx)),
        Expr::MethodCall { target, method } => call(target, method, ctx),
        Expr::PropertyAccess(_) | Expr::Literal(_) => {
            matches!(resolve(expr, ctx), Operand::Known(v) if *v == Value::Bool(true))
        }
    }
}

fn resolve<'a>(expr: &'a Expr, ctx: &'a Value) -> Operand<'a> {
    match expr {
        Expr::Literal(value) => Operand::Known(Cow::Borrowed(value)),
        Expr::PropertyAccess(path) => lookup(path, ctx),
        other => Operand::Known(Cow::Owned(Value::Bool(truthy(other, ctx)))),
    }
}

fn lookup<'a>(path: &PropertyPath, ctx: &'a Value) -> Operand<'a> {
    let mut current = ctx;
    for segment in path.segments() {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Operand::Unknown,
        }
    }
    if current.is_null() {
        Operand::Unknown
    } else {
        Operand::Known(Cow::Borrowed(current))
    }
}

fn compare(lhs: Operand<'_>, op: CmpOp, rhs: Operand<'_>) -> bool {
    let (Operand::Known(lhs), Operand::Known(rhs)) = (lhs, rhs) else {
        return false;
    };
    let ordering = match (lhs.as_ref(), rhs.as_ref()) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(_), Value::Bool(_))
        | (Value::Array(_), Value::Array(_))
        | (Value::Object(_), Value::Object(_)) => {
            return match op {
                CmpOp::Eq => values_equal(&lhs, &rhs),
                CmpOp::Ne => !values_equal(&lhs, &rhs),
                _ => false,
            };
        }
        _ => None,
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
    }
}

/// Structural equality with numbers compared by value (`1 == 1.0`).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn call(target: &PropertyPath, method: &Method, ctx: &Value) -> bool {
    let target = lookup(target, ctx);
    match method {
        Method::Empty => match target {
            Operand::Unknown => true,
            Operand::Known(value) => match value.as_ref() {
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                Value::String(s) => s.is_empty(),
                _ => false,
            },
        },
        Method::Contains(arg) => {
            let (Operand::Known(haystack), Operand::Known(needle)) = (target, resolve(arg, ctx))
            else {
                return false;
            };
            match (haystack.as_ref(), needle.as_ref()) {
                (Value::Array(items), needle) => {
                    items.iter().any(|item| values_equal(item, needle))
                }
                (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
                (Value::Object(map), Value::String(key)) => map.contains_key(key),
                _ => false,
            }
        }
    }
}
