//! Tree-walking evaluator.

use super::parser::{BinaryOp, Expr, UnaryOp};
use super::value::{FormulaValue, Scope};
use crate::error::{FormulaError, FormulaResult};
use std::cmp::Ordering;

/// Prefix some editors put in front of every identifier.
const SCOPE_PREFIX: &str = "scope.";

pub fn eval(expr: &Expr, scope: &Scope) -> FormulaResult<FormulaValue> {
    match expr {
        Expr::Number(n) => Ok(FormulaValue::Number(*n)),
        Expr::Str(s) => Ok(FormulaValue::Str(s.clone())),
        Expr::Bool(b) => Ok(FormulaValue::Bool(*b)),
        Expr::Ident(name) => lookup(scope, name),
        Expr::Unary(op, operand) => {
            let value = eval(operand, scope)?;
            match op {
                UnaryOp::Not => Ok(FormulaValue::Bool(!value.is_truthy())),
                UnaryOp::Neg => Ok(FormulaValue::Number(-number("-", &value)?)),
            }
        }
        Expr::Binary(BinaryOp::And, left, right) => {
            let left = eval(left, scope)?.is_truthy();
            Ok(FormulaValue::Bool(left && eval(right, scope)?.is_truthy()))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            let left = eval(left, scope)?.is_truthy();
            Ok(FormulaValue::Bool(left || eval(right, scope)?.is_truthy()))
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            binary(*op, &left, &right)
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<FormulaResult<Vec<_>>>()?;
            call(name, &args)
        }
    }
}

fn lookup(scope: &Scope, name: &str) -> FormulaResult<FormulaValue> {
    let path = name.strip_prefix(SCOPE_PREFIX).unwrap_or(name);
    let mut segments = path.split('.');
    let undefined = || FormulaError::UndefinedSymbol(name.to_string());
    let mut current = segments
        .next()
        .and_then(|first| scope.get(first))
        .ok_or_else(undefined)?;
    for segment in segments {
        current = current.get(segment).ok_or_else(undefined)?;
    }
    Ok(current.clone())
}

fn number(op: &'static str, value: &FormulaValue) -> FormulaResult<f64> {
    value.as_number().ok_or_else(|| FormulaError::Type {
        op,
        value: value.to_string(),
    })
}

fn binary(op: BinaryOp, left: &FormulaValue, right: &FormulaValue) -> FormulaResult<FormulaValue> {
    let symbol = op.symbol();
    let arithmetic = |f: fn(f64, f64) -> f64| -> FormulaResult<FormulaValue> {
        Ok(FormulaValue::Number(f(number(symbol, left)?, number(symbol, right)?)))
    };
    match op {
        BinaryOp::Add => arithmetic(|a, b| a + b),
        BinaryOp::Sub => arithmetic(|a, b| a - b),
        BinaryOp::Mul => arithmetic(|a, b| a * b),
        BinaryOp::Div => arithmetic(|a, b| a / b),
        BinaryOp::Rem => arithmetic(|a, b| a % b),
        BinaryOp::Pow => arithmetic(f64::powf),
        BinaryOp::Eq => Ok(FormulaValue::Bool(equals(left, right))),
        BinaryOp::Ne => Ok(FormulaValue::Bool(!equals(left, right))),
        BinaryOp::Lt => ordered(symbol, left, right, |o| o == Ordering::Less),
        BinaryOp::Le => ordered(symbol, left, right, |o| o != Ordering::Greater),
        BinaryOp::Gt => ordered(symbol, left, right, |o| o == Ordering::Greater),
        BinaryOp::Ge => ordered(symbol, left, right, |o| o != Ordering::Less),
        BinaryOp::And => Ok(FormulaValue::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(FormulaValue::Bool(left.is_truthy() || right.is_truthy())),
    }
}

/// Numbers compare numerically against numbers and numeric strings; other
/// values compare structurally.
fn equals(left: &FormulaValue, right: &FormulaValue) -> bool {
    match (left, right) {
        (FormulaValue::Number(_), _) | (_, FormulaValue::Number(_)) => {
            match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => left == right,
    }
}

fn ordered(
    op: &'static str,
    left: &FormulaValue,
    right: &FormulaValue,
    test: fn(Ordering) -> bool,
) -> FormulaResult<FormulaValue> {
    compare(op, left, right).map(|ordering| FormulaValue::Bool(test(ordering)))
}

fn compare(
    op: &'static str,
    left: &FormulaValue,
    right: &FormulaValue,
) -> FormulaResult<Ordering> {
    if let (FormulaValue::Str(a), FormulaValue::Str(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    let a = number(op, left)?;
    let b = number(op, right)?;
    // NaN compares as neither less nor greater
    Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
}

/// Numbers of every argument, arrays flattened one level.
fn flatten(op: &'static str, args: &[FormulaValue]) -> FormulaResult<Vec<f64>> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(items) => {
                for item in items {
                    out.push(number(op, item)?);
                }
            }
            other => out.push(number(op, other)?),
        }
    }
    Ok(out)
}

fn call(name: &str, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let arity = |expected: &'static str| FormulaError::Arity {
        name: name.to_string(),
        expected,
    };
    let value = match name {
        "sum" => flatten("sum", args)?.into_iter().sum(),
        "min" | "max" => {
            let (op, pick): (&'static str, fn(f64, f64) -> f64) = if name == "min" {
                ("min", f64::min)
            } else {
                ("max", f64::max)
            };
            let values = flatten(op, args)?;
            if values.is_empty() {
                return Err(arity("at least 1"));
            }
            values.into_iter().reduce(pick).unwrap_or(f64::NAN)
        }
        "abs" => match args {
            [x] => number("abs", x)?.abs(),
            _ => return Err(arity("1")),
        },
        "round" => match args {
            [x] => number("round", x)?.round(),
            [x, digits] => {
                let factor = 10f64.powf(number("round", digits)?);
                (number("round", x)? * factor).round() / factor
            }
            _ => return Err(arity("1 or 2")),
        },
        "floor" => match args {
            [x] => number("floor", x)?.floor(),
            _ => return Err(arity("1")),
        },
        "ceil" => match args {
            [x] => number("ceil", x)?.ceil(),
            _ => return Err(arity("1")),
        },
        _ => return Err(FormulaError::UnknownFunction(name.to_string())),
    };
    Ok(FormulaValue::Number(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parser::parse;
    use crate::formula::value::scope_from_json;
    use serde_json::json;

    fn run(source: &str, scope: serde_json::Value) -> FormulaResult<FormulaValue> {
        let scope = scope_from_json(scope.as_object().unwrap());
        eval(&parse(source)?, &scope)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("1 + 2 * 3 - 4 / 2", json!({})).unwrap(), FormulaValue::from(5.0));
        assert_eq!(run("2 ^ 3 ^ 2", json!({})).unwrap(), FormulaValue::from(512.0));
        assert_eq!(run("7 % 4", json!({})).unwrap(), FormulaValue::from(3.0));
        assert_eq!(run("-(1 + 2)", json!({})).unwrap(), FormulaValue::from(-3.0));
    }

    #[test]
    fn test_identifiers_and_scope_prefix() {
        let scope = json!({"area": 10, "project": {"factor": "1.5"}});
        assert_eq!(run("area * project.factor", scope.clone()).unwrap(), FormulaValue::from(15.0));
        assert_eq!(run("scope.area + 1", scope).unwrap(), FormulaValue::from(11.0));
    }

    #[test]
    fn test_undefined_symbol() {
        assert_eq!(
            run("missing + 1", json!({})).unwrap_err(),
            FormulaError::UndefinedSymbol("missing".into())
        );
    }

    #[test]
    fn test_comparison_and_logic() {
        let scope = json!({"type": "solar", "capacity": "12"});
        assert_eq!(run("type == \"solar\"", scope.clone()).unwrap(), FormulaValue::from(true));
        assert_eq!(run("capacity == 12", scope.clone()).unwrap(), FormulaValue::from(true));
        assert_eq!(run("capacity > 20 or type != 'wind'", scope.clone()).unwrap(), FormulaValue::from(true));
        assert_eq!(run("not (capacity >= 12) && true", scope).unwrap(), FormulaValue::from(false));
    }

    #[test]
    fn test_logical_short_circuit_skips_undefined() {
        assert_eq!(run("false and missing", json!({})).unwrap(), FormulaValue::from(false));
        assert_eq!(run("true or missing", json!({})).unwrap(), FormulaValue::from(true));
    }

    #[test]
    fn test_sum_over_arrays() {
        let scope = json!({"values": [1, 2, 3.5]});
        assert_eq!(run("sum(values)", scope.clone()).unwrap(), FormulaValue::from(6.5));
        assert_eq!(run("sum(values, 1) > 7", scope.clone()).unwrap(), FormulaValue::from(true));
        assert_eq!(run("max(values)", scope).unwrap(), FormulaValue::from(3.5));
        assert_eq!(run("round(2.346, 2)", json!({})).unwrap(), FormulaValue::from(2.35));
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(
            run("'abc' * 2", json!({})).unwrap_err(),
            FormulaError::Type { op: "*", .. }
        ));
        assert_eq!(
            run("median(1)", json!({})).unwrap_err(),
            FormulaError::UnknownFunction("median".into())
        );
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        let FormulaValue::Number(n) = run("1 / 0", json!({})).unwrap() else {
            panic!("expected number");
        };
        assert!(n.is_infinite());
    }
}
