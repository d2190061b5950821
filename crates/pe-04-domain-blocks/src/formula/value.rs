//! Values flowing through formula evaluation.

use serde_json::{Map, Value};
use shared_types::PolicyDocument;
use std::collections::BTreeMap;
use std::fmt;

/// Identifiers visible to a formula, keyed by top-level name.
pub type Scope = BTreeMap<String, FormulaValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<FormulaValue>),
    Object(BTreeMap<String, FormulaValue>),
}

impl FormulaValue {
    /// Numeric view used by arithmetic. Numeric strings and booleans
    /// coerce; everything else does not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Lenient float parse of a result: numbers and numeric strings keep
    /// their value, anything else is NaN.
    pub fn parse_float(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Array(items) => !items.is_empty(),
            Self::Object(_) => true,
        }
    }

    /// Follow one path segment: an object key or an array index.
    pub fn get(&self, segment: &str) -> Option<&FormulaValue> {
        match self {
            Self::Object(map) => map.get(segment),
            Self::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(_) => f.write_str("{object}"),
        }
    }
}

impl From<&Value> for FormulaValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<f64> for FormulaValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FormulaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Scope built from a JSON object's fields.
pub fn scope_from_json(fields: &Map<String, Value>) -> Scope {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), FormulaValue::from(value)))
        .collect()
}

/// A document's credential subject as a scope.
pub fn document_scope(doc: &PolicyDocument) -> Scope {
    scope_from_json(&doc.vc_scope())
}

/// Column-wise merge: every key of the first scope maps to the array of
/// that key's values across all scopes, so `sum(x)` totals a batch.
pub fn merge_scopes(scopes: &[Scope]) -> Scope {
    let Some(first) = scopes.first() else {
        return Scope::new();
    };
    first
        .keys()
        .map(|key| {
            let column = scopes
                .iter()
                .map(|scope| scope.get(key).cloned().unwrap_or(FormulaValue::Null))
                .collect();
            (key.clone(), FormulaValue::Array(column))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(FormulaValue::Str(" 12.5 ".into()).as_number(), Some(12.5));
        assert_eq!(FormulaValue::Bool(true).as_number(), Some(1.0));
        assert_eq!(FormulaValue::Str("abc".into()).as_number(), None);
        assert!(FormulaValue::Bool(true).parse_float().is_nan());
    }

    #[test]
    fn test_path_segments() {
        let value = FormulaValue::from(&json!({"items": [{"v": 3}]}));
        let item = value.get("items").and_then(|v| v.get("0")).and_then(|v| v.get("v"));
        assert_eq!(item, Some(&FormulaValue::Number(3.0)));
    }

    #[test]
    fn test_merge_scopes_builds_columns() {
        let a = scope_from_json(json!({"x": 1, "y": 2}).as_object().unwrap());
        let b = scope_from_json(json!({"x": 3, "y": 4}).as_object().unwrap());
        let merged = merge_scopes(&[a, b]);
        assert_eq!(
            merged.get("x"),
            Some(&FormulaValue::Array(vec![1.0.into(), 3.0.into()]))
        );
        assert!(merge_scopes(&[]).is_empty());
    }
}
