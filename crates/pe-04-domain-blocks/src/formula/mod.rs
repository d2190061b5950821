//! # Formula Evaluator
//!
//! Small expression language used by mint rules, retirement serial
//! expressions, aggregate expressions and conditions, and switch
//! conditions.
//!
//! | Construct    | Example                                   |
//! |--------------|-------------------------------------------|
//! | literals     | `12.5`, `"solar"`, `'x'`, `true`          |
//! | identifiers  | `area`, `project.capacity`, `scope.area`  |
//! | arithmetic   | `+ - * / % ^`, unary `-`                  |
//! | comparison   | `== != < <= > >=`                         |
//! | logic        | `and or not`, `&& \|\| !`                 |
//! | functions    | `sum`, `min`, `max`, `abs`, `round`, ...  |
//!
//! Identifiers resolve against a [`Scope`], normally a document's
//! credential subject. Aggregate conditions evaluate against a merged scope
//! where each name holds the array of its values across a batch, which
//! `sum(name)` totals.

mod eval;
mod lexer;
mod parser;
mod value;

pub use parser::{BinaryOp, Expr, UnaryOp};
pub use value::{document_scope, merge_scopes, scope_from_json, FormulaValue, Scope};

use crate::error::FormulaResult;
use shared_types::PolicyDocument;

/// A parsed formula, reusable across scopes.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> FormulaResult<Self> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, scope: &Scope) -> FormulaResult<FormulaValue> {
        eval::eval(&self.expr, scope)
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(source: &str, scope: &Scope) -> FormulaResult<FormulaValue> {
    Formula::parse(source)?.evaluate(scope)
}

/// Sum of `rule` evaluated over each document's credential subject.
///
/// Non-numeric results contribute NaN, which callers reject.
pub fn aggregate<'a>(
    rule: &str,
    documents: impl IntoIterator<Item = &'a PolicyDocument>,
) -> FormulaResult<f64> {
    let formula = Formula::parse(rule)?;
    let mut amount = 0.0;
    for doc in documents {
        amount += formula.evaluate(&document_scope(doc))?.parse_float();
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;
    use serde_json::json;

    fn doc(subject: serde_json::Value) -> PolicyDocument {
        PolicyDocument::new("did:a", json!({"credentialSubject": [subject]}))
    }

    #[test]
    fn test_aggregate_sums_per_document() {
        let docs = [doc(json!({"tons": 2, "factor": 1.5})), doc(json!({"tons": "4", "factor": 1}))];
        assert_eq!(aggregate("tons * factor", &docs).unwrap(), 7.0);
    }

    #[test]
    fn test_aggregate_non_numeric_is_nan() {
        let docs = [doc(json!({"kind": "solar"}))];
        assert!(aggregate("kind", &docs).unwrap().is_nan());
    }

    #[test]
    fn test_aggregate_propagates_errors() {
        let docs = [doc(json!({}))];
        assert_eq!(
            aggregate("tons", &docs).unwrap_err(),
            FormulaError::UndefinedSymbol("tons".into())
        );
        assert!(aggregate("tons *", &docs).unwrap_err().is_syntax());
    }

    #[test]
    fn test_formula_is_reusable() {
        let formula = Formula::parse("x > 1").unwrap();
        let scope = |x: f64| Scope::from([("x".to_string(), FormulaValue::Number(x))]);
        assert_eq!(formula.evaluate(&scope(2.0)).unwrap(), FormulaValue::Bool(true));
        assert_eq!(formula.evaluate(&scope(0.5)).unwrap(), FormulaValue::Bool(false));
        assert_eq!(formula.source(), "x > 1");
    }
}
