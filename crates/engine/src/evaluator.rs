//! Condition evaluation against a row of bound values.
//!
//! Evaluates a parsed [`Condition`] with variables bound to [`CellValue`]s.
//! Numeric comparison uses IEEE-754 double semantics, with the one deliberate
//! deviation that a `NaN` operand makes *every* comparison false — including
//! `!=` — so a clause over missing-ish data reads as "does not match" and the
//! piecewise resolver falls through to the next clause instead of erroring.

use indexmap::IndexMap;
use thiserror::Error;

use genoscore_core::dataset::CellValue;

use crate::condition::{CompareOp, Condition};

// ── Errors ──────────────────────────────────────────────────────────

/// Runtime evaluation failure for one clause against one row.
///
/// Recovered locally by the resolver (the clause is treated as non-matching);
/// never aborts a job.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("variable '{0}' is not bound for this rule")]
    UnboundVariable(String),

    #[error("variable '{0}' has no value for this gene")]
    MissingValue(String),

    #[error("cannot compare {lhs} {op} {rhs}")]
    TypeMismatch {
        op: CompareOp,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("a boolean sub-expression cannot be a comparison operand")]
    BooleanOperand,

    #[error("expression is not boolean (bare {0})")]
    NotBoolean(&'static str),
}

// ── Evaluation ──────────────────────────────────────────────────────

/// A comparison operand resolved to a concrete value.
enum Operand<'a> {
    Number(f64),
    Text(&'a str),
}

impl Operand<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Operand::Number(_) => "number",
            Operand::Text(_) => "text",
        }
    }
}

/// Evaluate a condition against a row of bound values.
///
/// `bindings` maps rule variable names to cell values. Deterministic: the
/// same condition and bindings always yield the same result.
pub fn evaluate(
    condition: &Condition,
    bindings: &IndexMap<String, CellValue>,
) -> Result<bool, EvalError> {
    match condition {
        Condition::True => Ok(true),
        Condition::And(l, r) => Ok(evaluate(l, bindings)? && evaluate(r, bindings)?),
        Condition::Or(l, r) => Ok(evaluate(l, bindings)? || evaluate(r, bindings)?),
        Condition::Compare { op, lhs, rhs } => {
            let lhs = operand(lhs, bindings)?;
            let rhs = operand(rhs, bindings)?;
            compare(*op, lhs, rhs)
        }
        Condition::Number(_) => Err(EvalError::NotBoolean("number")),
        Condition::Text(_) => Err(EvalError::NotBoolean("string")),
        Condition::Var(_) => Err(EvalError::NotBoolean("variable")),
    }
}

fn operand<'a>(
    condition: &'a Condition,
    bindings: &'a IndexMap<String, CellValue>,
) -> Result<Operand<'a>, EvalError> {
    match condition {
        Condition::Number(n) => Ok(Operand::Number(*n)),
        Condition::Text(s) => Ok(Operand::Text(s)),
        Condition::Var(name) => match bindings.get(name) {
            None => Err(EvalError::UnboundVariable(name.clone())),
            Some(CellValue::Missing) => Err(EvalError::MissingValue(name.clone())),
            Some(CellValue::Number(n)) => Ok(Operand::Number(*n)),
            Some(CellValue::Text(s)) => Ok(Operand::Text(s)),
        },
        _ => Err(EvalError::BooleanOperand),
    }
}

fn compare(op: CompareOp, lhs: Operand<'_>, rhs: Operand<'_>) -> Result<bool, EvalError> {
    match (&lhs, &rhs) {
        (Operand::Number(a), Operand::Number(b)) => {
            // NaN never matches, regardless of operator.
            if a.is_nan() || b.is_nan() {
                return Ok(false);
            }
            Ok(match op {
                CompareOp::Gt => a > b,
                CompareOp::Lt => a < b,
                CompareOp::Ge => a >= b,
                CompareOp::Le => a <= b,
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
            })
        }
        (Operand::Text(a), Operand::Text(b)) => match op {
            CompareOp::Eq => Ok(a == b),
            CompareOp::Ne => Ok(a != b),
            _ => Err(EvalError::TypeMismatch {
                op,
                lhs: lhs.kind(),
                rhs: rhs.kind(),
            }),
        },
        _ => Err(EvalError::TypeMismatch {
            op,
            lhs: lhs.kind(),
            rhs: rhs.kind(),
        }),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::parse;

    fn bindings(values: &[(&str, CellValue)]) -> IndexMap<String, CellValue> {
        values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn eval(src: &str, values: &[(&str, CellValue)]) -> Result<bool, EvalError> {
        evaluate(&parse(src).unwrap(), &bindings(values))
    }

    #[test]
    fn numeric_comparisons() {
        let row = [("x", CellValue::Number(0.42))];
        assert_eq!(eval("x > 0.3", &row), Ok(true));
        assert_eq!(eval("x > 0.5", &row), Ok(false));
        assert_eq!(eval("x >= 0.42", &row), Ok(true));
        assert_eq!(eval("x <= 0.42", &row), Ok(true));
        assert_eq!(eval("x < 0.42", &row), Ok(false));
        assert_eq!(eval("x == 0.42", &row), Ok(true));
        assert_eq!(eval("x != 0.42", &row), Ok(false));
    }

    #[test]
    fn nan_makes_every_comparison_false() {
        let row = [("x", CellValue::Number(f64::NAN))];
        for src in ["x > 0", "x < 0", "x >= 0", "x <= 0", "x == 0", "x != 0"] {
            assert_eq!(eval(src, &row), Ok(false), "{}", src);
        }
    }

    #[test]
    fn true_literal_always_true() {
        assert_eq!(eval("TRUE", &[]), Ok(true));
        assert_eq!(eval("TRUE", &[("x", CellValue::Missing)]), Ok(true));
    }

    #[test]
    fn string_equality_is_exact_and_case_sensitive() {
        let row = [("effect", CellValue::Text("missense".into()))];
        assert_eq!(eval("effect == 'missense'", &row), Ok(true));
        assert_eq!(eval("effect == 'Missense'", &row), Ok(false));
        assert_eq!(eval("effect != 'nonsense'", &row), Ok(true));
    }

    #[test]
    fn string_ordering_is_a_type_error() {
        let row = [("effect", CellValue::Text("missense".into()))];
        assert!(matches!(
            eval("effect > 'a'", &row),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn mixed_types_are_a_type_error() {
        let row = [("x", CellValue::Number(1.0))];
        assert!(matches!(
            eval("x == 'one'", &row),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unbound_variable_is_an_error() {
        assert_eq!(
            eval("y > 1", &[("x", CellValue::Number(1.0))]),
            Err(EvalError::UnboundVariable("y".to_string()))
        );
    }

    #[test]
    fn missing_value_is_an_error() {
        assert_eq!(
            eval("x > 1", &[("x", CellValue::Missing)]),
            Err(EvalError::MissingValue("x".to_string()))
        );
    }

    #[test]
    fn and_or_logic() {
        let row = [
            ("x", CellValue::Number(0.6)),
            ("y", CellValue::Number(0.1)),
        ];
        assert_eq!(eval("x > 0.5 & y < 0.2", &row), Ok(true));
        assert_eq!(eval("x > 0.5 & y > 0.2", &row), Ok(false));
        assert_eq!(eval("x > 0.9 | y < 0.2", &row), Ok(true));
        assert_eq!(eval("x > 0.9 | y > 0.2", &row), Ok(false));
        assert_eq!(eval("(x > 0.9 | y < 0.2) & x > 0.5", &row), Ok(true));
    }

    #[test]
    fn left_error_propagates_through_logic() {
        let row = [("x", CellValue::Number(1.0))];
        assert!(matches!(
            eval("missing > 1 & x > 0", &row),
            Err(EvalError::UnboundVariable(_))
        ));
    }

    #[test]
    fn short_circuit_skips_right_arm() {
        // x > 0 is true, so the erroring right arm of `|` is never reached.
        let row = [("x", CellValue::Number(1.0))];
        assert_eq!(eval("x > 0 | missing > 1", &row), Ok(true));
    }

    #[test]
    fn bare_atom_is_not_boolean() {
        let row = [("x", CellValue::Number(1.0))];
        assert!(matches!(eval("x", &row), Err(EvalError::NotBoolean(_))));
        assert!(matches!(eval("5", &[]), Err(EvalError::NotBoolean(_))));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let row = [("x", CellValue::Number(0.42))];
        for _ in 0..3 {
            assert_eq!(eval("x > 0.3 & x < 0.5", &row), Ok(true));
        }
    }
}
