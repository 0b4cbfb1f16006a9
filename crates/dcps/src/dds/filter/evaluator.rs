// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runs a parsed filter against the field values of one sample.

use super::parser::{Expression, Operator, Value};
use super::FilterError;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Tolerance for float equality.
const EPSILON: f64 = 1e-9;

/// Evaluate `expr` against `fields`, substituting `params` for `%N`.
pub(super) fn evaluate(
    expr: &Expression,
    fields: &HashMap<String, FieldValue>,
    params: &[String],
) -> Result<bool, FilterError> {
    Scope { fields, params }.test(expr)
}

struct Scope<'a> {
    fields: &'a HashMap<String, FieldValue>,
    params: &'a [String],
}

impl Scope<'_> {
    fn test(&self, expr: &Expression) -> Result<bool, FilterError> {
        let verdict = match expr {
            Expression::True => true,
            Expression::Comparison { left, op, right } => {
                relate(&self.load(left)?, *op, &self.load(right)?)?
            }
            Expression::Between { value, low, high } => {
                let v = self.load(value)?;
                relate(&v, Operator::Ge, &self.load(low)?)?
                    && relate(&v, Operator::Le, &self.load(high)?)?
            }
            Expression::Truthy(value) => self.load(value)?.truthy()?,
            // `&&` / `||` keep the right side unevaluated when the left decides.
            Expression::And(lhs, rhs) => self.test(lhs)? && self.test(rhs)?,
            Expression::Or(lhs, rhs) => self.test(lhs)? || self.test(rhs)?,
            Expression::Not(inner) => !self.test(inner)?,
        };
        Ok(verdict)
    }

    fn load(&self, value: &Value) -> Result<FieldValue, FilterError> {
        let loaded = match value {
            Value::Integer(n) => FieldValue::Integer(*n),
            Value::Float(x) => FieldValue::Float(*x),
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Boolean(b) => FieldValue::Boolean(*b),
            Value::Parameter(index) => match self.params.get(*index) {
                Some(raw) => FieldValue::parse_parameter(raw),
                None => return Err(FilterError::ParameterOutOfRange(*index)),
            },
            Value::Field(name) => match self.fields.get(name) {
                Some(field) => field.clone(),
                None => return Err(FilterError::UnknownField(name.clone())),
            },
        };
        Ok(loaded)
    }
}

/// Outcome of ordering two operands.
enum Relation {
    Exact(Ordering),
    /// Both sides coerced to floats; equality uses [`EPSILON`].
    Approx(f64, f64),
}

fn relate(lhs: &FieldValue, op: Operator, rhs: &FieldValue) -> Result<bool, FilterError> {
    let booleans = matches!(lhs, FieldValue::Boolean(_)) || matches!(rhs, FieldValue::Boolean(_));
    match op {
        Operator::Like => match (lhs, rhs) {
            (FieldValue::String(text), FieldValue::String(pattern)) => Ok(like(text, pattern)),
            _ => Err(FilterError::TypeMismatch(format!(
                "LIKE wants text on both sides, got {:?} and {:?}",
                lhs, rhs
            ))),
        },
        Operator::Eq | Operator::Ne => relation(lhs, rhs).map(|r| holds(op, r)),
        _ if booleans => Err(FilterError::TypeMismatch(
            "booleans are only ordered by = and <>".into(),
        )),
        _ => relation(lhs, rhs).map(|r| holds(op, r)),
    }
}

fn relation(lhs: &FieldValue, rhs: &FieldValue) -> Result<Relation, FilterError> {
    use FieldValue::{Boolean, Integer, String as Text, Unsigned};

    let incomparable = || FilterError::TypeMismatch(format!("{:?} vs {:?}", lhs, rhs));
    let ordering = match (lhs, rhs) {
        (Integer(a), Integer(b)) => a.cmp(b),
        (Unsigned(a), Unsigned(b)) => a.cmp(b),
        (Integer(a), Unsigned(b)) => i128::from(*a).cmp(&i128::from(*b)),
        (Unsigned(a), Integer(b)) => i128::from(*a).cmp(&i128::from(*b)),
        (Boolean(a), Boolean(b)) => a.cmp(b),
        (Boolean(_), _) | (_, Boolean(_)) => return Err(incomparable()),
        (Text(a), Text(b)) => a.cmp(b),
        // Text meets a number: numeric if the text parses, lexical otherwise.
        (Text(_), _) | (_, Text(_)) => match (lhs.number(), rhs.number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(incomparable)?,
            _ => lhs.text().cmp(&rhs.text()),
        },
        _ => match (lhs.number(), rhs.number()) {
            (Some(a), Some(b)) => return Ok(Relation::Approx(a, b)),
            _ => return Err(incomparable()),
        },
    };
    Ok(Relation::Exact(ordering))
}

fn holds(op: Operator, relation: Relation) -> bool {
    let ordering = match relation {
        Relation::Exact(ordering) => Some(ordering),
        Relation::Approx(a, b) if (a - b).abs() < EPSILON => Some(Ordering::Equal),
        Relation::Approx(a, b) => a.partial_cmp(&b),
    };
    // NaN only satisfies <>.
    let Some(ordering) = ordering else {
        return op == Operator::Ne;
    };
    match op {
        Operator::Eq => ordering.is_eq(),
        Operator::Ne => ordering.is_ne(),
        Operator::Gt => ordering.is_gt(),
        Operator::Ge => ordering.is_ge(),
        Operator::Lt => ordering.is_lt(),
        Operator::Le => ordering.is_le(),
        Operator::Like => false,
    }
}

/// SQL LIKE: `%` spans any run of characters, `_` exactly one.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    // Last `%` seen: pattern index after it, and the text index it currently absorbs up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                p += 1;
                backtrack = Some((p, t));
            }
            Some(&c) if c == '_' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((resume, absorbed)) => {
                    p = resume;
                    t = absorbed + 1;
                    backtrack = Some((resume, t));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

/// Runtime field value for filter evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Unsigned(u64),
}

impl FieldValue {
    pub fn from_i32(v: i32) -> Self {
        Self::Integer(v.into())
    }

    pub fn from_u32(v: u32) -> Self {
        Self::Unsigned(v.into())
    }

    pub fn from_i64(v: i64) -> Self {
        Self::Integer(v)
    }

    pub fn from_u64(v: u64) -> Self {
        Self::Unsigned(v)
    }

    pub fn from_f32(v: f32) -> Self {
        Self::Float(v.into())
    }

    pub fn from_f64(v: f64) -> Self {
        Self::Float(v)
    }

    pub fn from_bool(v: bool) -> Self {
        Self::Boolean(v)
    }

    pub fn from_string(v: impl Into<String>) -> Self {
        Self::String(v.into())
    }

    /// Typed view of a `%N` parameter. Tries integer, float and boolean
    /// before falling back to text, with optional single quotes stripped.
    pub(crate) fn parse_parameter(raw: &str) -> Self {
        let token = raw.trim();
        if let Ok(n) = token.parse::<i64>() {
            return Self::Integer(n);
        }
        if let Ok(x) = token.parse::<f64>() {
            return Self::Float(x);
        }
        match token.to_ascii_lowercase().as_str() {
            "true" => Self::Boolean(true),
            "false" => Self::Boolean(false),
            _ => Self::String(
                token
                    .strip_prefix('\'')
                    .and_then(|inner| inner.strip_suffix('\''))
                    .unwrap_or(raw)
                    .to_owned(),
            ),
        }
    }

    /// Equality used to join samples on a shared field name; numbers match
    /// across representations (`Unsigned(7)` joins `Integer(7)`).
    pub(crate) fn joins(&self, other: &FieldValue) -> bool {
        relate(self, Operator::Eq, other).unwrap_or(false)
    }

    fn truthy(&self) -> Result<bool, FilterError> {
        match *self {
            Self::Boolean(b) => Ok(b),
            Self::Integer(n) => Ok(n != 0),
            Self::Unsigned(n) => Ok(n != 0),
            _ => Err(FilterError::TypeMismatch(format!(
                "{:?} used as a condition",
                self
            ))),
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Unsigned(n) => Some(*n as f64),
            Self::Float(x) => Some(*x),
            Self::String(s) => s.trim().parse().ok(),
            Self::Boolean(_) => None,
        }
    }

    fn text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Unsigned(n) => n.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Boolean(b) => b.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dds::filter::parse_expression;

    fn check(expr: &str, fields: &[(&str, FieldValue)], params: &[&str]) -> Result<bool, FilterError> {
        let expression = parse_expression(expr).unwrap();
        let fields: HashMap<String, FieldValue> = fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        evaluate(&expression, &fields, &params)
    }

    #[test]
    fn test_threshold_on_float_field() {
        let reading = |c: f64| [("temperature", FieldValue::Float(c))];
        assert!(check("temperature > 25", &reading(30.0), &[]).unwrap());
        assert!(!check("temperature > 25", &reading(20.0), &[]).unwrap());
        assert!(check("temperature >= 25", &reading(25.0 + 1e-12), &[]).unwrap());
    }

    #[test]
    fn test_parameters_are_typed_on_use() {
        let sample = [("value", FieldValue::Integer(150))];
        assert!(check("value > %0", &sample, &["100"]).unwrap());
        assert!(!check("value > %0", &sample, &["200"]).unwrap());
        assert!(check("value = %0", &sample, &["150.0"]).unwrap());
        assert_eq!(
            check("value > %1", &sample, &["100"]),
            Err(FilterError::ParameterOutOfRange(1))
        );
    }

    #[test]
    fn test_and_or_not() {
        let sample = [("a", FieldValue::Integer(15)), ("b", FieldValue::Integer(10))];
        assert!(check("a > 10 AND b < 20", &sample, &[]).unwrap());
        assert!(check("a > 100 OR b = 10", &sample, &[]).unwrap());
        assert!(!check("NOT (a > 10)", &sample, &[]).unwrap());
    }

    #[test]
    fn test_short_circuit_skips_bad_operand() {
        let sample = [("a", FieldValue::Integer(1))];
        assert!(!check("a = 2 AND ghost = 1", &sample, &[]).unwrap());
        assert!(check("a = 1 OR ghost = 1", &sample, &[]).unwrap());
    }

    #[test]
    fn test_signed_unsigned_and_float_mix() {
        let sample = [
            ("id", FieldValue::Unsigned(u64::MAX)),
            ("level", FieldValue::Float(2.0)),
        ];
        assert!(check("id > -1", &sample, &[]).unwrap());
        assert!(check("id <> 7", &sample, &[]).unwrap());
        assert!(check("level = 2", &sample, &[]).unwrap());
    }

    #[test]
    fn test_between_bounds_are_inclusive() {
        let sample = [("x", FieldValue::Integer(10))];
        assert!(check("x BETWEEN 1 AND 10", &sample, &[]).unwrap());
        assert!(!check("x NOT BETWEEN 1 AND 10", &sample, &[]).unwrap());
        assert!(!check("x BETWEEN %0 AND %1", &sample, &["11", "20"]).unwrap());
    }

    #[test]
    fn test_text_equality_and_like() {
        let sample = [("name", FieldValue::String("sensor_12".into()))];
        assert!(check("name = 'sensor_12'", &sample, &[]).unwrap());
        assert!(check("name = %0", &sample, &["'sensor_12'"]).unwrap());
        assert!(check("name LIKE 'sensor%'", &sample, &[]).unwrap());
        assert!(check("name LIKE 'sensor__2'", &sample, &[]).unwrap());
        assert!(!check("name LIKE 'gauge%'", &sample, &[]).unwrap());
        assert!(check("name > 5", &sample, &[]).unwrap());
    }

    #[test]
    fn test_boolean_fields() {
        let sample = [("enabled", FieldValue::Boolean(true))];
        assert!(check("enabled", &sample, &[]).unwrap());
        assert!(check("enabled = TRUE", &sample, &[]).unwrap());
        assert!(check("enabled <> %0", &sample, &["FALSE"]).unwrap());
        assert!(check("enabled > TRUE", &sample, &[]).is_err());
        assert!(check("enabled = 1", &sample, &[]).is_err());
    }

    #[test]
    fn test_missing_field_is_an_error() {
        assert_eq!(
            check("ghost = 1", &[], &[]),
            Err(FilterError::UnknownField("ghost".into()))
        );
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("", "%"));
        assert!(like("", ""));
        assert!(!like("a", ""));
        assert!(like("abc", "a%c"));
        assert!(like("abcbc", "%bc"));
        assert!(like("aXbYc", "a%b%c"));
        assert!(!like("abc", "a_"));
        assert!(!like("ab", "a%c"));
    }
}
