// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SQL-like filter expressions used by content-filtered topics, query
//! conditions and multitopic `WHERE` clauses.
//!
//! ```text
//! filter     := term (OR term)*
//! term       := factor (AND factor)*
//! factor     := NOT factor | '(' filter ')' | predicate
//! predicate  := operand op operand
//!             | operand [NOT] BETWEEN operand AND operand
//!             | operand
//! op         := = | <> | != | < | <= | > | >= | LIKE
//! operand    := %N | field.path | 42 | 4.2 | 'text' | TRUE | FALSE
//! ```
//!
//! `%N` placeholders are positional and counted by the highest index, so
//! `"a = %0 OR b = %2"` needs three parameters:
//!
//! ```ignore
//! let filter = ContentFilter::with_parameters(
//!     "temperature > %0 AND position.x BETWEEN %1 AND %2",
//!     vec!["25.0".into(), "-10".into(), "10".into()],
//! )?;
//! ```

mod evaluator;
mod parser;

pub use evaluator::FieldValue;
pub use parser::{parse_expression, Expression, Operator, Value};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct Compiled {
    text: String,
    tree: Expression,
    arity: usize,
}

/// A compiled filter and its bound parameters.
///
/// Clones share the parameter list, so updating one updates all.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    compiled: Arc<Compiled>,
    parameters: Arc<RwLock<Vec<String>>>,
}

impl ContentFilter {
    /// Compile `expression` with no parameters bound yet.
    pub fn new(expression: &str) -> Result<Self, FilterError> {
        let tree = parse_expression(expression)?;
        let compiled = Compiled {
            text: expression.to_owned(),
            arity: tree.parameter_count(),
            tree,
        };
        Ok(Self {
            compiled: Arc::new(compiled),
            parameters: Arc::default(),
        })
    }

    pub fn with_parameters(expression: &str, parameters: Vec<String>) -> Result<Self, FilterError> {
        let filter = Self::new(expression)?;
        filter.set_parameters(parameters)?;
        Ok(filter)
    }

    /// Rebind the parameters.
    ///
    /// # Errors
    ///
    /// `ParameterCount` if `params` does not have one value per placeholder.
    /// The old values stay bound.
    pub fn set_parameters(&self, params: Vec<String>) -> Result<(), FilterError> {
        let expected = self.compiled.arity;
        if params.len() != expected {
            return Err(FilterError::ParameterCount {
                expected,
                got: params.len(),
            });
        }
        *self.parameters.write() = params;
        Ok(())
    }

    pub fn parameters(&self) -> Vec<String> {
        self.parameters.read().clone()
    }

    /// Source text as given at construction.
    pub fn expression(&self) -> &str {
        &self.compiled.text
    }

    pub fn parameter_count(&self) -> usize {
        self.compiled.arity
    }

    /// Run the filter on one sample with the bound parameters.
    pub fn matches(&self, fields: &HashMap<String, FieldValue>) -> Result<bool, FilterError> {
        evaluator::evaluate(&self.compiled.tree, fields, &self.parameters.read())
    }

    /// Like [`matches`](Self::matches), but a sample the filter cannot be
    /// evaluated on is simply not accepted.
    pub(crate) fn accepts(&self, fields: &HashMap<String, FieldValue>) -> bool {
        self.matches(fields).unwrap_or_else(|err| {
            log::debug!("[filter] '{}' rejected sample: {}", self.compiled.text, err);
            false
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Malformed expression text.
    ParseError(String),
    /// Referenced field absent from the sample.
    UnknownField(String),
    /// `%N` with no bound value.
    ParameterOutOfRange(usize),
    /// Parameter list length differs from the placeholder count.
    ParameterCount { expected: usize, got: usize },
    /// Operands that cannot be compared, or a non-boolean used as a condition.
    TypeMismatch(String),
    /// Blank expression text.
    EmptyExpression,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError(detail) => write!(f, "cannot parse filter: {}", detail),
            Self::UnknownField(field) => write!(f, "sample has no field '{}'", field),
            Self::ParameterOutOfRange(index) => write!(f, "no value bound for %{}", index),
            Self::ParameterCount { expected, got } => {
                write!(f, "filter takes {} parameter(s), got {}", expected, got)
            }
            Self::TypeMismatch(detail) => write!(f, "incompatible operands: {}", detail),
            Self::EmptyExpression => f.write_str("filter expression is blank"),
        }
    }
}

impl std::error::Error for FilterError {}
