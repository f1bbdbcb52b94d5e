//! Comparison predicates over the running value scope.
//!
//! Restriction criteria and include conditions are lists of
//! comparisons ANDed together. Each comparison names a parameter,
//! carries its expected value as a string (parsed through the
//! parameter's type), and picks the calibrated or raw side of the
//! decoded pair.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::types::ParameterType;
use crate::value::{Value, ValueMap};

/// The six comparison operators XTCE admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl ComparisonOperator {
    /// Parse the operator spelling used in XTCE documents.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessOrEqual),
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }

    /// True for the two operators every comparable type supports.
    pub fn is_equality(&self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => ordering == Ordering::Equal,
            Self::NotEqual => ordering != Ordering::Equal,
            Self::LessThan => ordering == Ordering::Less,
            Self::LessOrEqual => ordering != Ordering::Greater,
            Self::GreaterThan => ordering == Ordering::Greater,
            Self::GreaterOrEqual => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
        };
        f.write_str(s)
    }
}

/// One predicate: `parameter <op> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Qualified parameter name (resolved at schema build)
    pub parameter: String,
    pub operator: ComparisonOperator,
    /// Expected value, parsed through the parameter's type
    pub value: String,
    /// Compare the calibrated (true, default) or raw side
    pub use_calibrated: bool,
}

impl Comparison {
    /// Evaluate against the current scope. A parameter that is not
    /// (yet) in scope makes the comparison unsatisfied, never an
    /// error; restriction and include-condition semantics both want
    /// that.
    pub fn evaluate(&self, schema: &Schema, scope: &ValueMap) -> Result<bool> {
        let ty = schema
            .parameter_type_of(&self.parameter)
            .ok_or_else(|| SchemaError::UnknownParameter(self.parameter.clone()))?;

        let actual = match scope.value(&self.parameter, self.use_calibrated) {
            Some(v) => v,
            None => return Ok(false),
        };
        let expected = ty.parse_literal(&self.value).ok_or_else(|| {
            SchemaError::InvalidComparisonValue {
                parameter: self.parameter.clone(),
                value: self.value.clone(),
            }
        })?;

        let ordering = compare_in_type(ty, actual, &expected);
        match ordering {
            Some(ordering) => Ok(self.operator.holds(ordering)),
            // Incomparable values (e.g. corrupt kind) never satisfy
            None => Ok(false),
        }
    }

    /// Validate that the operator and value string make sense for the
    /// referenced parameter's type. Called once at schema build.
    pub fn validate(&self, ty: &ParameterType) -> Result<()> {
        if !ty.is_numeric() && !self.operator.is_equality() {
            return Err(SchemaError::InvalidComparison {
                parameter: self.parameter.clone(),
                operator: self.operator.to_string(),
            }
            .into());
        }
        if ty.parse_literal(&self.value).is_none() {
            return Err(SchemaError::InvalidComparisonValue {
                parameter: self.parameter.clone(),
                value: self.value.clone(),
            }
            .into());
        }
        Ok(())
    }
}

/// Compare a scope value against a parsed literal in the parameter
/// type's domain.
fn compare_in_type(ty: &ParameterType, actual: &Value, expected: &Value) -> Option<Ordering> {
    match ty {
        // Enumerations compare on the integer domain so that labels,
        // raw integers, and literals all meet in one place
        ParameterType::Enumerated { .. } => {
            let a = ty.enum_value_of(actual)?;
            let e = expected.as_i64()?;
            Some(a.cmp(&e))
        }
        ParameterType::Boolean { .. } => {
            let a = ty.boolean_of(actual)?;
            let e = match expected {
                Value::Boolean(b) => *b,
                _ => return None,
            };
            Some(a.cmp(&e))
        }
        ParameterType::String { .. } => match (actual, expected) {
            (Value::String(a), Value::String(e)) => Some(a.cmp(e)),
            _ => None,
        },
        ParameterType::Binary { .. } => match (actual, expected) {
            (Value::Bytes(a), Value::Bytes(e)) => Some(a.cmp(e)),
            _ => None,
        },
        _ => actual.numeric_cmp(expected),
    }
}

/// AND of comparisons; empty lists are vacuously true.
pub fn evaluate_all(
    comparisons: &[Comparison],
    schema: &Schema,
    scope: &ValueMap,
) -> Result<bool> {
    for comparison in comparisons {
        if !comparison.evaluate(schema, scope)? {
            return Ok(false);
        }
    }
    Ok(true)
}
