//! Predicate catalogue for criteria.
//!
//! An `Operation` names what a criterion checks; a `Predicate` is an
//! operation whose inputs have been validated (and, for regex matches,
//! compiled) so that testing a telemetry value is cheap and infallible.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value::Value;

/// Supported criterion operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Value equals the input (numeric).
    EqualTo,
    /// Value differs from the input (numeric).
    NotEqualTo,
    /// Value is greater than the input.
    GreaterThan,
    /// Value is less than the input.
    LessThan,
    /// Value is greater than or equal to the input.
    GreaterThanOrEq,
    /// Value is less than or equal to the input.
    LessThanOrEq,
    /// Value lies strictly between the two inputs.
    Between,
    /// Value lies outside the two inputs.
    NotBetween,
    /// Text contains the input.
    TextContains,
    /// Text does not contain the input.
    TextDoesNotContain,
    /// Text starts with the input.
    TextStartsWith,
    /// Text ends with the input.
    TextEndsWith,
    /// Text equals the input exactly.
    TextIsExactly,
    /// Text matches the input regex.
    TextMatches,
    /// Field is present and not null.
    IsDefined,
    /// Field is absent or null.
    IsUndefined,
    /// Field is boolean `true`.
    IsTrue,
    /// Field is boolean `false`.
    IsFalse,
    /// Enumerated value equals the input.
    EnumValueIs,
    /// Enumerated value differs from the input.
    EnumValueIsNot,
}

/// What kind of inputs an operation expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No inputs.
    None,
    /// Numbers (numeric strings accepted).
    Numeric,
    /// Free text.
    Text,
    /// A regular expression.
    Pattern,
    /// An enumeration value, compared numerically or textually.
    Enum,
}

impl Operation {
    /// Every supported operation.
    pub const ALL: [Self; 20] = [
        Self::EqualTo,
        Self::NotEqualTo,
        Self::GreaterThan,
        Self::LessThan,
        Self::GreaterThanOrEq,
        Self::LessThanOrEq,
        Self::Between,
        Self::NotBetween,
        Self::TextContains,
        Self::TextDoesNotContain,
        Self::TextStartsWith,
        Self::TextEndsWith,
        Self::TextIsExactly,
        Self::TextMatches,
        Self::IsDefined,
        Self::IsUndefined,
        Self::IsTrue,
        Self::IsFalse,
        Self::EnumValueIs,
        Self::EnumValueIsNot,
    ];

    /// Configuration name of the operation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EqualTo => "equalTo",
            Self::NotEqualTo => "notEqualTo",
            Self::GreaterThan => "greaterThan",
            Self::LessThan => "lessThan",
            Self::GreaterThanOrEq => "greaterThanOrEq",
            Self::LessThanOrEq => "lessThanOrEq",
            Self::Between => "between",
            Self::NotBetween => "notBetween",
            Self::TextContains => "textContains",
            Self::TextDoesNotContain => "textDoesNotContain",
            Self::TextStartsWith => "textStartsWith",
            Self::TextEndsWith => "textEndsWith",
            Self::TextIsExactly => "textIsExactly",
            Self::TextMatches => "textMatches",
            Self::IsDefined => "isDefined",
            Self::IsUndefined => "isUndefined",
            Self::IsTrue => "isTrue",
            Self::IsFalse => "isFalse",
            Self::EnumValueIs => "enumValueIs",
            Self::EnumValueIsNot => "enumValueIsNot",
        }
    }

    /// Number of inputs the operation takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::IsDefined | Self::IsUndefined | Self::IsTrue | Self::IsFalse => 0,
            Self::Between | Self::NotBetween => 2,
            _ => 1,
        }
    }

    /// Kind of inputs the operation takes.
    #[must_use]
    pub const fn operand_kind(self) -> OperandKind {
        match self {
            Self::EqualTo
            | Self::NotEqualTo
            | Self::GreaterThan
            | Self::LessThan
            | Self::GreaterThanOrEq
            | Self::LessThanOrEq
            | Self::Between
            | Self::NotBetween => OperandKind::Numeric,
            Self::TextContains
            | Self::TextDoesNotContain
            | Self::TextStartsWith
            | Self::TextEndsWith
            | Self::TextIsExactly => OperandKind::Text,
            Self::TextMatches => OperandKind::Pattern,
            Self::EnumValueIs | Self::EnumValueIsNot => OperandKind::Enum,
            Self::IsDefined | Self::IsUndefined | Self::IsTrue | Self::IsFalse => OperandKind::None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.name() == name)
            .ok_or_else(|| ValidationError::UnknownOperation {
                name: name.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
enum Operands {
    None,
    Numbers(Vec<f64>),
    Text(String),
    Pattern(Regex),
    Enum(Value),
}

/// A validated operation with its inputs.
#[derive(Debug, Clone)]
pub struct Predicate {
    operation: Operation,
    operands: Operands,
}

impl Predicate {
    /// Validates `input` against the named operation.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for unknown operations, wrong input counts,
    /// non-numeric inputs to numeric operations and invalid regexes.
    pub fn compile(operation: &str, input: &[Value]) -> Result<Self, ValidationError> {
        let operation: Operation = operation.parse()?;

        if input.len() != operation.arity() {
            return Err(ValidationError::InvalidArity {
                operation: operation.name().to_string(),
                expected: operation.arity(),
                actual: input.len(),
            });
        }

        let invalid = |index: usize, reason: String| ValidationError::InvalidOperand {
            operation: operation.name().to_string(),
            index,
            reason,
        };

        let operands = match operation.operand_kind() {
            OperandKind::None => Operands::None,
            OperandKind::Numeric => {
                let mut numbers = Vec::with_capacity(input.len());
                for (index, v) in input.iter().enumerate() {
                    let n = v
                        .as_number()
                        .ok_or_else(|| invalid(index, format!("expected a number, got {v}")))?;
                    numbers.push(n);
                }
                Operands::Numbers(numbers)
            }
            OperandKind::Text => {
                let text = input[0]
                    .as_text()
                    .ok_or_else(|| invalid(0, "expected text, got null".to_string()))?;
                Operands::Text(text)
            }
            OperandKind::Pattern => {
                let pattern = input[0]
                    .as_text()
                    .ok_or_else(|| invalid(0, "expected a regex, got null".to_string()))?;
                let regex = Regex::new(&pattern).map_err(|e| ValidationError::InvalidRegex {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                Operands::Pattern(regex)
            }
            OperandKind::Enum => {
                if input[0].is_null() {
                    return Err(invalid(0, "expected an enumeration value, got null".to_string()));
                }
                Operands::Enum(input[0].clone())
            }
        };

        Ok(Self { operation, operands })
    }

    /// The operation this predicate applies.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Tests a telemetry value. `None` means the field is absent.
    #[must_use]
    pub fn test(&self, value: Option<&Value>) -> bool {
        let defined = value.is_some_and(|v| !v.is_null());

        match (&self.operands, self.operation) {
            (Operands::None, Operation::IsDefined) => defined,
            (Operands::None, Operation::IsUndefined) => !defined,
            (Operands::None, Operation::IsTrue) => value.and_then(Value::as_bool) == Some(true),
            (Operands::None, Operation::IsFalse) => value.and_then(Value::as_bool) == Some(false),
            (Operands::Numbers(bounds), op) => {
                let Some(v) = value.and_then(Value::as_number) else {
                    return false;
                };
                compare_numeric(op, v, bounds)
            }
            (Operands::Text(expected), op) => {
                let Some(text) = value.and_then(Value::as_text) else {
                    return false;
                };
                match op {
                    Operation::TextContains => text.contains(expected.as_str()),
                    Operation::TextDoesNotContain => !text.contains(expected.as_str()),
                    Operation::TextStartsWith => text.starts_with(expected.as_str()),
                    Operation::TextEndsWith => text.ends_with(expected.as_str()),
                    Operation::TextIsExactly => text == *expected,
                    _ => false,
                }
            }
            (Operands::Pattern(regex), _) => value
                .and_then(Value::as_text)
                .is_some_and(|text| regex.is_match(&text)),
            (Operands::Enum(expected), op) => {
                let Some(v) = value.filter(|v| !v.is_null()) else {
                    return false;
                };
                let equal = enum_equal(v, expected);
                match op {
                    Operation::EnumValueIs => equal,
                    Operation::EnumValueIsNot => !equal,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

#[allow(clippy::float_cmp)]
fn compare_numeric(op: Operation, v: f64, bounds: &[f64]) -> bool {
    match (op, bounds) {
        (Operation::EqualTo, [x]) => v == *x,
        (Operation::NotEqualTo, [x]) => v != *x,
        (Operation::GreaterThan, [x]) => v > *x,
        (Operation::LessThan, [x]) => v < *x,
        (Operation::GreaterThanOrEq, [x]) => v >= *x,
        (Operation::LessThanOrEq, [x]) => v <= *x,
        (Operation::Between, [a, b]) => {
            let (low, high) = if a <= b { (*a, *b) } else { (*b, *a) };
            v > low && v < high
        }
        (Operation::NotBetween, [a, b]) => {
            let (low, high) = if a <= b { (*a, *b) } else { (*b, *a) };
            v < low || v > high
        }
        _ => false,
    }
}

#[allow(clippy::float_cmp)]
fn enum_equal(value: &Value, expected: &Value) -> bool {
    match (value.as_number(), expected.as_number()) {
        (Some(a), Some(b)) => a == b,
        _ => value.as_text() == expected.as_text(),
    }
}
