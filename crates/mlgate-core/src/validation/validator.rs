//! # Validators
//!
//! Conditions evidence is checked against.
//!
//! A validator is plain data: a tagged enum (`kind`) that serializes with the
//! test suite and is evaluated by a pure function. Nothing executable is ever
//! stored.
//!
//! ## Numeric Semantics
//!
//! Comparison validators accept integer and real values, and arrays where
//! every element must satisfy the condition. Any other value fails with a
//! message naming the value type.

use crate::model::EvidenceValue;
use crate::query::values_equal;
use crate::types::check_finite;
use crate::validation::{ResultType, ValidationResult};
use crate::MlgateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A condition over one evidence value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
    LessThan { threshold: f64 },
    LessOrEqualTo { threshold: f64 },
    GreaterThan { threshold: f64 },
    GreaterOrEqualTo { threshold: f64 },
    /// `low <= value <= high`.
    InRange { low: f64, high: f64 },
    EqualTo { expected: Value },
    OneOf { values: Vec<Value> },
    AllOf { validators: Vec<Validator> },
    AnyOf { validators: Vec<Validator> },
    Not { validator: Box<Validator> },
    /// Always produces an informational result.
    Info { message: String },
}

impl Validator {
    pub fn less_than(threshold: f64) -> Self {
        Self::LessThan { threshold }
    }

    pub fn less_or_equal_to(threshold: f64) -> Self {
        Self::LessOrEqualTo { threshold }
    }

    pub fn greater_than(threshold: f64) -> Self {
        Self::GreaterThan { threshold }
    }

    pub fn greater_or_equal_to(threshold: f64) -> Self {
        Self::GreaterOrEqualTo { threshold }
    }

    pub fn in_range(low: f64, high: f64) -> Self {
        Self::InRange { low, high }
    }

    pub fn equal_to(expected: impl Into<Value>) -> Self {
        Self::EqualTo {
            expected: expected.into(),
        }
    }

    pub fn one_of(values: Vec<Value>) -> Self {
        Self::OneOf { values }
    }

    pub fn all_of(validators: Vec<Validator>) -> Self {
        Self::AllOf { validators }
    }

    pub fn any_of(validators: Vec<Validator>) -> Self {
        Self::AnyOf { validators }
    }

    pub fn negate(validator: Validator) -> Self {
        Self::Not {
            validator: Box::new(validator),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
        }
    }

    /// Fail when any threshold or bound, here or nested, is not finite.
    pub fn check_finite(&self) -> Result<(), MlgateError> {
        match self {
            Self::LessThan { threshold }
            | Self::LessOrEqualTo { threshold }
            | Self::GreaterThan { threshold }
            | Self::GreaterOrEqualTo { threshold } => check_finite("validator threshold", *threshold),
            Self::InRange { low, high } => {
                check_finite("range low bound", *low)?;
                check_finite("range high bound", *high)
            }
            Self::AllOf { validators } | Self::AnyOf { validators } => {
                validators.iter().try_for_each(Validator::check_finite)
            }
            Self::Not { validator } => validator.check_finite(),
            Self::EqualTo { .. } | Self::OneOf { .. } | Self::Info { .. } => Ok(()),
        }
    }

    /// The wire name of this validator's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LessThan { .. } => "less_than",
            Self::LessOrEqualTo { .. } => "less_or_equal_to",
            Self::GreaterThan { .. } => "greater_than",
            Self::GreaterOrEqualTo { .. } => "greater_or_equal_to",
            Self::InRange { .. } => "in_range",
            Self::EqualTo { .. } => "equal_to",
            Self::OneOf { .. } => "one_of",
            Self::AllOf { .. } => "all_of",
            Self::AnyOf { .. } => "any_of",
            Self::Not { .. } => "not",
            Self::Info { .. } => "info",
        }
    }

    /// Evaluate against a value. The result records this validator.
    pub fn validate(&self, value: &EvidenceValue) -> ValidationResult {
        self.evaluate(value).with_validator(self.clone())
    }

    fn evaluate(&self, value: &EvidenceValue) -> ValidationResult {
        match self {
            Self::LessThan { threshold } => {
                compare(value, "less than", *threshold, |v| v < *threshold)
            }
            Self::LessOrEqualTo { threshold } => {
                compare(value, "less than or equal to", *threshold, |v| v <= *threshold)
            }
            Self::GreaterThan { threshold } => {
                compare(value, "greater than", *threshold, |v| v > *threshold)
            }
            Self::GreaterOrEqualTo { threshold } => {
                compare(value, "greater than or equal to", *threshold, |v| {
                    v >= *threshold
                })
            }
            Self::InRange { low, high } => {
                let Some(numbers) = numbers(value) else {
                    return not_numeric(value);
                };
                if numbers.iter().all(|v| *low <= *v && *v <= *high) {
                    ValidationResult::success(format!("{value} is within [{low}, {high}]"))
                } else {
                    ValidationResult::failure(format!("{value} is outside [{low}, {high}]"))
                }
            }
            Self::EqualTo { expected } => {
                if values_equal(&value.to_json(), expected) {
                    ValidationResult::success(format!("{value} is equal to {expected}"))
                } else {
                    ValidationResult::failure(format!("{value} is not equal to {expected}"))
                }
            }
            Self::OneOf { values } => {
                let actual = value.to_json();
                let listed = Value::from(values.clone());
                if values.iter().any(|v| values_equal(&actual, v)) {
                    ValidationResult::success(format!("{value} is one of {listed}"))
                } else {
                    ValidationResult::failure(format!("{value} is not one of {listed}"))
                }
            }
            Self::AllOf { validators } => {
                let failures: Vec<String> = validators
                    .iter()
                    .map(|v| v.evaluate(value))
                    .filter(ValidationResult::is_failure)
                    .map(|r| r.message)
                    .collect();
                if failures.is_empty() {
                    ValidationResult::success(format!(
                        "{value} satisfies all {} conditions",
                        validators.len()
                    ))
                } else {
                    ValidationResult::failure(failures.join("; "))
                }
            }
            Self::AnyOf { validators } => {
                let results: Vec<ValidationResult> =
                    validators.iter().map(|v| v.evaluate(value)).collect();
                match results.iter().find(|r| r.is_success()) {
                    Some(hit) => ValidationResult::success(hit.message.clone()),
                    None if results.is_empty() => {
                        ValidationResult::failure("no conditions to satisfy".to_string())
                    }
                    None => ValidationResult::failure(
                        results
                            .into_iter()
                            .map(|r| r.message)
                            .collect::<Vec<_>>()
                            .join("; "),
                    ),
                }
            }
            Self::Not { validator } => {
                let inner = validator.evaluate(value);
                match inner.result_type {
                    ResultType::Success => {
                        ValidationResult::failure(format!("negated: {}", inner.message))
                    }
                    ResultType::Failure => {
                        ValidationResult::success(format!("negated: {}", inner.message))
                    }
                    ResultType::Info => inner,
                }
            }
            Self::Info { message } => ValidationResult::info(message.clone()),
        }
    }
}

fn numbers(value: &EvidenceValue) -> Option<Vec<f64>> {
    match value {
        EvidenceValue::Integer(i) => Some(vec![*i as f64]),
        EvidenceValue::Real(r) => Some(vec![*r]),
        EvidenceValue::Array(xs) => Some(xs.clone()),
        EvidenceValue::Text(_) | EvidenceValue::Opaque(_) => None,
    }
}

fn not_numeric(value: &EvidenceValue) -> ValidationResult {
    let kind = match value {
        EvidenceValue::Text(_) => "text",
        _ => "opaque",
    };
    ValidationResult::failure(format!("cannot compare a {kind} value numerically"))
}

fn compare(
    value: &EvidenceValue,
    relation: &str,
    threshold: f64,
    holds: impl Fn(f64) -> bool,
) -> ValidationResult {
    let Some(numbers) = numbers(value) else {
        return not_numeric(value);
    };
    if numbers.iter().all(|v| holds(*v)) {
        ValidationResult::success(format!("{value} is {relation} {threshold}"))
    } else {
        ValidationResult::failure(format!("{value} is not {relation} {threshold}"))
    }
}

// =============================================================================
// TESTS
// =============================================================================
