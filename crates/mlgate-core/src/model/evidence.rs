//! # Evidence
//!
//! A measured value tagged with the test case it was produced for.

use crate::types::check_finite;
use crate::MlgateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a piece of evidence came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceMetadata {
    /// The test case this evidence answers.
    pub test_case_id: String,
    /// The measurement that produced the value.
    pub measurement_type: String,
    /// Free-form provenance (function name, command line, ...).
    #[serde(default)]
    pub info: Option<String>,
}

impl EvidenceMetadata {
    pub fn new(test_case_id: impl Into<String>, measurement_type: impl Into<String>) -> Self {
        Self {
            test_case_id: test_case_id.into(),
            measurement_type: measurement_type.into(),
            info: None,
        }
    }

    #[must_use]
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }
}

/// A measured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "value_type", content = "value", rename_all = "snake_case")]
pub enum EvidenceValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Array(Vec<f64>),
    /// Any JSON document (confusion matrices, images metadata, ...).
    Opaque(Value),
}

impl EvidenceValue {
    /// Attach metadata, producing evidence.
    pub fn with_metadata(self, metadata: EvidenceMetadata) -> Evidence {
        Evidence {
            metadata,
            value: self,
        }
    }

    /// The value as a number, for integer and real values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Fail on NaN or infinite reals, which no backend can store.
    pub fn check_finite(&self) -> Result<(), MlgateError> {
        match self {
            Self::Real(r) => check_finite("evidence value", *r),
            Self::Array(xs) => xs
                .iter()
                .try_for_each(|x| check_finite("evidence array element", *x)),
            Self::Integer(_) | Self::Text(_) | Self::Opaque(_) => Ok(()),
        }
    }

    /// The value as plain JSON, without its type tag.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(i) => Value::from(*i),
            Self::Real(r) => Value::from(*r),
            Self::Text(s) => Value::String(s.clone()),
            Self::Array(xs) => Value::from(xs.clone()),
            Self::Opaque(v) => v.clone(),
        }
    }
}

impl std::fmt::Display for EvidenceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// A value plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub metadata: EvidenceMetadata,
    pub value: EvidenceValue,
}

impl Evidence {
    /// Default artifact identifier: `evidence.<test_case_id>`.
    pub fn default_identifier(&self) -> String {
        format!("evidence.{}", self.metadata.test_case_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_finite_reals_are_rejected() {
        assert!(EvidenceValue::Real(0.5).check_finite().is_ok());
        assert!(EvidenceValue::Real(f64::NAN).check_finite().is_err());
        assert!(EvidenceValue::Array(vec![1.0, f64::NEG_INFINITY]).check_finite().is_err());
        assert!(EvidenceValue::Text("nan".into()).check_finite().is_ok());
    }

    #[test]
    fn value_is_adjacently_tagged() {
        let ev = EvidenceValue::Real(0.93).with_metadata(EvidenceMetadata::new("T1", "accuracy"));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["value"], json!({"value_type": "real", "value": 0.93}));
        let back: Evidence = serde_json::from_value(json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn default_identifier_uses_test_case() {
        let ev = EvidenceValue::Integer(3).with_metadata(EvidenceMetadata::new("T2", "count"));
        assert_eq!(ev.default_identifier(), "evidence.T2");
    }

    #[test]
    fn numeric_view() {
        assert_eq!(EvidenceValue::Integer(4).as_f64(), Some(4.0));
        assert_eq!(EvidenceValue::Text("x".into()).as_f64(), None);
        assert_eq!(EvidenceValue::Text("x".into()).to_string(), "x");
        assert_eq!(EvidenceValue::Array(vec![1.0, 2.5]).to_string(), "[1.0,2.5]");
    }
}
