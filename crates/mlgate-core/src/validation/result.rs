//! The outcome of validating one piece of evidence.

use crate::model::EvidenceMetadata;
use crate::validation::Validator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Success, failure, or an informational note that passes no judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Success,
    Failure,
    Info,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validation outcome with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub message: String,
    /// Metadata of the evidence that was validated.
    #[serde(default)]
    pub evidence_metadata: Option<EvidenceMetadata>,
    /// The validator that produced this result.
    #[serde(default)]
    pub validator: Option<Validator>,
}

impl ValidationResult {
    pub fn new(result_type: ResultType, message: impl Into<String>) -> Self {
        Self {
            result_type,
            message: message.into(),
            evidence_metadata: None,
            validator: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ResultType::Success, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(ResultType::Failure, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ResultType::Info, message)
    }

    #[must_use]
    pub fn with_evidence_metadata(mut self, metadata: EvidenceMetadata) -> Self {
        self.evidence_metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn is_success(&self) -> bool {
        self.result_type == ResultType::Success
    }

    pub fn is_failure(&self) -> bool {
        self.result_type == ResultType::Failure
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.result_type, self.message)
    }
}
