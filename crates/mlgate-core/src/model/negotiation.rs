//! # Negotiation Card
//!
//! The agreement between model developers and system stakeholders: what the
//! system is for, the data it uses and the resources the model needs.
//!
//! Every descriptor field is optional and every struct has a `Default`, so a
//! card can be filled in incrementally and an empty card round-trips.

use crate::MlgateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// REFERENCE TYPES
// =============================================================================

/// The kind of problem the system solves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    #[default]
    Classification,
    Clustering,
    Trend,
    Alert,
    Forecasting,
    ContentGeneration,
    Benchmarking,
    Goals,
    Detection,
    Other,
}

impl ProblemType {
    pub const ALL: [ProblemType; 10] = [
        Self::Classification,
        Self::Clustering,
        Self::Trend,
        Self::Alert,
        Self::Forecasting,
        Self::ContentGeneration,
        Self::Benchmarking,
        Self::Goals,
        Self::Detection,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Clustering => "clustering",
            Self::Trend => "trend",
            Self::Alert => "alert",
            Self::Forecasting => "forecasting",
            Self::ContentGeneration => "content_generation",
            Self::Benchmarking => "benchmarking",
            Self::Goals => "goals",
            Self::Detection => "detection",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemType {
    type Err = MlgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MlgateError::Validation(format!("unknown problem type '{s}'")))
    }
}

/// Sensitivity classification of a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClassification {
    #[default]
    Unclassified,
    Cui,
    Pii,
    Phi,
    Other,
}

impl DataClassification {
    pub const ALL: [DataClassification; 5] = [
        Self::Unclassified,
        Self::Cui,
        Self::Pii,
        Self::Phi,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Cui => "cui",
            Self::Pii => "pii",
            Self::Phi => "phi",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DataClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataClassification {
    type Err = MlgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MlgateError::Validation(format!("unknown data classification '{s}'")))
    }
}

// =============================================================================
// SYSTEM
// =============================================================================

/// A measurable indicator of a goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricDescriptor {
    pub description: Option<String>,
    pub baseline: Option<String>,
}

/// A system goal and the metrics that track it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalDescriptor {
    pub description: Option<String>,
    pub metrics: Vec<MetricDescriptor>,
}

/// Consequences of the model's errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskDescriptor {
    /// Risk of a false positive.
    pub fp: Option<String>,
    /// Risk of a false negative.
    #[serde(rename = "fn")]
    pub fn_: Option<String>,
    pub other: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemDescriptor {
    pub goals: Vec<GoalDescriptor>,
    pub problem_type: ProblemType,
    pub task: Option<String>,
    pub usage_context: Option<String>,
    pub risks: RiskDescriptor,
}

// =============================================================================
// DATA
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelDescriptor {
    pub description: Option<String>,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDescriptor {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub expected_values: Option<String>,
    pub missing_values: Option<String>,
    pub special_values: Option<String>,
}

/// A dataset used to build or evaluate the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataDescriptor {
    pub description: Option<String>,
    pub source: Option<String>,
    pub classification: DataClassification,
    pub access: Option<String>,
    pub labels: Vec<LabelDescriptor>,
    pub fields: Vec<FieldDescriptor>,
    pub rights: Option<String>,
    pub policies: Option<String>,
    pub identifiable_information: Option<String>,
}

// =============================================================================
// MODEL
// =============================================================================

/// Compute resources for one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelResourcesDescriptor {
    pub cpu: Option<String>,
    pub gpu: Option<String>,
    pub memory: Option<String>,
    pub storage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDescriptor {
    pub development_compute_resources: ModelResourcesDescriptor,
    pub production_compute_resources: ModelResourcesDescriptor,
    pub integration: Option<String>,
    pub input_description: Option<String>,
    pub output_description: Option<String>,
}

// =============================================================================
// CARD
// =============================================================================

/// System, data and model requirements agreed for one model version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationCard {
    pub system: SystemDescriptor,
    pub data: Vec<DataDescriptor>,
    pub model: ModelDescriptor,
}

impl NegotiationCard {
    /// Default artifact identifier for a card.
    pub const DEFAULT_ID: &'static str = "default.negotiation_card";
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn reference_types_use_snake_case() {
        assert_eq!(
            serde_json::to_string(&ProblemType::ContentGeneration).unwrap(),
            "\"content_generation\""
        );
        for t in ProblemType::ALL {
            assert_eq!(t.as_str().parse::<ProblemType>().unwrap(), t);
        }
        for c in DataClassification::ALL {
            assert_eq!(c.as_str().parse::<DataClassification>().unwrap(), c);
        }
    }

    #[test]
    fn empty_card_deserializes_from_empty_object() {
        let card: NegotiationCard = serde_json::from_str("{}").unwrap();
        assert_eq!(card, NegotiationCard::default());
    }

    #[test]
    fn risk_fields_use_short_names() {
        let risks = RiskDescriptor {
            fp: Some("fp".to_string()),
            fn_: Some("fn".to_string()),
            other: None,
        };
        let json = serde_json::to_value(&risks).unwrap();
        assert_eq!(json["fn"], "fn");
    }
}
