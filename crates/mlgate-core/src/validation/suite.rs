//! # Test Suites
//!
//! The declared conditions a model version must meet: QA categories and the
//! test cases under them.
//!
//! ## Invariants
//!
//! - Test-case identifiers are unique within a suite
//! - QA-category names are unique within a suite
//! - A test case's `qa_category`, when set, names a declared category
//!
//! Both the constructor and deserialization enforce these.

use crate::model::Evidence;
use crate::validation::{ValidationResult, Validator};
use crate::MlgateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// QA CATEGORY
// =============================================================================

/// A quality-attribute category (fairness, robustness, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

impl QaCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            rationale: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

// =============================================================================
// TEST CASE
// =============================================================================

/// One named condition and how to measure it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub identifier: String,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub qa_category: Option<String>,
    #[serde(default)]
    pub quality_scenarios: Vec<String>,
    /// Description of the measurement that produces the evidence.
    #[serde(default)]
    pub measurement: Option<String>,
    #[serde(default)]
    pub validator: Option<Validator>,
}

impl TestCase {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            goal: None,
            qa_category: None,
            quality_scenarios: Vec::new(),
            measurement: None,
            validator: None,
        }
    }

    #[must_use]
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    #[must_use]
    pub fn with_qa_category(mut self, category: impl Into<String>) -> Self {
        self.qa_category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_quality_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.quality_scenarios.push(scenario.into());
        self
    }

    #[must_use]
    pub fn with_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = Some(measurement.into());
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Validate evidence produced for this test case.
    ///
    /// A test case without a validator yields an informational result.
    pub fn validate(&self, evidence: &Evidence) -> Result<ValidationResult, MlgateError> {
        if evidence.metadata.test_case_id != self.identifier {
            return Err(MlgateError::Validation(format!(
                "evidence for '{}' cannot validate test case '{}'",
                evidence.metadata.test_case_id, self.identifier
            )));
        }
        let result = match &self.validator {
            Some(validator) => validator.validate(&evidence.value),
            None => ValidationResult::info(format!(
                "test case '{}' has no validator; value was {}",
                self.identifier, evidence.value
            )),
        };
        Ok(result.with_evidence_metadata(evidence.metadata.clone()))
    }
}

// =============================================================================
// TEST SUITE
// =============================================================================

#[derive(Deserialize)]
struct RawTestSuite {
    #[serde(default)]
    qa_categories: Vec<QaCategory>,
    #[serde(default)]
    test_cases: Vec<TestCase>,
}

impl TryFrom<RawTestSuite> for TestSuite {
    type Error = MlgateError;

    fn try_from(raw: RawTestSuite) -> Result<Self, Self::Error> {
        TestSuite::new(raw.qa_categories, raw.test_cases)
    }
}

/// QA categories plus ordered, uniquely named test cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTestSuite")]
pub struct TestSuite {
    qa_categories: Vec<QaCategory>,
    test_cases: Vec<TestCase>,
}

impl TestSuite {
    /// Default artifact identifier for a suite.
    pub const DEFAULT_ID: &'static str = "default.test_suite";

    /// Build a suite, checking every invariant.
    pub fn new(
        qa_categories: Vec<QaCategory>,
        test_cases: Vec<TestCase>,
    ) -> Result<Self, MlgateError> {
        let mut suite = Self::default();
        for category in qa_categories {
            suite.add_qa_category(category)?;
        }
        for case in test_cases {
            suite.add_test_case(case)?;
        }
        Ok(suite)
    }

    /// Declare a QA category. Fails on a duplicate name.
    pub fn add_qa_category(&mut self, category: QaCategory) -> Result<(), MlgateError> {
        if self.qa_category(&category.name).is_some() {
            return Err(MlgateError::Validation(format!(
                "duplicate QA category '{}'",
                category.name
            )));
        }
        self.qa_categories.push(category);
        Ok(())
    }

    /// Append a test case. Fails on a duplicate identifier or an
    /// undeclared QA category.
    pub fn add_test_case(&mut self, case: TestCase) -> Result<(), MlgateError> {
        if case.identifier.trim().is_empty() {
            return Err(MlgateError::Validation(
                "test case identifier must not be empty".to_string(),
            ));
        }
        if let Some(validator) = &case.validator {
            validator.check_finite()?;
        }
        if self.test_case(&case.identifier).is_some() {
            return Err(MlgateError::Validation(format!(
                "duplicate test case '{}'",
                case.identifier
            )));
        }
        if let Some(category) = &case.qa_category
            && self.qa_category(category).is_none()
        {
            return Err(MlgateError::Validation(format!(
                "test case '{}' references undeclared QA category '{category}'",
                case.identifier
            )));
        }
        self.test_cases.push(case);
        Ok(())
    }

    /// Builder form of [`TestSuite::add_qa_category`].
    pub fn with_qa_category(mut self, category: QaCategory) -> Result<Self, MlgateError> {
        self.add_qa_category(category)?;
        Ok(self)
    }

    /// Builder form of [`TestSuite::add_test_case`].
    pub fn with_test_case(mut self, case: TestCase) -> Result<Self, MlgateError> {
        self.add_test_case(case)?;
        Ok(self)
    }

    pub fn qa_categories(&self) -> &[QaCategory] {
        &self.qa_categories
    }

    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    pub fn qa_category(&self, name: &str) -> Option<&QaCategory> {
        self.qa_categories.iter().find(|c| c.name == name)
    }

    pub fn test_case(&self, identifier: &str) -> Option<&TestCase> {
        self.test_cases.iter().find(|c| c.identifier == identifier)
    }

    /// Test-case identifiers in declaration order.
    pub fn test_case_ids(&self) -> Vec<&str> {
        self.test_cases.iter().map(|c| c.identifier.as_str()).collect()
    }

    /// Test-case identifiers as a set.
    pub fn test_case_id_set(&self) -> BTreeSet<&str> {
        self.test_cases.iter().map(|c| c.identifier.as_str()).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::model::{EvidenceMetadata, EvidenceValue};
    use crate::validation::ResultType;

    fn suite() -> TestSuite {
        TestSuite::new(
            vec![QaCategory::new("accuracy").with_rationale("users rely on it")],
            vec![
                TestCase::new("T1")
                    .with_qa_category("accuracy")
                    .with_validator(Validator::greater_than(0.9)),
                TestCase::new("T2"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn ids_are_ordered() {
        assert_eq!(suite().test_case_ids(), vec!["T1", "T2"]);
    }

    #[test]
    fn rejects_duplicate_test_case() {
        let err = suite().with_test_case(TestCase::new("T1")).unwrap_err();
        assert!(matches!(err, MlgateError::Validation(_)));
    }

    #[test]
    fn rejects_duplicate_category() {
        let err = suite()
            .with_qa_category(QaCategory::new("accuracy"))
            .unwrap_err();
        assert!(matches!(err, MlgateError::Validation(_)));
    }

    #[test]
    fn rejects_undeclared_category() {
        let err = suite()
            .with_test_case(TestCase::new("T3").with_qa_category("fairness"))
            .unwrap_err();
        assert!(err.to_string().contains("fairness"));
    }

    #[test]
    fn deserialization_checks_invariants() {
        let json = serde_json::json!({
            "qa_categories": [],
            "test_cases": [{"identifier": "A"}, {"identifier": "A"}]
        });
        assert!(serde_json::from_value::<TestSuite>(json).is_err());

        let ok = serde_json::to_value(suite()).unwrap();
        assert_eq!(serde_json::from_value::<TestSuite>(ok).unwrap(), suite());
    }

    #[test]
    fn test_case_validation() {
        let s = suite();
        let ev = EvidenceValue::Real(0.95).with_metadata(EvidenceMetadata::new("T1", "accuracy"));
        let r = s.test_case("T1").unwrap().validate(&ev).unwrap();
        assert_eq!(r.result_type, ResultType::Success);
        assert_eq!(r.evidence_metadata.unwrap().test_case_id, "T1");

        let no_validator = s.test_case("T2").unwrap();
        let ev2 = EvidenceValue::Integer(1).with_metadata(EvidenceMetadata::new("T2", "count"));
        assert_eq!(
            no_validator.validate(&ev2).unwrap().result_type,
            ResultType::Info
        );

        assert!(no_validator.validate(&ev).is_err());
    }
}
