//! # Test Suite Validator
//!
//! Collects evidence for a test suite and turns it into `TestResults`.
//!
//! ## States
//!
//! ```text
//! Accumulating --validate() ok--> Validated (terminal)
//!      ^  |
//!      +--+ add_evidence / failed validate()
//! ```
//!
//! A `validate()` that fails because evidence is missing leaves the
//! validator accumulating, so the caller can supply the missing evidence and
//! try again.

use crate::model::Evidence;
use crate::validation::{TestResults, TestSuite};
use crate::MlgateError;
use indexmap::IndexMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorState {
    Accumulating,
    Validated,
}

/// Validates one test suite against evidence, once.
#[derive(Debug, Clone)]
pub struct TestSuiteValidator {
    test_suite: TestSuite,
    test_suite_id: String,
    evidence: IndexMap<String, Evidence>,
    state: ValidatorState,
}

impl TestSuiteValidator {
    /// Start validating `suite`, stored under the default suite identifier.
    pub fn new(suite: &TestSuite) -> Self {
        Self {
            test_suite: suite.clone(),
            test_suite_id: TestSuite::DEFAULT_ID.to_string(),
            evidence: IndexMap::new(),
            state: ValidatorState::Accumulating,
        }
    }

    /// Record the artifact identifier the suite is stored under.
    #[must_use]
    pub fn with_test_suite_id(mut self, id: impl Into<String>) -> Self {
        self.test_suite_id = id.into();
        self
    }

    pub fn state(&self) -> ValidatorState {
        self.state
    }

    pub fn test_suite(&self) -> &TestSuite {
        &self.test_suite
    }

    /// Add evidence for one test case.
    ///
    /// Fails with `Duplicate` when the test case already has evidence, and
    /// with `Validation` once the validator has produced results.
    pub fn add_evidence(&mut self, evidence: Evidence) -> Result<(), MlgateError> {
        if self.state == ValidatorState::Validated {
            return Err(MlgateError::Validation(
                "evidence cannot be added after validation".to_string(),
            ));
        }
        let id = evidence.metadata.test_case_id.clone();
        if self.evidence.contains_key(&id) {
            return Err(MlgateError::Duplicate(id));
        }
        if self.test_suite.test_case(&id).is_none() {
            debug!(test_case = %id, "evidence for a test case outside the suite");
        }
        self.evidence.insert(id, evidence);
        Ok(())
    }

    /// Add evidence in order. The first failure stops the loop; evidence
    /// added before it stays.
    pub fn add_evidence_list(
        &mut self,
        evidence: impl IntoIterator<Item = Evidence>,
    ) -> Result<(), MlgateError> {
        for item in evidence {
            self.add_evidence(item)?;
        }
        Ok(())
    }

    /// Test cases of the suite that have no evidence yet, in suite order.
    pub fn missing_evidence(&self) -> Vec<String> {
        self.test_suite
            .test_case_ids()
            .into_iter()
            .filter(|id| !self.evidence.contains_key(*id))
            .map(str::to_string)
            .collect()
    }

    /// Validate every test case and produce results.
    ///
    /// Fails on the first test case without evidence, naming it.
    pub fn validate(&mut self) -> Result<TestResults, MlgateError> {
        if self.state == ValidatorState::Validated {
            return Err(MlgateError::Validation(
                "test suite has already been validated".to_string(),
            ));
        }

        if let Some(missing) = self.missing_evidence().into_iter().next() {
            return Err(MlgateError::Validation(format!(
                "test case '{missing}' does not have evidence that can be validated"
            )));
        }

        let mut results = IndexMap::with_capacity(self.test_suite.test_cases().len());
        for case in self.test_suite.test_cases() {
            let evidence = self
                .evidence
                .get(&case.identifier)
                .ok_or_else(|| MlgateError::not_found("evidence", &case.identifier))?;
            results.insert(case.identifier.clone(), case.validate(evidence)?);
        }

        let test_results = TestResults::new(
            self.test_suite_id.clone(),
            Some(self.test_suite.clone()),
            results,
        )?;
        self.state = ValidatorState::Validated;
        debug!(
            test_suite = %self.test_suite_id,
            results = test_results.results().len(),
            "test suite validated"
        );
        Ok(test_results)
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
    use crate::validation::{ResultType, TestCase, Validator};

    fn suite() -> TestSuite {
        TestSuite::new(
            vec![],
            vec![
                TestCase::new("T1").with_validator(Validator::greater_than(0.9)),
                TestCase::new("T2").with_validator(Validator::less_than(100.0)),
            ],
        )
        .unwrap()
    }

    fn ev(id: &str, v: f64) -> Evidence {
        EvidenceValue::Real(v).with_metadata(EvidenceMetadata::new(id, "measure"))
    }

    #[test]
    fn duplicate_evidence_is_rejected() {
        let mut validator = TestSuiteValidator::new(&suite());
        validator.add_evidence(ev("T1", 0.95)).unwrap();
        let err = validator.add_evidence(ev("T1", 0.5)).unwrap_err();
        assert_eq!(err, MlgateError::Duplicate("T1".to_string()));
    }

    #[test]
    fn list_keeps_items_added_before_failure() {
        let mut validator = TestSuiteValidator::new(&suite());
        let err = validator
            .add_evidence_list(vec![ev("T1", 0.95), ev("T1", 0.1), ev("T2", 1.0)])
            .unwrap_err();
        assert!(matches!(err, MlgateError::Duplicate(_)));
        assert_eq!(validator.missing_evidence(), vec!["T2".to_string()]);
    }

    #[test]
    fn missing_evidence_fails_fast_naming_test_case() {
        let mut validator = TestSuiteValidator::new(&suite());
        validator.add_evidence(ev("T1", 0.95)).unwrap();
        let err = validator.validate().unwrap_err();
        assert!(matches!(err, MlgateError::Validation(_)));
        assert!(err.to_string().contains("T2"));
        assert_eq!(validator.state(), ValidatorState::Accumulating);
    }

    #[test]
    fn validated_is_terminal() {
        let mut validator = TestSuiteValidator::new(&suite()).with_test_suite_id("suite1");
        validator
            .add_evidence_list(vec![ev("T1", 0.95), ev("T2", 150.0)])
            .unwrap();
        let results = validator.validate().unwrap();
        assert_eq!(results.test_suite_id(), "suite1");
        assert_eq!(results.result("T1").unwrap().result_type, ResultType::Success);
        assert_eq!(results.result("T2").unwrap().result_type, ResultType::Failure);

        assert!(matches!(
            validator.validate(),
            Err(MlgateError::Validation(_))
        ));
        assert!(matches!(
            validator.add_evidence(ev("T3", 1.0)),
            Err(MlgateError::Validation(_))
        ));
    }
}
