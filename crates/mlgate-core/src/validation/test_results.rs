//! # Test Results
//!
//! The outcome of validating a test suite: one result per test case.
//!
//! When the suite is embedded, the result keys must be exactly the suite's
//! test-case identifiers. The check runs on construction and again on
//! deserialization, so a stored `TestResults` can always be replayed against
//! the suite it claims to answer.

use crate::validation::{ResultType, TestSuite, ValidationResult, Validator};
use crate::MlgateError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Deserialize)]
struct RawTestResults {
    #[serde(default)]
    test_suite_id: String,
    #[serde(default)]
    test_suite: Option<TestSuite>,
    #[serde(default)]
    results: IndexMap<String, ValidationResult>,
}

impl TryFrom<RawTestResults> for TestResults {
    type Error = MlgateError;

    fn try_from(raw: RawTestResults) -> Result<Self, Self::Error> {
        TestResults::new(raw.test_suite_id, raw.test_suite, raw.results)
    }
}

/// Per-test-case results of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTestResults")]
pub struct TestResults {
    test_suite_id: String,
    test_suite: Option<TestSuite>,
    results: IndexMap<String, ValidationResult>,
}

/// Result counts by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub success: usize,
    pub failure: usize,
    pub info: usize,
}

impl TestResults {
    /// Default artifact identifier for results.
    pub const DEFAULT_ID: &'static str = "default.test_results";

    /// Build results, checking coverage against the suite when one is given.
    ///
    /// With a suite, results are reordered to the suite's test-case order.
    pub fn new(
        test_suite_id: impl Into<String>,
        test_suite: Option<TestSuite>,
        results: IndexMap<String, ValidationResult>,
    ) -> Result<Self, MlgateError> {
        let results = match &test_suite {
            Some(suite) => {
                check_coverage(suite, &results)?;
                let mut results = results;
                let mut ordered = IndexMap::with_capacity(results.len());
                for id in suite.test_case_ids() {
                    if let Some(result) = results.shift_remove(id) {
                        ordered.insert(id.to_string(), result);
                    }
                }
                ordered
            }
            None => results,
        };
        Ok(Self {
            test_suite_id: test_suite_id.into(),
            test_suite,
            results,
        })
    }

    pub fn test_suite_id(&self) -> &str {
        &self.test_suite_id
    }

    pub fn test_suite(&self) -> Option<&TestSuite> {
        self.test_suite.as_ref()
    }

    pub fn results(&self) -> &IndexMap<String, ValidationResult> {
        &self.results
    }

    pub fn result(&self, test_case_id: &str) -> Option<&ValidationResult> {
        self.results.get(test_case_id)
    }

    /// Fail when a recorded validator carries a non-finite bound.
    pub fn check_finite(&self) -> Result<(), MlgateError> {
        self.results
            .values()
            .filter_map(|r| r.validator.as_ref())
            .try_for_each(Validator::check_finite)
    }

    /// Count results by type.
    pub fn summary(&self) -> ResultSummary {
        let mut summary = ResultSummary::default();
        for result in self.results.values() {
            match result.result_type {
                ResultType::Success => summary.success += 1,
                ResultType::Failure => summary.failure += 1,
                ResultType::Info => summary.info += 1,
            }
        }
        summary
    }

    /// True when no result is a failure.
    pub fn passed(&self) -> bool {
        self.summary().failure == 0
    }
}

fn check_coverage(
    suite: &TestSuite,
    results: &IndexMap<String, ValidationResult>,
) -> Result<(), MlgateError> {
    let expected = suite.test_case_id_set();
    let actual: BTreeSet<&str> = results.keys().map(String::as_str).collect();
    if expected == actual {
        return Ok(());
    }
    let missing: Vec<&str> = expected.difference(&actual).copied().collect();
    let extra: Vec<&str> = actual.difference(&expected).copied().collect();
    Err(MlgateError::Validation(format!(
        "test results do not match the test suite (missing: {missing:?}, unexpected: {extra:?})"
    )))
}

// =============================================================================
// TESTS
// =============================================================================
