//! # Validation Flow Tests
//!
//! Evidence in, results out, through the public API only.

#![allow(clippy::unwrap_used, clippy::panic)]

use indexmap::IndexMap;
use mlgate_core::validation::{ResultSummary, ValidatorState};
use mlgate_core::{
    Evidence, EvidenceMetadata, EvidenceValue, MlgateError, ResultType, TestCase, TestResults,
    TestSuite, TestSuiteValidator, ValidationResult, Validator,
};
use serde_json::json;

fn evidence(test_case: &str, value: EvidenceValue) -> Evidence {
    value.with_metadata(EvidenceMetadata::new(test_case, "measurement").with_info("unit test"))
}

fn suite(ids: &[&str]) -> TestSuite {
    TestSuite::new(vec![], ids.iter().map(|id| TestCase::new(*id)).collect()).expect("suite")
}

// =============================================================================
// EVIDENCE COLLECTION
// =============================================================================

mod evidence_collection {
    use super::*;

    #[test]
    fn second_evidence_for_a_test_case_is_a_duplicate() {
        let mut validator = TestSuiteValidator::new(&suite(&["T1"]));
        validator
            .add_evidence(evidence("T1", EvidenceValue::Integer(1)))
            .expect("first");

        let err = validator
            .add_evidence(evidence("T1", EvidenceValue::Integer(2)))
            .unwrap_err();
        assert_eq!(err, MlgateError::Duplicate("T1".to_string()));
    }

    #[test]
    fn list_stops_at_first_duplicate_and_keeps_earlier_items() {
        let mut validator = TestSuiteValidator::new(&suite(&["A", "B", "C"]));
        let result = validator.add_evidence_list([
            evidence("A", EvidenceValue::Integer(1)),
            evidence("A", EvidenceValue::Integer(2)),
            evidence("B", EvidenceValue::Integer(3)),
        ]);
        assert!(matches!(result, Err(MlgateError::Duplicate(_))));
        assert_eq!(validator.missing_evidence(), vec!["B", "C"]);
    }

    #[test]
    fn evidence_outside_the_suite_is_accepted_and_ignored() {
        let mut validator = TestSuiteValidator::new(&suite(&["T1"]));
        validator
            .add_evidence(evidence("stray", EvidenceValue::Text("x".into())))
            .expect("stray evidence");
        validator
            .add_evidence(evidence("T1", EvidenceValue::Integer(1)))
            .expect("T1");

        let results = validator.validate().expect("validate");
        assert_eq!(results.results().len(), 1);
        assert!(results.result("stray").is_none());
    }
}

// =============================================================================
// VALIDATE
// =============================================================================

mod validate {
    use super::*;

    #[test]
    fn missing_evidence_names_the_first_gap() {
        let mut validator = TestSuiteValidator::new(&suite(&["T1", "T2"]));
        validator
            .add_evidence(evidence("T1", EvidenceValue::Real(0.5)))
            .expect("T1");

        let err = validator.validate().unwrap_err();
        match err {
            MlgateError::Validation(message) => assert!(message.contains("'T2'"), "{message}"),
            other => panic!("expected a validation error, got {other:?}"),
        }
        assert_eq!(validator.state(), ValidatorState::Accumulating);
    }

    #[test]
    fn gap_can_be_filled_after_a_failed_validate() {
        let mut validator = TestSuiteValidator::new(&suite(&["T1", "T2"]));
        validator
            .add_evidence(evidence("T1", EvidenceValue::Real(0.5)))
            .expect("T1");
        assert!(validator.validate().is_err());

        validator
            .add_evidence(evidence("T2", EvidenceValue::Real(0.7)))
            .expect("T2");
        let results = validator.validate().expect("validate");
        let keys: Vec<_> = results.results().keys().cloned().collect();
        assert_eq!(keys, vec!["T1", "T2"]);
        assert_eq!(validator.state(), ValidatorState::Validated);
    }

    #[test]
    fn validated_runs_are_closed() {
        let mut validator = TestSuiteValidator::new(&suite(&["T1"]));
        validator
            .add_evidence(evidence("T1", EvidenceValue::Integer(1)))
            .expect("T1");
        validator.validate().expect("validate");

        assert!(matches!(validator.validate(), Err(MlgateError::Validation(_))));
        assert!(matches!(
            validator.add_evidence(evidence("T2", EvidenceValue::Integer(1))),
            Err(MlgateError::Validation(_))
        ));
    }

    #[test]
    fn each_case_uses_its_own_validator() {
        let suite = TestSuite::new(
            vec![],
            vec![
                TestCase::new("accuracy").with_validator(Validator::in_range(0.9, 1.0)),
                TestCase::new("labels").with_validator(Validator::one_of(vec![
                    json!("cat"),
                    json!("dog"),
                ])),
                TestCase::new("drift").with_validator(Validator::negate(Validator::greater_than(
                    0.2,
                ))),
                TestCase::new("notes"),
            ],
        )
        .expect("suite");

        let mut validator = TestSuiteValidator::new(&suite);
        validator
            .add_evidence_list([
                evidence("accuracy", EvidenceValue::Real(0.9)),
                evidence("labels", EvidenceValue::Text("bird".into())),
                evidence("drift", EvidenceValue::Real(0.1)),
                evidence("notes", EvidenceValue::Text("looked fine".into())),
            ])
            .expect("evidence");
        let results = validator.validate().expect("validate");

        let types: Vec<ResultType> = results.results().values().map(|r| r.result_type).collect();
        assert_eq!(
            types,
            vec![
                ResultType::Success,
                ResultType::Failure,
                ResultType::Success,
                ResultType::Info
            ]
        );
        assert_eq!(
            results.summary(),
            ResultSummary {
                success: 2,
                failure: 1,
                info: 1
            }
        );
        assert!(!results.passed());

        let accuracy = results.result("accuracy").expect("accuracy result");
        assert_eq!(accuracy.validator, Some(Validator::in_range(0.9, 1.0)));
        assert_eq!(
            accuracy
                .evidence_metadata
                .as_ref()
                .and_then(|m| m.info.as_deref()),
            Some("unit test")
        );
    }
}

// =============================================================================
// TEST RESULTS INVARIANT
// =============================================================================

mod test_results {
    use super::*;

    fn results(ids: &[&str]) -> IndexMap<String, ValidationResult> {
        ids.iter()
            .map(|id| (id.to_string(), ValidationResult::success("ok")))
            .collect()
    }

    #[test]
    fn keys_must_be_exactly_the_suite_cases() {
        let ab = suite(&["A", "B"]);
        assert!(matches!(
            TestResults::new("s", Some(ab.clone()), results(&[])),
            Err(MlgateError::Validation(_))
        ));
        assert!(matches!(
            TestResults::new("s", Some(ab.clone()), results(&["A"])),
            Err(MlgateError::Validation(_))
        ));
        assert!(TestResults::new("s", Some(ab), results(&["A", "B"])).is_ok());
    }

    #[test]
    fn results_survive_json_with_their_suite() {
        let mut validator = TestSuiteValidator::new(&suite(&["A", "B"]));
        validator
            .add_evidence_list([
                evidence("B", EvidenceValue::Array(vec![1.0, 2.0])),
                evidence("A", EvidenceValue::Opaque(json!({"k": [1, 2]}))),
            ])
            .expect("evidence");
        let results = validator.validate().expect("validate");

        let text = serde_json::to_string(&results).expect("serialize");
        let back: TestResults = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back, results);
    }
}
