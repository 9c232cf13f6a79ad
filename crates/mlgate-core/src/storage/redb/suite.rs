//! Test suites and test results <-> rows.
//!
//! A suite owns its `qa_category` and `test_case` rows. A results artifact
//! owns its `result` rows and, when the suite was embedded, a private
//! `test_suite` row graph with no artifact header.

use super::artifacts::find_header;
use super::evidence::{metadata_model, metadata_row};
use super::schema::{
    QA_CATEGORY, QaCategoryRow, RESULT, ResultRow, TEST_CASE, TEST_RESULTS, TEST_SUITE,
    TestCaseRow, TestResultsRow, TestSuiteRow,
};
use super::{RowSource, delete_row, delete_where, from_json, insert_row, to_json};
use crate::model::ArtifactType;
use crate::validation::{QaCategory, ResultType, TestCase, TestResults, TestSuite, ValidationResult};
use crate::MlgateError;
use indexmap::IndexMap;
use redb::WriteTransaction;

// =============================================================================
// TEST SUITE
// =============================================================================

fn insert_suite_graph(
    txn: &WriteTransaction,
    header_id: Option<u64>,
    suite: &TestSuite,
) -> Result<u64, MlgateError> {
    let suite_id = insert_row(txn, TEST_SUITE, &TestSuiteRow { header_id })?;

    let mut category_ids = Vec::with_capacity(suite.qa_categories().len());
    for category in suite.qa_categories() {
        let id = insert_row(
            txn,
            QA_CATEGORY,
            &QaCategoryRow {
                suite_id,
                name: category.name.clone(),
                description: category.description.clone(),
                rationale: category.rationale.clone(),
            },
        )?;
        category_ids.push((category.name.as_str(), id));
    }

    for case in suite.test_cases() {
        let qa_category_id = case.qa_category.as_deref().and_then(|name| {
            category_ids
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, id)| *id)
        });
        let validator = case.validator.as_ref().map(to_json).transpose()?;
        insert_row(
            txn,
            TEST_CASE,
            &TestCaseRow {
                suite_id,
                identifier: case.identifier.clone(),
                goal: case.goal.clone(),
                qa_category_id,
                quality_scenarios: case.quality_scenarios.clone(),
                measurement: case.measurement.clone(),
                validator,
            },
        )?;
    }

    Ok(suite_id)
}

fn load_suite_graph(src: &impl RowSource, suite_id: u64) -> Result<TestSuite, MlgateError> {
    let categories = src.scan_where::<QaCategoryRow>(QA_CATEGORY, |c| c.suite_id == suite_id)?;
    let cases = src.scan_where::<TestCaseRow>(TEST_CASE, |c| c.suite_id == suite_id)?;

    let mut test_cases = Vec::with_capacity(cases.len());
    for (_, row) in cases {
        let qa_category = row.qa_category_id.and_then(|id| {
            categories
                .iter()
                .find(|(cid, _)| *cid == id)
                .map(|(_, c)| c.name.clone())
        });
        test_cases.push(TestCase {
            identifier: row.identifier,
            goal: row.goal,
            qa_category,
            quality_scenarios: row.quality_scenarios,
            measurement: row.measurement,
            validator: row.validator.as_deref().map(from_json).transpose()?,
        });
    }

    let qa_categories = categories
        .into_iter()
        .map(|(_, c)| QaCategory {
            name: c.name,
            description: c.description,
            rationale: c.rationale,
        })
        .collect();

    TestSuite::new(qa_categories, test_cases)
}

fn delete_suite_graph(txn: &WriteTransaction, suite_id: u64) -> Result<(), MlgateError> {
    delete_where::<TestCaseRow>(txn, TEST_CASE, |c| c.suite_id == suite_id)?;
    delete_where::<QaCategoryRow>(txn, QA_CATEGORY, |c| c.suite_id == suite_id)?;
    delete_row(txn, TEST_SUITE, suite_id)
}

fn suite_id_for_header(src: &impl RowSource, header_id: u64) -> Result<u64, MlgateError> {
    src.scan_where::<TestSuiteRow>(TEST_SUITE, |s| s.header_id == Some(header_id))?
        .into_iter()
        .next()
        .map(|(id, _)| id)
        .ok_or_else(|| MlgateError::Backend(format!("artifact header {header_id} has no test suite")))
}

pub(crate) fn insert_suite(
    txn: &WriteTransaction,
    header_id: u64,
    suite: &TestSuite,
) -> Result<u64, MlgateError> {
    insert_suite_graph(txn, Some(header_id), suite)
}

pub(crate) fn load_suite(src: &impl RowSource, header_id: u64) -> Result<TestSuite, MlgateError> {
    load_suite_graph(src, suite_id_for_header(src, header_id)?)
}

pub(crate) fn delete_suite(txn: &WriteTransaction, header_id: u64) -> Result<(), MlgateError> {
    let suite_id = suite_id_for_header(txn, header_id)?;
    delete_suite_graph(txn, suite_id)
}

// =============================================================================
// TEST RESULTS
// =============================================================================

/// QA category row of a test case in the suite artifact stored under the
/// same version, if there is one.
fn stored_category_id(
    src: &impl RowSource,
    version_id: u64,
    test_suite_identifier: &str,
    test_case_id: &str,
) -> Result<Option<u64>, MlgateError> {
    let suite_type = ArtifactType::TestSuite.as_str();
    let Some((header_id, _)) = find_header(src, version_id, test_suite_identifier)?
        .filter(|(_, h)| h.artifact_type == suite_type)
    else {
        return Ok(None);
    };
    let suite_id = suite_id_for_header(src, header_id)?;
    Ok(src
        .scan_where::<TestCaseRow>(TEST_CASE, |c| {
            c.suite_id == suite_id && c.identifier == test_case_id
        })?
        .into_iter()
        .next()
        .and_then(|(_, c)| c.qa_category_id))
}

pub(crate) fn insert_results(
    txn: &WriteTransaction,
    header_id: u64,
    version_id: u64,
    results: &TestResults,
) -> Result<u64, MlgateError> {
    let embedded_suite_id = results
        .test_suite()
        .map(|suite| insert_suite_graph(txn, None, suite))
        .transpose()?;

    let results_id = insert_row(
        txn,
        TEST_RESULTS,
        &TestResultsRow {
            header_id,
            test_suite_identifier: results.test_suite_id().to_string(),
            embedded_suite_id,
        },
    )?;

    for (test_case_id, result) in results.results() {
        let qa_category_id =
            stored_category_id(txn, version_id, results.test_suite_id(), test_case_id)?;
        insert_row(
            txn,
            RESULT,
            &ResultRow {
                test_results_id: results_id,
                test_case_id: test_case_id.clone(),
                result_type: result.result_type.as_str().to_string(),
                message: result.message.clone(),
                evidence_metadata: result.evidence_metadata.as_ref().map(metadata_row),
                validator: result.validator.as_ref().map(to_json).transpose()?,
                qa_category_id,
            },
        )?;
    }

    Ok(results_id)
}

fn results_row(src: &impl RowSource, header_id: u64) -> Result<(u64, TestResultsRow), MlgateError> {
    src.scan_where::<TestResultsRow>(TEST_RESULTS, |r| r.header_id == header_id)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            MlgateError::Backend(format!("artifact header {header_id} has no test results"))
        })
}

fn parse_result_type(value: &str) -> Result<ResultType, MlgateError> {
    match value {
        "success" => Ok(ResultType::Success),
        "failure" => Ok(ResultType::Failure),
        "info" => Ok(ResultType::Info),
        other => Err(MlgateError::Serialization(format!(
            "unknown result type '{other}'"
        ))),
    }
}

pub(crate) fn load_results(src: &impl RowSource, header_id: u64) -> Result<TestResults, MlgateError> {
    let (results_id, row) = results_row(src, header_id)?;
    let suite = row
        .embedded_suite_id
        .map(|id| load_suite_graph(src, id))
        .transpose()?;

    let mut results = IndexMap::new();
    for (_, r) in src.scan_where::<ResultRow>(RESULT, |r| r.test_results_id == results_id)? {
        let result = ValidationResult {
            result_type: parse_result_type(&r.result_type)?,
            message: r.message,
            evidence_metadata: r.evidence_metadata.map(metadata_model),
            validator: r.validator.as_deref().map(from_json).transpose()?,
        };
        results.insert(r.test_case_id, result);
    }

    TestResults::new(row.test_suite_identifier, suite, results)
}

pub(crate) fn delete_results(txn: &WriteTransaction, header_id: u64) -> Result<(), MlgateError> {
    let (results_id, row) = results_row(txn, header_id)?;
    delete_where::<ResultRow>(txn, RESULT, |r| r.test_results_id == results_id)?;
    if let Some(suite_id) = row.embedded_suite_id {
        delete_suite_graph(txn, suite_id)?;
    }
    delete_row(txn, TEST_RESULTS, results_id)
}
