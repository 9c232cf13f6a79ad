//! Table layout of the relational artifact store.
//!
//! Every row table maps a `u64` surrogate id to a postcard-encoded row.
//! Rows reference each other only through those ids. Ids come from one
//! counter in `METADATA`, so they increase in insertion order across every
//! table and scanning a table yields rows in the order they were written.

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

/// A row table: surrogate id -> postcard row bytes.
pub type RowTable = TableDefinition<'static, u64, &'static [u8]>;

/// Table for counters: key string -> value u64
pub const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Counter key for the next surrogate id.
pub const NEXT_ROW_ID: &str = "next_row_id";

// Hierarchy
pub const NAMESPACE: RowTable = TableDefinition::new("namespace");
pub const MODEL: RowTable = TableDefinition::new("model");
pub const VERSION: RowTable = TableDefinition::new("version");
pub const ARTIFACT_HEADER: RowTable = TableDefinition::new("artifact_header");

// Negotiation card
pub const NEGOTIATION_CARD: RowTable = TableDefinition::new("negotiation_card");
pub const NC_GOAL_DESCRIPTOR: RowTable = TableDefinition::new("nc_goal_descriptor");
pub const NC_METRIC_DESCRIPTOR: RowTable = TableDefinition::new("nc_metric_descriptor");
pub const NC_DATA_DESCRIPTOR: RowTable = TableDefinition::new("nc_data_descriptor");
pub const NC_LABEL_DESCRIPTOR: RowTable = TableDefinition::new("nc_label_descriptor");
pub const NC_FIELD_DESCRIPTOR: RowTable = TableDefinition::new("nc_field_descriptor");
pub const NC_MODEL_RESOURCE: RowTable = TableDefinition::new("nc_model_resource");
pub const NC_PROBLEM_TYPE: RowTable = TableDefinition::new("nc_problem_type");
pub const NC_DATA_CLASSIFICATION: RowTable = TableDefinition::new("nc_data_classification");

// Validation
pub const TEST_SUITE: RowTable = TableDefinition::new("test_suite");
pub const QA_CATEGORY: RowTable = TableDefinition::new("qa_category");
pub const TEST_CASE: RowTable = TableDefinition::new("test_case");
pub const TEST_RESULTS: RowTable = TableDefinition::new("test_results");
pub const RESULT: RowTable = TableDefinition::new("result");

// Evidence and reports
pub const EVIDENCE: RowTable = TableDefinition::new("evidence");
pub const REPORT: RowTable = TableDefinition::new("report");

// =============================================================================
// INDEXES
// =============================================================================

/// Secondary index: (parent id, name) -> row id. Namespaces use parent id 0,
/// artifact headers use their version id.
pub type NameIndex = TableDefinition<'static, (u64, &'static str), u64>;

pub const NAMESPACE_INDEX: NameIndex = TableDefinition::new("namespace_index");
pub const MODEL_INDEX: NameIndex = TableDefinition::new("model_index");
pub const VERSION_INDEX: NameIndex = TableDefinition::new("version_index");
pub const ARTIFACT_INDEX: NameIndex = TableDefinition::new("artifact_index");

/// Every index, created at open.
pub const INDEXES: [NameIndex; 4] = [NAMESPACE_INDEX, MODEL_INDEX, VERSION_INDEX, ARTIFACT_INDEX];

/// Every row table, created at open.
pub const ROW_TABLES: [RowTable; 20] = [
    NAMESPACE,
    MODEL,
    VERSION,
    ARTIFACT_HEADER,
    NEGOTIATION_CARD,
    NC_GOAL_DESCRIPTOR,
    NC_METRIC_DESCRIPTOR,
    NC_DATA_DESCRIPTOR,
    NC_LABEL_DESCRIPTOR,
    NC_FIELD_DESCRIPTOR,
    NC_MODEL_RESOURCE,
    NC_PROBLEM_TYPE,
    NC_DATA_CLASSIFICATION,
    TEST_SUITE,
    QA_CATEGORY,
    TEST_CASE,
    TEST_RESULTS,
    RESULT,
    EVIDENCE,
    REPORT,
];

// =============================================================================
// ROWS
// =============================================================================

/// Namespace, model and version rows. `parent_id` is 0 for namespaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRow {
    pub name: String,
    pub parent_id: u64,
}

/// Seeded reference rows (problem types, data classifications).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRow {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeaderRow {
    pub identifier: String,
    pub artifact_type: String,
    pub timestamp: i64,
    pub creator: Option<String>,
    pub version_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationCardRow {
    pub header_id: u64,
    pub problem_type_id: u64,
    pub task: Option<String>,
    pub usage_context: Option<String>,
    pub risks_fp: Option<String>,
    pub risks_fn: Option<String>,
    pub risks_other: Option<String>,
    pub dev_resources_id: u64,
    pub prod_resources_id: u64,
    pub integration: Option<String>,
    pub input_description: Option<String>,
    pub output_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRow {
    pub card_id: u64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub goal_id: u64,
    pub description: Option<String>,
    pub baseline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    pub card_id: u64,
    pub description: Option<String>,
    pub source: Option<String>,
    pub classification_id: u64,
    pub access: Option<String>,
    pub rights: Option<String>,
    pub policies: Option<String>,
    pub identifiable_information: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRow {
    pub data_id: u64,
    pub description: Option<String>,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRow {
    pub data_id: u64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub field_type: Option<String>,
    pub expected_values: Option<String>,
    pub missing_values: Option<String>,
    pub special_values: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResourceRow {
    pub cpu: Option<String>,
    pub gpu: Option<String>,
    pub memory: Option<String>,
    pub storage: Option<String>,
}

/// A test suite. `header_id` is `None` for a copy embedded in test results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuiteRow {
    pub header_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaCategoryRow {
    pub suite_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseRow {
    pub suite_id: u64,
    pub identifier: String,
    pub goal: Option<String>,
    pub qa_category_id: Option<u64>,
    pub quality_scenarios: Vec<String>,
    pub measurement: Option<String>,
    /// The validator as a JSON document.
    pub validator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResultsRow {
    pub header_id: u64,
    pub test_suite_identifier: String,
    pub embedded_suite_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMetadataRow {
    pub test_case_id: String,
    pub measurement_type: String,
    pub info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub test_results_id: u64,
    pub test_case_id: String,
    pub result_type: String,
    pub message: String,
    pub evidence_metadata: Option<EvidenceMetadataRow>,
    /// The validator as a JSON document.
    pub validator: Option<String>,
    /// QA category of the test case in the stored suite this answers.
    pub qa_category_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRow {
    pub header_id: u64,
    pub metadata: EvidenceMetadataRow,
    /// The tagged value as a JSON document.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub header_id: u64,
    pub summary: Option<String>,
    pub test_results_id: Option<String>,
    pub comments: Vec<String>,
}
