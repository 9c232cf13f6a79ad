use serde::{Deserialize, Serialize};

/// A human-facing summary of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub summary: Option<String>,
    /// Identifier of the test results artifact this report describes.
    pub test_results_id: Option<String>,
    pub comments: Vec<String>,
}

impl Report {
    /// Default artifact identifier for a report.
    pub const DEFAULT_ID: &'static str = "default.report";
}
