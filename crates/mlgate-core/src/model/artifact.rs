//! # Artifacts
//!
//! The unit of persistence in an artifact store: a header carrying identity
//! and type, plus a typed body.
//!
//! ## Wire Layout
//!
//! ```json
//! {
//!   "header": {"identifier": "card1", "type": "negotiation_card",
//!              "timestamp": 1700000000, "creator": null},
//!   "body": {"artifact_type": "negotiation_card", ...}
//! }
//! ```
//!
//! The header `type` and the body `artifact_type` must agree; construction
//! and deserialization both reject a mismatch.

use crate::model::{Evidence, NegotiationCard, Report};
use crate::query::{Filterable, serialized_property};
use crate::types::{check_finite, check_identifier};
use crate::validation::{TestResults, TestSuite};
use crate::MlgateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ARTIFACT TYPE
// =============================================================================

/// The closed set of artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    NegotiationCard,
    TestSuite,
    Evidence,
    TestResults,
    Report,
}

impl ArtifactType {
    /// Every artifact type, in declaration order.
    pub const ALL: [ArtifactType; 5] = [
        Self::NegotiationCard,
        Self::TestSuite,
        Self::Evidence,
        Self::TestResults,
        Self::Report,
    ];

    /// The wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NegotiationCard => "negotiation_card",
            Self::TestSuite => "test_suite",
            Self::Evidence => "evidence",
            Self::TestResults => "test_results",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = MlgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MlgateError::Validation(format!("unknown artifact type '{s}'")))
    }
}

// =============================================================================
// HEADER / BODY
// =============================================================================

/// Identity and provenance of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Unique key within its version.
    pub identifier: String,
    /// The body's type.
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    /// Unix seconds at creation.
    pub timestamp: i64,
    /// Who wrote the artifact, if known.
    #[serde(default)]
    pub creator: Option<String>,
}

impl ArtifactHeader {
    /// A header stamped with the current time.
    pub fn new(identifier: impl Into<String>, artifact_type: ArtifactType) -> Self {
        Self {
            identifier: identifier.into(),
            artifact_type,
            timestamp: chrono::Utc::now().timestamp(),
            creator: None,
        }
    }
}

/// The typed payload of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "artifact_type", rename_all = "snake_case")]
pub enum ArtifactBody {
    NegotiationCard(NegotiationCard),
    TestSuite(TestSuite),
    Evidence(Evidence),
    TestResults(TestResults),
    Report(Report),
}

impl ArtifactBody {
    /// Fail on any NaN or infinite number, which JSON cannot carry.
    pub fn check_finite(&self) -> Result<(), MlgateError> {
        match self {
            Self::NegotiationCard(card) => card
                .data
                .iter()
                .flat_map(|d| &d.labels)
                .filter_map(|l| l.percentage)
                .try_for_each(|p| check_finite("label percentage", p)),
            // Suites check their validators as test cases are added.
            Self::TestSuite(_) => Ok(()),
            Self::Evidence(evidence) => evidence.value.check_finite(),
            Self::TestResults(results) => results.check_finite(),
            Self::Report(_) => Ok(()),
        }
    }

    /// The type tag of this body.
    pub fn artifact_type(&self) -> ArtifactType {
        match self {
            Self::NegotiationCard(_) => ArtifactType::NegotiationCard,
            Self::TestSuite(_) => ArtifactType::TestSuite,
            Self::Evidence(_) => ArtifactType::Evidence,
            Self::TestResults(_) => ArtifactType::TestResults,
            Self::Report(_) => ArtifactType::Report,
        }
    }
}

// =============================================================================
// ARTIFACT
// =============================================================================

#[derive(Deserialize)]
struct RawArtifact {
    header: ArtifactHeader,
    body: ArtifactBody,
}

impl TryFrom<RawArtifact> for Artifact {
    type Error = MlgateError;

    fn try_from(raw: RawArtifact) -> Result<Self, Self::Error> {
        Artifact::new(raw.header, raw.body)
    }
}

/// A header and a body whose types agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawArtifact")]
pub struct Artifact {
    header: ArtifactHeader,
    body: ArtifactBody,
}

impl Artifact {
    /// Pair a header with a body.
    ///
    /// Fails when the header type does not match the body, when the
    /// identifier cannot be used as a store key, or when the body holds a
    /// number no backend could read back.
    pub fn new(header: ArtifactHeader, body: ArtifactBody) -> Result<Self, MlgateError> {
        check_identifier("artifact", &header.identifier)?;
        body.check_finite()?;
        if header.artifact_type != body.artifact_type() {
            return Err(MlgateError::Validation(format!(
                "artifact '{}' header type '{}' does not match body type '{}'",
                header.identifier,
                header.artifact_type,
                body.artifact_type()
            )));
        }
        Ok(Self { header, body })
    }

    /// Build an artifact with a fresh header derived from the body.
    pub fn from_body(
        identifier: impl Into<String>,
        body: ArtifactBody,
    ) -> Result<Self, MlgateError> {
        let header = ArtifactHeader::new(identifier, body.artifact_type());
        Self::new(header, body)
    }

    /// Set the creator recorded in the header.
    #[must_use]
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.header.creator = Some(creator.into());
        self
    }

    pub fn identifier(&self) -> &str {
        &self.header.identifier
    }

    pub fn artifact_type(&self) -> ArtifactType {
        self.header.artifact_type
    }

    pub fn header(&self) -> &ArtifactHeader {
        &self.header
    }

    pub fn body(&self) -> &ArtifactBody {
        &self.body
    }

    /// Split into header and body.
    pub fn into_parts(self) -> (ArtifactHeader, ArtifactBody) {
        (self.header, self.body)
    }
}

impl Filterable for Artifact {
    fn identifier(&self) -> String {
        self.header.identifier.clone()
    }

    fn item_type(&self) -> String {
        self.header.artifact_type.as_str().to_string()
    }

    /// Header fields first, then top-level body fields.
    fn property(&self, name: &str) -> Option<Value> {
        serialized_property(&self.header, name).or_else(|| serialized_property(&self.body, name))
    }
}

// =============================================================================
// TESTS
// =============================================================================
