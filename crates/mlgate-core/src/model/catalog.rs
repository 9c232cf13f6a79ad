//! Catalog entries: reusable measurement recipes shared between teams.

use crate::query::{Filterable, serialized_property};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity and bookkeeping of a catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntryHeader {
    pub identifier: String,
    pub creator: Option<String>,
    /// Unix seconds at creation.
    pub created: i64,
    /// Unix seconds at last edit.
    pub updated: i64,
    /// The catalog this entry was read from; stamped by catalog groups.
    pub catalog_id: String,
}

/// A catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    pub header: CatalogEntryHeader,
    pub tags: Vec<String>,
    pub qa_category: Option<String>,
    pub quality_attribute: Option<String>,
    pub code: String,
    pub description: Option<String>,
    pub inputs: Option<String>,
    pub output: Option<String>,
}

impl CatalogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(identifier: impl Into<String>, code: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            header: CatalogEntryHeader {
                identifier: identifier.into(),
                created: now,
                updated: now,
                ..CatalogEntryHeader::default()
            },
            code: code.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl Filterable for CatalogEntry {
    fn identifier(&self) -> String {
        self.header.identifier.clone()
    }

    fn item_type(&self) -> String {
        "catalog_entry".to_string()
    }

    fn property(&self, name: &str) -> Option<Value> {
        serialized_property(&self.header, name).or_else(|| serialized_property(self, name))
    }
}
