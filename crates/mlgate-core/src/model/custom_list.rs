//! Custom lists: user-editable vocabularies (QA categories, quality
//! attributes) arranged as a parent/child hierarchy of lists.

use crate::query::{Filterable, serialized_property};
use crate::MlgateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The known lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomListName {
    QaCategories,
    QualityAttributes,
}

impl CustomListName {
    pub const ALL: [CustomListName; 2] = [Self::QaCategories, Self::QualityAttributes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QaCategories => "qa_categories",
            Self::QualityAttributes => "quality_attributes",
        }
    }

    /// The list whose entries this list's entries point at.
    pub fn parent(&self) -> Option<CustomListName> {
        match self {
            Self::QaCategories => None,
            Self::QualityAttributes => Some(Self::QaCategories),
        }
    }

    /// Lists whose parent is this list.
    pub fn children(&self) -> Vec<CustomListName> {
        Self::ALL
            .into_iter()
            .filter(|l| l.parent() == Some(*self))
            .collect()
    }
}

impl fmt::Display for CustomListName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomListName {
    type Err = MlgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| MlgateError::NotFound(format!("custom list '{s}'")))
    }
}

/// One entry of a custom list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomListEntry {
    pub name: String,
    pub description: String,
    /// Name of the entry in the parent list, for child lists.
    #[serde(default)]
    pub parent: Option<String>,
}

impl CustomListEntry {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parent: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

impl Filterable for CustomListEntry {
    fn identifier(&self) -> String {
        self.name.clone()
    }

    fn item_type(&self) -> String {
        "custom_list_entry".to_string()
    }

    fn property(&self, name: &str) -> Option<Value> {
        serialized_property(self, name)
    }
}
