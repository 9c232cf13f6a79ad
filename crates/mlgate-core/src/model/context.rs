//! Containers of the artifact hierarchy: namespace -> model -> version.

use crate::query::Filterable;
use crate::types::check_identifier;
use crate::MlgateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize)]
struct ContainerRaw {
    identifier: String,
}

/// Top-level grouping of models.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ContainerRaw")]
pub struct Namespace {
    pub identifier: String,
}

/// A machine-learning model under governance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ContainerRaw")]
pub struct Model {
    pub identifier: String,
}

/// One version of a model; artifacts live here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ContainerRaw")]
pub struct Version {
    pub identifier: String,
}

impl Namespace {
    pub const KIND: &'static str = "namespace";

    pub fn new(identifier: impl Into<String>) -> Result<Self, MlgateError> {
        let identifier = identifier.into();
        check_identifier(Self::KIND, &identifier)?;
        Ok(Self { identifier })
    }
}

impl Model {
    pub const KIND: &'static str = "model";

    pub fn new(identifier: impl Into<String>) -> Result<Self, MlgateError> {
        let identifier = identifier.into();
        check_identifier(Self::KIND, &identifier)?;
        Ok(Self { identifier })
    }
}

impl Version {
    pub const KIND: &'static str = "version";

    pub fn new(identifier: impl Into<String>) -> Result<Self, MlgateError> {
        let identifier = identifier.into();
        check_identifier(Self::KIND, &identifier)?;
        Ok(Self { identifier })
    }
}

impl TryFrom<ContainerRaw> for Namespace {
    type Error = MlgateError;
    fn try_from(raw: ContainerRaw) -> Result<Self, Self::Error> {
        Self::new(raw.identifier)
    }
}

impl TryFrom<ContainerRaw> for Model {
    type Error = MlgateError;
    fn try_from(raw: ContainerRaw) -> Result<Self, Self::Error> {
        Self::new(raw.identifier)
    }
}

impl TryFrom<ContainerRaw> for Version {
    type Error = MlgateError;
    fn try_from(raw: ContainerRaw) -> Result<Self, Self::Error> {
        Self::new(raw.identifier)
    }
}

fn identifier_property(identifier: &str, name: &str) -> Option<Value> {
    (name == "identifier").then(|| Value::String(identifier.to_string()))
}

impl Filterable for Namespace {
    fn identifier(&self) -> String {
        self.identifier.clone()
    }
    fn item_type(&self) -> String {
        Self::KIND.to_string()
    }
    fn property(&self, name: &str) -> Option<Value> {
        identifier_property(&self.identifier, name)
    }
}

impl Filterable for Model {
    fn identifier(&self) -> String {
        self.identifier.clone()
    }
    fn item_type(&self) -> String {
        Self::KIND.to_string()
    }
    fn property(&self, name: &str) -> Option<Value> {
        identifier_property(&self.identifier, name)
    }
}

impl Filterable for Version {
    fn identifier(&self) -> String {
        self.identifier.clone()
    }
    fn item_type(&self) -> String {
        Self::KIND.to_string()
    }
    fn property(&self, name: &str) -> Option<Value> {
        identifier_property(&self.identifier, name)
    }
}

/// The full ancestor chain artifact operations act within.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    pub namespace: String,
    pub model: String,
    pub version: String,
}

impl Context {
    /// Build a context, validating each identifier.
    pub fn new(
        namespace: impl Into<String>,
        model: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, MlgateError> {
        let ctx = Self {
            namespace: namespace.into(),
            model: model.into(),
            version: version.into(),
        };
        check_identifier(Namespace::KIND, &ctx.namespace)?;
        check_identifier(Model::KIND, &ctx.model)?;
        check_identifier(Version::KIND, &ctx.version)?;
        Ok(ctx)
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.model, self.version)
    }
}
