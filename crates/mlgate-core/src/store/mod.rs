//! # Stores
//!
//! The resource-mapper contract and the stores built on it.
//!
//! Every backend implements [`ResourceMapper`] identically, so a caller can
//! switch between `memory://`, `fs://`, `rdbs+redb://` and `http(s)://`
//! without observing any difference beyond latency and durability.
//!
//! | Store | Session | Mappers |
//! |-------|---------|---------|
//! | [`ArtifactStore`] | [`ArtifactSession`] | namespace, model, version, artifact |
//! | [`CatalogStore`] | [`CatalogSession`] | catalog entry |
//! | [`CustomListStore`] | [`CustomListSession`] | custom-list entry |
//! | [`UserStore`] | [`UserSession`] | user, group, permission |

pub mod artifact;
pub mod catalog;
pub mod custom_list;
pub mod user;

pub use artifact::{
    ArtifactSession, ArtifactStore, Persistable, WriteOptions, create_artifact_store,
};
pub use catalog::{CatalogGroup, CatalogSession, CatalogStore, create_catalog_store};
pub use custom_list::{CustomListSession, CustomListStore, create_custom_list_store};
pub use user::{UserSession, UserStore, create_user_store};

use crate::model::{
    Artifact, CatalogEntry, CustomListEntry, Group, Model, Namespace, Permission, User, Version,
};
use crate::query::{Filterable, Query};
use crate::MlgateError;
use serde::Serialize;
use serde::de::DeserializeOwned;

// =============================================================================
// RESOURCE MAPPER
// =============================================================================

/// CRUD over one resource type, keyed by string.
///
/// Contract (identical on every backend):
/// - `create` fails with `AlreadyExists` when the key is present
/// - `edit`, `read` and `delete` fail with `NotFound` when it is absent
/// - `delete` returns the value it removed
/// - `search` returns exactly the items `query` matches
pub trait ResourceMapper {
    type Resource: Filterable + Clone;

    fn create(&mut self, resource: Self::Resource) -> Result<Self::Resource, MlgateError>;

    fn edit(&mut self, resource: Self::Resource) -> Result<Self::Resource, MlgateError>;

    fn read(&mut self, key: &str) -> Result<Self::Resource, MlgateError>;

    fn list(&mut self) -> Result<Vec<String>, MlgateError>;

    fn delete(&mut self, key: &str) -> Result<Self::Resource, MlgateError>;

    /// Read one page of resources, in `list` order.
    fn list_details(
        &mut self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Self::Resource>, MlgateError> {
        let keys = self.list()?;
        keys.iter()
            .skip(offset)
            .take(limit)
            .map(|key| self.read(key))
            .collect()
    }

    /// Load every resource and keep those the query matches.
    fn search(&mut self, query: &Query) -> Result<Vec<Self::Resource>, MlgateError> {
        let all = self.list_details(usize::MAX, 0)?;
        Ok(query.run(all))
    }

    /// True when `key` is present.
    fn exists(&mut self, key: &str) -> Result<bool, MlgateError> {
        Ok(self.list()?.iter().any(|k| k == key))
    }
}

/// A boxed mapper, as handed out by sessions.
pub type BoxedMapper<R> = Box<dyn ResourceMapper<Resource = R> + Send>;

// =============================================================================
// RESOURCES
// =============================================================================

/// A resource the generic backends can store as a JSON document.
pub trait Resource: Filterable + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind name used in errors and logs.
    const KIND: &'static str;

    /// The key this resource is stored under.
    fn key(&self) -> String;
}

/// A resource that is only a name for a set of children.
pub trait Container: Resource {
    fn from_identifier(identifier: &str) -> Result<Self, MlgateError>;
}

impl Resource for Namespace {
    const KIND: &'static str = Namespace::KIND;
    fn key(&self) -> String {
        self.identifier.clone()
    }
}

impl Resource for Model {
    const KIND: &'static str = Model::KIND;
    fn key(&self) -> String {
        self.identifier.clone()
    }
}

impl Resource for Version {
    const KIND: &'static str = Version::KIND;
    fn key(&self) -> String {
        self.identifier.clone()
    }
}

impl Container for Namespace {
    fn from_identifier(identifier: &str) -> Result<Self, MlgateError> {
        Namespace::new(identifier)
    }
}

impl Container for Model {
    fn from_identifier(identifier: &str) -> Result<Self, MlgateError> {
        Model::new(identifier)
    }
}

impl Container for Version {
    fn from_identifier(identifier: &str) -> Result<Self, MlgateError> {
        Version::new(identifier)
    }
}

impl Resource for Artifact {
    const KIND: &'static str = "artifact";
    fn key(&self) -> String {
        self.identifier().to_string()
    }
}

impl Resource for CatalogEntry {
    const KIND: &'static str = "catalog entry";
    fn key(&self) -> String {
        self.header.identifier.clone()
    }
}

impl Resource for CustomListEntry {
    const KIND: &'static str = "custom list entry";
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Resource for User {
    const KIND: &'static str = "user";
    fn key(&self) -> String {
        self.username.clone()
    }
}

impl Resource for Group {
    const KIND: &'static str = "group";
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Resource for Permission {
    const KIND: &'static str = "permission";
    fn key(&self) -> String {
        Permission::key(self)
    }
}

// =============================================================================
// SESSION GUARD
// =============================================================================

/// Open/closed bookkeeping shared by every session type.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    closed: bool,
}

impl SessionState {
    pub(crate) fn ensure_open(&self, kind: &str) -> Result<(), MlgateError> {
        if self.closed {
            return Err(MlgateError::Validation(format!("{kind} session is closed")));
        }
        Ok(())
    }

    /// Mark closed; returns false when it already was.
    pub(crate) fn mark_closed(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}
