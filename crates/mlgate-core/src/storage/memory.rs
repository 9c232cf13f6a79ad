//! # In-Memory Storage
//!
//! Nested ordered maps behind one coarse lock per store.
//!
//! - Artifact stores: namespace -> model -> version -> artifact
//! - Flat stores: collection -> key -> JSON document
//!
//! Insertion order is preserved (`IndexMap`), so `list` returns keys in
//! creation order. The lock is held for exactly one mapper call; a sequence
//! of calls from different sessions can interleave.

use crate::model::{Artifact, Context};
use crate::store::{Container, Resource, ResourceMapper};
use crate::MlgateError;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

type Artifacts = IndexMap<String, Artifact>;
type Versions = IndexMap<String, Artifacts>;
type Models = IndexMap<String, Versions>;
type Namespaces = IndexMap<String, Models>;

// =============================================================================
// ARTIFACT TREE
// =============================================================================

/// Shared handle to an in-memory artifact tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifacts {
    tree: Arc<Mutex<Namespaces>>,
}

/// Which container a mapper is scoped to.
#[derive(Debug, Clone, Default)]
struct Scope {
    namespace: String,
    model: String,
    version: String,
}

type Locate<C> = for<'a> fn(&'a mut Namespaces, &Scope) -> Result<&'a mut IndexMap<String, C>, MlgateError>;

fn namespaces<'a>(tree: &'a mut Namespaces, _: &Scope) -> Result<&'a mut Namespaces, MlgateError> {
    Ok(tree)
}

fn models<'a>(tree: &'a mut Namespaces, scope: &Scope) -> Result<&'a mut Models, MlgateError> {
    tree.get_mut(&scope.namespace)
        .ok_or_else(|| MlgateError::not_found("namespace", &scope.namespace))
}

fn versions<'a>(tree: &'a mut Namespaces, scope: &Scope) -> Result<&'a mut Versions, MlgateError> {
    models(tree, scope)?
        .get_mut(&scope.model)
        .ok_or_else(|| MlgateError::not_found("model", &scope.model))
}

fn artifacts<'a>(tree: &'a mut Namespaces, scope: &Scope) -> Result<&'a mut Artifacts, MlgateError> {
    versions(tree, scope)?
        .get_mut(&scope.version)
        .ok_or_else(|| MlgateError::not_found("version", &scope.version))
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace_mapper<R: Container>(&self) -> MemoryContainerMapper<R, Models> {
        MemoryContainerMapper::new(self.clone(), Scope::default(), namespaces)
    }

    pub fn model_mapper<R: Container>(&self, namespace: &str) -> MemoryContainerMapper<R, Versions> {
        let scope = Scope {
            namespace: namespace.to_string(),
            ..Scope::default()
        };
        MemoryContainerMapper::new(self.clone(), scope, models)
    }

    pub fn version_mapper<R: Container>(
        &self,
        namespace: &str,
        model: &str,
    ) -> MemoryContainerMapper<R, Artifacts> {
        let scope = Scope {
            namespace: namespace.to_string(),
            model: model.to_string(),
            ..Scope::default()
        };
        MemoryContainerMapper::new(self.clone(), scope, versions)
    }

    pub fn artifact_mapper(&self, ctx: &Context) -> MemoryArtifactMapper {
        MemoryArtifactMapper {
            store: self.clone(),
            scope: Scope {
                namespace: ctx.namespace.clone(),
                model: ctx.model.clone(),
                version: ctx.version.clone(),
            },
        }
    }
}

/// Mapper over one level of containers; a container's value is its
/// (initially empty) map of children.
pub struct MemoryContainerMapper<R, C> {
    store: MemoryArtifacts,
    scope: Scope,
    locate: Locate<C>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Container, C: Default> MemoryContainerMapper<R, C> {
    fn new(store: MemoryArtifacts, scope: Scope, locate: Locate<C>) -> Self {
        Self {
            store,
            scope,
            locate,
            _resource: PhantomData,
        }
    }
}

impl<R: Container, C: Default> ResourceMapper for MemoryContainerMapper<R, C> {
    type Resource = R;

    fn create(&mut self, resource: R) -> Result<R, MlgateError> {
        let key = resource.key();
        let mut tree = self.store.tree.lock();
        let level = (self.locate)(&mut tree, &self.scope)?;
        if level.contains_key(&key) {
            return Err(MlgateError::already_exists(R::KIND, &key));
        }
        level.insert(key.clone(), C::default());
        debug!(kind = R::KIND, key = %key, "memory create");
        Ok(resource)
    }

    fn edit(&mut self, resource: R) -> Result<R, MlgateError> {
        // A container has no fields besides its key.
        let key = resource.key();
        let mut tree = self.store.tree.lock();
        let level = (self.locate)(&mut tree, &self.scope)?;
        if !level.contains_key(&key) {
            return Err(MlgateError::not_found(R::KIND, &key));
        }
        Ok(resource)
    }

    fn read(&mut self, key: &str) -> Result<R, MlgateError> {
        let mut tree = self.store.tree.lock();
        let level = (self.locate)(&mut tree, &self.scope)?;
        if !level.contains_key(key) {
            return Err(MlgateError::not_found(R::KIND, key));
        }
        R::from_identifier(key)
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        let mut tree = self.store.tree.lock();
        let level = (self.locate)(&mut tree, &self.scope)?;
        Ok(level.keys().cloned().collect())
    }

    fn delete(&mut self, key: &str) -> Result<R, MlgateError> {
        let mut tree = self.store.tree.lock();
        let level = (self.locate)(&mut tree, &self.scope)?;
        if level.shift_remove(key).is_none() {
            return Err(MlgateError::not_found(R::KIND, key));
        }
        debug!(kind = R::KIND, key = %key, "memory delete (cascade)");
        R::from_identifier(key)
    }
}

/// Mapper over the artifacts of one version.
pub struct MemoryArtifactMapper {
    store: MemoryArtifacts,
    scope: Scope,
}

impl ResourceMapper for MemoryArtifactMapper {
    type Resource = Artifact;

    fn create(&mut self, artifact: Artifact) -> Result<Artifact, MlgateError> {
        let mut tree = self.store.tree.lock();
        let level = artifacts(&mut tree, &self.scope)?;
        let key = artifact.identifier().to_string();
        if level.contains_key(&key) {
            return Err(MlgateError::already_exists("artifact", &key));
        }
        level.insert(key, artifact.clone());
        Ok(artifact)
    }

    fn edit(&mut self, artifact: Artifact) -> Result<Artifact, MlgateError> {
        let mut tree = self.store.tree.lock();
        let level = artifacts(&mut tree, &self.scope)?;
        match level.get_mut(artifact.identifier()) {
            Some(slot) => {
                *slot = artifact.clone();
                Ok(artifact)
            }
            None => Err(MlgateError::not_found("artifact", artifact.identifier())),
        }
    }

    fn read(&mut self, key: &str) -> Result<Artifact, MlgateError> {
        let mut tree = self.store.tree.lock();
        artifacts(&mut tree, &self.scope)?
            .get(key)
            .cloned()
            .ok_or_else(|| MlgateError::not_found("artifact", key))
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        let mut tree = self.store.tree.lock();
        Ok(artifacts(&mut tree, &self.scope)?.keys().cloned().collect())
    }

    fn delete(&mut self, key: &str) -> Result<Artifact, MlgateError> {
        let mut tree = self.store.tree.lock();
        artifacts(&mut tree, &self.scope)?
            .shift_remove(key)
            .ok_or_else(|| MlgateError::not_found("artifact", key))
    }

    fn list_details(&mut self, limit: usize, offset: usize) -> Result<Vec<Artifact>, MlgateError> {
        let mut tree = self.store.tree.lock();
        Ok(artifacts(&mut tree, &self.scope)?
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

// =============================================================================
// FLAT COLLECTIONS
// =============================================================================

/// Shared handle to named collections of JSON documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollections {
    collections: Arc<Mutex<IndexMap<String, IndexMap<String, Value>>>>,
}

impl MemoryCollections {
    /// Create collections, each initially empty.
    pub fn new(names: &[&str]) -> Self {
        let collections = names
            .iter()
            .map(|n| ((*n).to_string(), IndexMap::new()))
            .collect();
        Self {
            collections: Arc::new(Mutex::new(collections)),
        }
    }

    pub fn mapper<R: Resource>(&self, collection: &str) -> MemoryCollectionMapper<R> {
        MemoryCollectionMapper {
            store: self.clone(),
            collection: collection.to_string(),
            _resource: PhantomData,
        }
    }
}

/// Mapper over one named collection.
pub struct MemoryCollectionMapper<R> {
    store: MemoryCollections,
    collection: String,
    _resource: PhantomData<fn() -> R>,
}

fn to_document<R: Resource>(resource: &R) -> Result<Value, MlgateError> {
    serde_json::to_value(resource).map_err(|e| MlgateError::Serialization(e.to_string()))
}

fn from_document<R: Resource>(doc: &Value) -> Result<R, MlgateError> {
    R::deserialize(doc).map_err(|e| MlgateError::Serialization(e.to_string()))
}

impl<R: Resource> MemoryCollectionMapper<R> {
    fn with_collection<T>(
        &self,
        f: impl FnOnce(&mut IndexMap<String, Value>) -> Result<T, MlgateError>,
    ) -> Result<T, MlgateError> {
        let mut collections = self.store.collections.lock();
        let collection = collections
            .get_mut(&self.collection)
            .ok_or_else(|| MlgateError::not_found("collection", &self.collection))?;
        f(collection)
    }
}

impl<R: Resource> ResourceMapper for MemoryCollectionMapper<R> {
    type Resource = R;

    fn create(&mut self, resource: R) -> Result<R, MlgateError> {
        let key = resource.key();
        let doc = to_document(&resource)?;
        self.with_collection(|c| {
            if c.contains_key(&key) {
                return Err(MlgateError::already_exists(R::KIND, &key));
            }
            c.insert(key, doc);
            Ok(())
        })?;
        Ok(resource)
    }

    fn edit(&mut self, resource: R) -> Result<R, MlgateError> {
        let key = resource.key();
        let doc = to_document(&resource)?;
        self.with_collection(|c| match c.get_mut(&key) {
            Some(slot) => {
                *slot = doc;
                Ok(())
            }
            None => Err(MlgateError::not_found(R::KIND, &key)),
        })?;
        Ok(resource)
    }

    fn read(&mut self, key: &str) -> Result<R, MlgateError> {
        self.with_collection(|c| {
            c.get(key)
                .ok_or_else(|| MlgateError::not_found(R::KIND, key))
                .and_then(from_document)
        })
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        self.with_collection(|c| Ok(c.keys().cloned().collect()))
    }

    fn delete(&mut self, key: &str) -> Result<R, MlgateError> {
        self.with_collection(|c| {
            c.shift_remove(key)
                .ok_or_else(|| MlgateError::not_found(R::KIND, key))
                .and_then(|doc| from_document(&doc))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::model::{ArtifactBody, Model, Namespace, Report, User, Version};

    fn report(id: &str) -> Artifact {
        Artifact::from_body(id, ArtifactBody::Report(Report::default())).unwrap()
    }

    #[test]
    fn containers_require_ancestors() {
        let store = MemoryArtifacts::new();
        let mut models = store.model_mapper::<Model>("ns");
        let err = models.create(Model::new("m").unwrap()).unwrap_err();
        assert_eq!(err, MlgateError::not_found("namespace", "ns"));

        store
            .namespace_mapper::<Namespace>()
            .create(Namespace::new("ns").unwrap())
            .unwrap();
        models.create(Model::new("m").unwrap()).unwrap();
        assert_eq!(models.list().unwrap(), vec!["m"]);
    }

    #[test]
    fn deleting_namespace_cascades() {
        let store = MemoryArtifacts::new();
        let ctx = Context::new("ns", "m", "v1").unwrap();
        store
            .namespace_mapper::<Namespace>()
            .create(Namespace::new("ns").unwrap())
            .unwrap();
        store
            .model_mapper::<Model>("ns")
            .create(Model::new("m").unwrap())
            .unwrap();
        store
            .version_mapper::<Version>("ns", "m")
            .create(Version::new("v1").unwrap())
            .unwrap();
        store.artifact_mapper(&ctx).create(report("r1")).unwrap();

        store.namespace_mapper::<Namespace>().delete("ns").unwrap();
        let err = store.artifact_mapper(&ctx).read("r1").unwrap_err();
        assert!(matches!(err, MlgateError::NotFound(_)));
    }

    #[test]
    fn collections_keep_insertion_order() {
        let store = MemoryCollections::new(&["users"]);
        let mut users = store.mapper::<User>("users");
        for name in ["zoe", "adam", "mia"] {
            users.create(User::new(name).unwrap()).unwrap();
        }
        assert_eq!(users.list().unwrap(), vec!["zoe", "adam", "mia"]);
        assert!(matches!(
            users.create(User::new("adam").unwrap()),
            Err(MlgateError::AlreadyExists(_))
        ));
        assert_eq!(users.delete("adam").unwrap().username, "adam");
        assert!(matches!(users.read("adam"), Err(MlgateError::NotFound(_))));
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryArtifacts::new();
        let other = store.clone();
        store
            .namespace_mapper::<Namespace>()
            .create(Namespace::new("ns").unwrap())
            .unwrap();
        assert_eq!(other.namespace_mapper::<Namespace>().list().unwrap(), vec!["ns"]);
    }
}
