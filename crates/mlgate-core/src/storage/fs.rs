//! # Filesystem Storage
//!
//! One JSON document per resource, one directory per container.
//!
//! ```text
//! <root>/artifacts/<namespace>/<model>/<version>/<artifact>.json
//! <root>/catalog/<entry>.json
//! <root>/custom_lists/<list>/<entry>.json
//! <root>/users/<collection>/<key>.json
//! ```
//!
//! Writes replace the whole file. A crash mid-write can leave a truncated
//! document; the store accepts that and reports it as a serialization error
//! on the next read.
//!
//! Every key is checked with [`check_identifier`] before it is joined onto a
//! path. A key that could leave its container is `NotFound` on lookups (as on
//! the other backends, where no such key can exist) and a `Validation` error
//! on writes.

use crate::primitives::{JSON_EXTENSION, MAX_DOCUMENT_SIZE};
use crate::store::{Container, Resource, ResourceMapper};
use crate::MlgateError;
use crate::types::check_identifier;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

fn io_err(e: std::io::Error) -> MlgateError {
    MlgateError::Backend(e.to_string())
}

/// A key that cannot name a path component is never present.
fn lookup_key(kind: &str, name: &str) -> Result<(), MlgateError> {
    check_identifier(kind, name).map_err(|_| MlgateError::not_found(kind, name))
}

// =============================================================================
// STORAGE
// =============================================================================

/// A directory of JSON documents with a movable base path.
///
/// The base path selects the logical sub-collection every subsequent
/// operation acts on; mappers set it before each call.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    sub_folder: PathBuf,
    base_path: PathBuf,
}

impl FileSystemStorage {
    /// Open `<root>/<sub_folder>`, creating it when missing.
    pub fn open(root: impl AsRef<Path>, sub_folder: &str) -> Result<Self, MlgateError> {
        let root = root.as_ref();
        if root.exists() && !root.is_dir() {
            return Err(MlgateError::Backend(format!(
                "store root '{}' is not a directory",
                root.display()
            )));
        }
        let sub_folder = root.join(sub_folder);
        fs::create_dir_all(&sub_folder).map_err(io_err)?;
        Ok(Self {
            base_path: sub_folder.clone(),
            sub_folder,
        })
    }

    pub fn sub_folder(&self) -> &Path {
        &self.sub_folder
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Point at `<sub_folder>/<relative>`.
    pub fn set_base_path(&mut self, relative: impl AsRef<Path>) {
        self.base_path = self.sub_folder.join(relative);
    }

    fn resource_path(&self, name: &str) -> Result<PathBuf, MlgateError> {
        check_identifier("resource", name)?;
        Ok(self.base_path.join(format!("{name}.{JSON_EXTENSION}")))
    }

    fn dir_path(&self, name: &str) -> Result<PathBuf, MlgateError> {
        check_identifier("container", name)?;
        Ok(self.base_path.join(name))
    }

    /// Create the base directory (idempotent).
    pub fn create_base(&self) -> Result<(), MlgateError> {
        fs::create_dir_all(&self.base_path).map_err(io_err)
    }

    pub fn base_exists(&self) -> bool {
        self.base_path.is_dir()
    }

    pub fn ensure_resource_exists(&self, kind: &str, name: &str) -> Result<(), MlgateError> {
        lookup_key(kind, name)?;
        if !self.resource_path(name)?.is_file() {
            return Err(MlgateError::not_found(kind, name));
        }
        Ok(())
    }

    pub fn ensure_resource_does_not_exist(&self, kind: &str, name: &str) -> Result<(), MlgateError> {
        check_identifier(kind, name)?;
        if self.resource_path(name)?.exists() {
            return Err(MlgateError::already_exists(kind, name));
        }
        Ok(())
    }

    pub fn read_resource<T: DeserializeOwned>(&self, name: &str) -> Result<T, MlgateError> {
        let path = self.resource_path(name)?;
        let size = fs::metadata(&path).map_err(io_err)?.len();
        if size > MAX_DOCUMENT_SIZE {
            return Err(MlgateError::Backend(format!(
                "document '{}' is {size} bytes, limit is {MAX_DOCUMENT_SIZE}",
                path.display()
            )));
        }
        let bytes = fs::read(&path).map_err(io_err)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            MlgateError::Serialization(format!("{}: {e}", path.display()))
        })
    }

    pub fn write_resource<T: Serialize>(&self, name: &str, value: &T) -> Result<(), MlgateError> {
        self.create_base()?;
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| MlgateError::Serialization(e.to_string()))?;
        fs::write(self.resource_path(name)?, json).map_err(io_err)
    }

    pub fn delete_resource(&self, name: &str) -> Result<(), MlgateError> {
        fs::remove_file(self.resource_path(name)?).map_err(io_err)
    }

    /// Names of the documents under the base path, sorted.
    pub fn list_resources(&self) -> Result<Vec<String>, MlgateError> {
        self.list_entries(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == JSON_EXTENSION)
        })
    }

    // -------------------------------------------------------------------------
    // Directories (containers)
    // -------------------------------------------------------------------------

    pub fn ensure_dir_exists(&self, kind: &str, name: &str) -> Result<(), MlgateError> {
        lookup_key(kind, name)?;
        if !self.dir_path(name)?.is_dir() {
            return Err(MlgateError::not_found(kind, name));
        }
        Ok(())
    }

    pub fn ensure_dir_does_not_exist(&self, kind: &str, name: &str) -> Result<(), MlgateError> {
        check_identifier(kind, name)?;
        if self.dir_path(name)?.exists() {
            return Err(MlgateError::already_exists(kind, name));
        }
        Ok(())
    }

    pub fn create_dir(&self, name: &str) -> Result<(), MlgateError> {
        fs::create_dir_all(self.dir_path(name)?).map_err(io_err)
    }

    /// Remove a directory and everything under it.
    pub fn delete_dir(&self, name: &str) -> Result<(), MlgateError> {
        fs::remove_dir_all(self.dir_path(name)?).map_err(io_err)
    }

    /// Names of the directories under the base path, sorted.
    pub fn list_dirs(&self) -> Result<Vec<String>, MlgateError> {
        self.list_entries(Path::is_dir)
    }

    fn list_entries(&self, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>, MlgateError> {
        if !self.base_exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_path).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !keep(&path) {
                continue;
            }
            let name = if path.is_dir() {
                path.file_name()
            } else {
                path.file_stem()
            };
            if let Some(name) = name.and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// MAPPERS
// =============================================================================

/// One ancestor container of a mapper's base path, outermost first.
#[derive(Debug, Clone)]
pub struct Parent {
    pub kind: &'static str,
    pub key: String,
}

impl Parent {
    pub fn new(kind: &'static str, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

/// Fail with `NotFound` naming the outermost missing ancestor.
fn check_ancestors(storage: &FileSystemStorage, ancestors: &[Parent]) -> Result<(), MlgateError> {
    let mut path = storage.sub_folder().to_path_buf();
    for ancestor in ancestors {
        lookup_key(ancestor.kind, &ancestor.key)?;
        path.push(&ancestor.key);
        if !path.is_dir() {
            return Err(MlgateError::not_found(ancestor.kind, &ancestor.key));
        }
    }
    Ok(())
}

/// Documents of one resource type under one base path.
pub struct FsDocumentMapper<R> {
    storage: FileSystemStorage,
    base: PathBuf,
    ancestors: Vec<Parent>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> FsDocumentMapper<R> {
    pub fn new(storage: &FileSystemStorage, base: impl Into<PathBuf>, ancestors: Vec<Parent>) -> Self {
        Self {
            storage: storage.clone(),
            base: base.into(),
            ancestors,
            _resource: PhantomData,
        }
    }

    /// Point the storage at this mapper's base and check its ancestors exist.
    fn prepare(&mut self) -> Result<(), MlgateError> {
        self.storage.set_base_path(&self.base);
        check_ancestors(&self.storage, &self.ancestors)
    }
}

impl<R: Resource> ResourceMapper for FsDocumentMapper<R> {
    type Resource = R;

    fn create(&mut self, resource: R) -> Result<R, MlgateError> {
        self.prepare()?;
        let key = resource.key();
        self.storage.ensure_resource_does_not_exist(R::KIND, &key)?;
        self.storage.write_resource(&key, &resource)?;
        debug!(kind = R::KIND, key = %key, path = %self.storage.base_path().display(), "fs create");
        Ok(resource)
    }

    fn edit(&mut self, resource: R) -> Result<R, MlgateError> {
        self.prepare()?;
        let key = resource.key();
        self.storage.ensure_resource_exists(R::KIND, &key)?;
        self.storage.write_resource(&key, &resource)?;
        Ok(resource)
    }

    fn read(&mut self, key: &str) -> Result<R, MlgateError> {
        self.prepare()?;
        self.storage.ensure_resource_exists(R::KIND, key)?;
        self.storage.read_resource(key)
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        self.prepare()?;
        self.storage.list_resources()
    }

    fn delete(&mut self, key: &str) -> Result<R, MlgateError> {
        self.prepare()?;
        self.storage.ensure_resource_exists(R::KIND, key)?;
        let resource = self.storage.read_resource(key)?;
        self.storage.delete_resource(key)?;
        debug!(kind = R::KIND, key = %key, "fs delete");
        Ok(resource)
    }
}

/// Directories standing for containers under one base path.
pub struct FsContainerMapper<R> {
    storage: FileSystemStorage,
    base: PathBuf,
    ancestors: Vec<Parent>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Container> FsContainerMapper<R> {
    pub fn new(storage: &FileSystemStorage, base: impl Into<PathBuf>, ancestors: Vec<Parent>) -> Self {
        Self {
            storage: storage.clone(),
            base: base.into(),
            ancestors,
            _resource: PhantomData,
        }
    }

    fn prepare(&mut self) -> Result<(), MlgateError> {
        self.storage.set_base_path(&self.base);
        check_ancestors(&self.storage, &self.ancestors)
    }
}

impl<R: Container> ResourceMapper for FsContainerMapper<R> {
    type Resource = R;

    fn create(&mut self, resource: R) -> Result<R, MlgateError> {
        self.prepare()?;
        let key = resource.key();
        self.storage.ensure_dir_does_not_exist(R::KIND, &key)?;
        self.storage.create_dir(&key)?;
        debug!(kind = R::KIND, key = %key, "fs create container");
        Ok(resource)
    }

    fn edit(&mut self, resource: R) -> Result<R, MlgateError> {
        self.prepare()?;
        self.storage.ensure_dir_exists(R::KIND, &resource.key())?;
        Ok(resource)
    }

    fn read(&mut self, key: &str) -> Result<R, MlgateError> {
        self.prepare()?;
        self.storage.ensure_dir_exists(R::KIND, key)?;
        R::from_identifier(key)
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        self.prepare()?;
        self.storage.list_dirs()
    }

    fn delete(&mut self, key: &str) -> Result<R, MlgateError> {
        self.prepare()?;
        self.storage.ensure_dir_exists(R::KIND, key)?;
        let resource = R::from_identifier(key)?;
        self.storage.delete_dir(key)?;
        debug!(kind = R::KIND, key = %key, "fs delete container (cascade)");
        Ok(resource)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::model::{CustomListEntry, Model, Namespace};
    use tempfile::tempdir;

    #[test]
    fn documents_round_trip() {
        let dir = tempdir().expect("temp dir");
        let storage = FileSystemStorage::open(dir.path(), "custom_lists").unwrap();
        let mut mapper = FsDocumentMapper::<CustomListEntry>::new(&storage, "qa_categories", Vec::new());

        mapper.create(CustomListEntry::new("b", "second")).unwrap();
        mapper.create(CustomListEntry::new("a", "first")).unwrap();
        assert_eq!(mapper.list().unwrap(), vec!["a", "b"]);
        assert!(dir.path().join("custom_lists/qa_categories/a.json").is_file());

        assert!(matches!(
            mapper.create(CustomListEntry::new("a", "again")),
            Err(MlgateError::AlreadyExists(_))
        ));

        let edited = CustomListEntry::new("a", "edited");
        mapper.edit(edited.clone()).unwrap();
        assert_eq!(mapper.read("a").unwrap(), edited);

        assert_eq!(mapper.delete("a").unwrap(), edited);
        assert!(matches!(mapper.read("a"), Err(MlgateError::NotFound(_))));
        assert!(matches!(mapper.delete("a"), Err(MlgateError::NotFound(_))));
    }

    #[test]
    fn missing_parent_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let storage = FileSystemStorage::open(dir.path(), "artifacts").unwrap();
        let mut models =
            FsContainerMapper::<Model>::new(&storage, "ns", vec![Parent::new("namespace", "ns")]);
        assert_eq!(
            models.list().unwrap_err(),
            MlgateError::not_found("namespace", "ns")
        );

        let mut namespaces = FsContainerMapper::<Namespace>::new(&storage, "", Vec::new());
        namespaces.create(Namespace::new("ns").unwrap()).unwrap();
        models.create(Model::new("m").unwrap()).unwrap();
        assert_eq!(models.list().unwrap(), vec!["m"]);

        namespaces.delete("ns").unwrap();
        assert!(!dir.path().join("artifacts/ns").exists());
    }

    #[test]
    fn corrupt_document_is_a_serialization_error() {
        let dir = tempdir().expect("temp dir");
        let storage = FileSystemStorage::open(dir.path(), "catalog").unwrap();
        fs::write(dir.path().join("catalog/broken.json"), b"{not json").unwrap();
        let err = storage.read_resource::<CustomListEntry>("broken").unwrap_err();
        assert!(matches!(err, MlgateError::Serialization(_)));
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempdir().expect("temp dir");
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FileSystemStorage::open(&file, "artifacts"),
            Err(MlgateError::Backend(_))
        ));
    }
}
