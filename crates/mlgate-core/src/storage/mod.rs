//! # Storage Backends
//!
//! The four backends every store can run on:
//! - [`memory`]: ordered maps behind one lock
//! - [`fs`]: one JSON document per resource
//! - [`redb`]: normalized rows in an embedded transactional database
//! - [`http`]: a remote REST store (feature `remote`)
//!
//! Artifact stores dispatch to backend-specific container and artifact
//! mappers. The flat stores (catalog, custom lists, users) share
//! [`StorageBackend`], which hands out one document mapper per collection.

pub mod fs;
#[cfg(feature = "remote")]
pub mod http;
pub mod memory;
pub mod redb;

use crate::store::{BoxedMapper, Resource};
use crate::uri::{StoreType, StoreUri};
use crate::MlgateError;
use fs::{FileSystemStorage, FsDocumentMapper};
use memory::MemoryCollections;
use self::redb::RedbCollections;
use tracing::info;

/// Where a flat-store collection lives on each backend.
#[derive(Debug, Clone)]
pub struct Collection<'a> {
    /// Collection name for the memory and redb backends.
    pub name: &'a str,
    /// Directory under the store's folder for the filesystem backend.
    pub fs_base: &'a str,
    /// Endpoint path for the HTTP backend.
    pub http_path: String,
}

/// A document backend shared by the flat stores.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory(MemoryCollections),
    FileSystem(FileSystemStorage),
    Relational(RedbCollections),
    #[cfg(feature = "remote")]
    Remote(http::HttpClient),
}

impl StorageBackend {
    /// Open the backend a URI selects.
    ///
    /// `fs_folder` is the sub-folder used under a filesystem root;
    /// `collections` are created up front on the memory and redb backends.
    pub fn open(
        uri: &StoreUri,
        fs_folder: &str,
        collections: &[&str],
        token: Option<&str>,
    ) -> Result<Self, MlgateError> {
        let backend = match uri.store_type {
            StoreType::LocalMemory => Self::InMemory(MemoryCollections::new(collections)),
            StoreType::LocalFilesystem => {
                Self::FileSystem(FileSystemStorage::open(uri.as_path(), fs_folder)?)
            }
            StoreType::RelationalDb => {
                Self::Relational(RedbCollections::open(&uri.path, collections)?)
            }
            #[cfg(feature = "remote")]
            StoreType::RemoteHttp => {
                Self::Remote(http::HttpClient::new(&uri.path, token.map(str::to_string)))
            }
            #[cfg(not(feature = "remote"))]
            StoreType::RemoteHttp => {
                let _ = token;
                return Err(MlgateError::UnknownBackend(format!(
                    "'{}' needs the `remote` feature",
                    uri.uri
                )));
            }
        };
        info!(uri = %uri.uri, backend = %uri.store_type, folder = fs_folder, "opened document store");
        Ok(backend)
    }

    /// Fail when the backing location disappeared after opening.
    pub fn check_alive(&self) -> Result<(), MlgateError> {
        match self {
            Self::FileSystem(storage) if !storage.sub_folder().is_dir() => {
                Err(MlgateError::Backend(format!(
                    "store folder '{}' vanished",
                    storage.sub_folder().display()
                )))
            }
            _ => Ok(()),
        }
    }

    /// A mapper over one collection.
    pub fn mapper<R: Resource>(&self, collection: Collection<'_>) -> BoxedMapper<R> {
        match self {
            Self::InMemory(store) => Box::new(store.mapper::<R>(collection.name)),
            Self::FileSystem(storage) => {
                Box::new(FsDocumentMapper::<R>::new(storage, collection.fs_base, Vec::new()))
            }
            Self::Relational(store) => Box::new(store.mapper::<R>(collection.name)),
            #[cfg(feature = "remote")]
            Self::Remote(client) => Box::new(client.mapper::<R>(collection.http_path)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::model::Group;
    use tempfile::tempdir;

    fn groups() -> Collection<'static> {
        Collection {
            name: "groups",
            fs_base: "groups",
            http_path: "/group".to_string(),
        }
    }

    #[test]
    fn every_local_backend_hands_out_working_mappers() {
        let dir = tempdir().expect("temp dir");
        let fs_uri = StoreUri::parse(&format!("fs://{}", dir.path().display())).unwrap();
        let db_uri =
            StoreUri::parse(&format!("rdbs+redb://{}", dir.path().join("u.redb").display()))
                .unwrap();
        let uris = [StoreUri::parse("memory://").unwrap(), fs_uri, db_uri];

        for uri in &uris {
            let backend = StorageBackend::open(uri, "users", &["groups"], None).unwrap();
            let mut mapper = backend.mapper::<Group>(groups());
            let group = Group {
                name: "reviewers".into(),
                permissions: vec![],
            };
            mapper.create(group.clone()).unwrap();
            assert_eq!(mapper.list().unwrap(), vec!["reviewers"], "{}", uri.uri);
            assert_eq!(mapper.delete("reviewers").unwrap(), group);
        }
    }
}
