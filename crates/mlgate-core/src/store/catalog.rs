//! # Catalog Store
//!
//! Catalog entries on any backend, plus [`CatalogGroup`] for searching
//! several catalogs at once.
//!
//! A catalog opened read-only hands out mappers that refuse `create`,
//! `edit` and `delete` with a validation error.

use crate::model::CatalogEntry;
use crate::primitives::CATALOG_FOLDER;
use crate::query::Query;
use crate::storage::{Collection, StorageBackend};
use crate::store::{BoxedMapper, ResourceMapper, SessionState};
use crate::types::check_identifier;
use crate::uri::StoreUri;
use crate::MlgateError;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

const ENTRIES: &str = "entries";

fn entries() -> Collection<'static> {
    Collection {
        name: ENTRIES,
        fs_base: "",
        #[cfg(feature = "remote")]
        http_path: crate::storage::http::catalog_path(),
        #[cfg(not(feature = "remote"))]
        http_path: String::new(),
    }
}

// =============================================================================
// STORE
// =============================================================================

/// A shareable handle to one catalog.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    uri: StoreUri,
    backend: StorageBackend,
    read_only: bool,
}

/// Open the catalog store a URI selects.
pub fn create_catalog_store(uri: &str) -> Result<CatalogStore, MlgateError> {
    CatalogStore::open(&StoreUri::parse(uri)?, None)
}

impl CatalogStore {
    pub fn open(uri: &StoreUri, token: Option<&str>) -> Result<Self, MlgateError> {
        let backend = StorageBackend::open(uri, CATALOG_FOLDER, &[ENTRIES], token)?;
        Ok(Self {
            uri: uri.clone(),
            backend,
            read_only: false,
        })
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn uri(&self) -> &StoreUri {
        &self.uri
    }

    pub fn session(&self) -> CatalogSession {
        CatalogSession {
            store: self.clone(),
            state: SessionState::default(),
        }
    }

    /// Run `f` in a session that is closed on every exit path.
    pub fn with_session<T>(
        &self,
        f: impl FnOnce(&mut CatalogSession) -> Result<T, MlgateError>,
    ) -> Result<T, MlgateError> {
        let mut session = self.session();
        let result = f(&mut session);
        let closed = session.close();
        let value = result?;
        closed?;
        Ok(value)
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct CatalogSession {
    store: CatalogStore,
    state: SessionState,
}

impl CatalogSession {
    pub fn entry_mapper(&self) -> Result<BoxedMapper<CatalogEntry>, MlgateError> {
        self.state.ensure_open("catalog")?;
        Ok(Box::new(CatalogEntryMapper {
            inner: self.store.backend.mapper::<CatalogEntry>(entries()),
            read_only: self.store.read_only,
            uri: self.store.uri.uri.clone(),
        }))
    }

    /// Close the session. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), MlgateError> {
        if !self.state.mark_closed() {
            return Ok(());
        }
        self.store.backend.check_alive()?;
        debug!(uri = %self.store.uri.uri, "catalog session closed");
        Ok(())
    }
}

impl Drop for CatalogSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(uri = %self.store.uri.uri, error = %e, "failed to close catalog session");
        }
    }
}

/// Adds identifier checks, `updated` stamping and the read-only guard.
struct CatalogEntryMapper {
    inner: BoxedMapper<CatalogEntry>,
    read_only: bool,
    uri: String,
}

impl CatalogEntryMapper {
    fn ensure_writable(&self) -> Result<(), MlgateError> {
        if self.read_only {
            warn!(uri = %self.uri, "write refused on read-only catalog");
            return Err(MlgateError::Validation(format!(
                "catalog '{}' is read-only",
                self.uri
            )));
        }
        Ok(())
    }
}

impl ResourceMapper for CatalogEntryMapper {
    type Resource = CatalogEntry;

    fn create(&mut self, entry: CatalogEntry) -> Result<CatalogEntry, MlgateError> {
        self.ensure_writable()?;
        check_identifier("catalog entry", &entry.header.identifier)?;
        self.inner.create(entry)
    }

    fn edit(&mut self, mut entry: CatalogEntry) -> Result<CatalogEntry, MlgateError> {
        self.ensure_writable()?;
        entry.header.updated = chrono::Utc::now().timestamp();
        self.inner.edit(entry)
    }

    fn read(&mut self, key: &str) -> Result<CatalogEntry, MlgateError> {
        self.inner.read(key)
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        self.inner.list()
    }

    fn delete(&mut self, key: &str) -> Result<CatalogEntry, MlgateError> {
        self.ensure_writable()?;
        self.inner.delete(key)
    }

    fn list_details(&mut self, limit: usize, offset: usize) -> Result<Vec<CatalogEntry>, MlgateError> {
        self.inner.list_details(limit, offset)
    }

    fn search(&mut self, query: &Query) -> Result<Vec<CatalogEntry>, MlgateError> {
        self.inner.search(query)
    }
}

// =============================================================================
// CATALOG GROUP
// =============================================================================

/// Several named catalogs searched as one.
#[derive(Debug, Clone, Default)]
pub struct CatalogGroup {
    catalogs: IndexMap<String, CatalogStore>,
}

impl CatalogGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a catalog. Fails on a taken id unless `overwrite` is set.
    pub fn add_catalog(
        &mut self,
        id: impl Into<String>,
        store: CatalogStore,
        overwrite: bool,
    ) -> Result<(), MlgateError> {
        let id = id.into();
        if self.catalogs.contains_key(&id) && !overwrite {
            return Err(MlgateError::already_exists("catalog", &id));
        }
        info!(catalog = %id, uri = %store.uri.uri, read_only = store.read_only, "catalog added");
        self.catalogs.insert(id, store);
        Ok(())
    }

    /// Open a store from a URI and register it.
    pub fn add_catalog_from_uri(
        &mut self,
        id: impl Into<String>,
        uri: &str,
        overwrite: bool,
    ) -> Result<(), MlgateError> {
        let id = id.into();
        if self.catalogs.contains_key(&id) && !overwrite {
            return Err(MlgateError::already_exists("catalog", &id));
        }
        let store = create_catalog_store(uri)?;
        self.add_catalog(id, store, true)
    }

    pub fn catalog(&self, id: &str) -> Result<&CatalogStore, MlgateError> {
        self.catalogs
            .get(id)
            .ok_or_else(|| MlgateError::not_found("catalog", id))
    }

    pub fn remove_catalog(&mut self, id: &str) -> Result<CatalogStore, MlgateError> {
        self.catalogs
            .shift_remove(id)
            .ok_or_else(|| MlgateError::not_found("catalog", id))
    }

    /// Catalog ids in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.catalogs.keys().map(String::as_str).collect()
    }

    /// Search every catalog, stamping each hit with the id it came from.
    pub fn search(&self, query: &Query) -> Result<Vec<CatalogEntry>, MlgateError> {
        let mut hits = Vec::new();
        for (id, store) in &self.catalogs {
            let found = store.with_session(|s| s.entry_mapper()?.search(query))?;
            hits.extend(found.into_iter().map(|mut entry| {
                entry.header.catalog_id = id.clone();
                entry
            }));
        }
        Ok(hits)
    }

    /// Read one entry from one catalog.
    pub fn read_entry(&self, catalog_id: &str, identifier: &str) -> Result<CatalogEntry, MlgateError> {
        let store = self.catalog(catalog_id)?;
        let mut entry = store.with_session(|s| s.entry_mapper()?.read(identifier))?;
        entry.header.catalog_id = catalog_id.to_string();
        Ok(entry)
    }
}

// =============================================================================
// TESTS
// =============================================================================
