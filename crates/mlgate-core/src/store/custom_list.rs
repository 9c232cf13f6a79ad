//! # Custom List Store
//!
//! One collection per [`CustomListName`]. Lists form a hierarchy:
//! - an entry of a child list must name an existing entry of its parent list
//! - an entry of a root list must not name a parent
//! - an entry still referenced by a child-list entry cannot be deleted

use crate::model::{CustomListEntry, CustomListName};
use crate::primitives::CUSTOM_LIST_FOLDER;
use crate::query::Query;
use crate::storage::{Collection, StorageBackend};
use crate::store::{BoxedMapper, ResourceMapper, SessionState};
use crate::types::check_identifier;
use crate::uri::StoreUri;
use crate::MlgateError;
use tracing::{debug, warn};

fn collection(list: CustomListName) -> Collection<'static> {
    Collection {
        name: list.as_str(),
        fs_base: list.as_str(),
        #[cfg(feature = "remote")]
        http_path: crate::storage::http::custom_list_path(list.as_str()),
        #[cfg(not(feature = "remote"))]
        http_path: String::new(),
    }
}

/// A shareable handle to the custom lists.
#[derive(Debug, Clone)]
pub struct CustomListStore {
    uri: StoreUri,
    backend: StorageBackend,
}

/// Open the custom-list store a URI selects.
pub fn create_custom_list_store(uri: &str) -> Result<CustomListStore, MlgateError> {
    CustomListStore::open(&StoreUri::parse(uri)?, None)
}

impl CustomListStore {
    pub fn open(uri: &StoreUri, token: Option<&str>) -> Result<Self, MlgateError> {
        let names: Vec<&str> = CustomListName::ALL.iter().map(|l| l.as_str()).collect();
        let backend = StorageBackend::open(uri, CUSTOM_LIST_FOLDER, &names, token)?;
        Ok(Self {
            uri: uri.clone(),
            backend,
        })
    }

    pub fn uri(&self) -> &StoreUri {
        &self.uri
    }

    pub fn session(&self) -> CustomListSession {
        CustomListSession {
            store: self.clone(),
            state: SessionState::default(),
        }
    }

    /// Run `f` in a session that is closed on every exit path.
    pub fn with_session<T>(
        &self,
        f: impl FnOnce(&mut CustomListSession) -> Result<T, MlgateError>,
    ) -> Result<T, MlgateError> {
        let mut session = self.session();
        let result = f(&mut session);
        let closed = session.close();
        let value = result?;
        closed?;
        Ok(value)
    }
}

pub struct CustomListSession {
    store: CustomListStore,
    state: SessionState,
}

impl CustomListSession {
    /// Mapper over one list, enforcing the parent rules.
    pub fn entry_mapper(
        &self,
        list: CustomListName,
    ) -> Result<BoxedMapper<CustomListEntry>, MlgateError> {
        self.state.ensure_open("custom list")?;
        Ok(Box::new(CustomListEntryMapper {
            list,
            backend: self.store.backend.clone(),
            inner: self.store.backend.mapper(collection(list)),
        }))
    }

    /// Close the session. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), MlgateError> {
        if !self.state.mark_closed() {
            return Ok(());
        }
        self.store.backend.check_alive()?;
        debug!(uri = %self.store.uri.uri, "custom list session closed");
        Ok(())
    }
}

impl Drop for CustomListSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(uri = %self.store.uri.uri, error = %e, "failed to close custom list session");
        }
    }
}

struct CustomListEntryMapper {
    list: CustomListName,
    backend: StorageBackend,
    inner: BoxedMapper<CustomListEntry>,
}

impl CustomListEntryMapper {
    fn check_parent(&self, entry: &CustomListEntry) -> Result<(), MlgateError> {
        match (self.list.parent(), &entry.parent) {
            (None, None) => Ok(()),
            (None, Some(parent)) => Err(MlgateError::Validation(format!(
                "entry '{}' of root list '{}' must not have a parent (got '{parent}')",
                entry.name, self.list
            ))),
            (Some(parent_list), None) => Err(MlgateError::Validation(format!(
                "entry '{}' of list '{}' needs a parent from '{parent_list}'",
                entry.name, self.list
            ))),
            (Some(parent_list), Some(parent)) => {
                let mut parents = self.backend.mapper::<CustomListEntry>(collection(parent_list));
                if parents.exists(parent)? {
                    Ok(())
                } else {
                    Err(MlgateError::Validation(format!(
                        "entry '{}' names parent '{parent}', which is not in '{parent_list}'",
                        entry.name
                    )))
                }
            }
        }
    }

    fn check_unreferenced(&self, name: &str) -> Result<(), MlgateError> {
        for child_list in self.list.children() {
            let mut children = self.backend.mapper::<CustomListEntry>(collection(child_list));
            let referencing: Vec<String> = children
                .list_details(usize::MAX, 0)?
                .into_iter()
                .filter(|c| c.parent.as_deref() == Some(name))
                .map(|c| c.name)
                .collect();
            if !referencing.is_empty() {
                return Err(MlgateError::Validation(format!(
                    "entry '{name}' is the parent of {} in '{child_list}'",
                    referencing.join(", ")
                )));
            }
        }
        Ok(())
    }
}

impl ResourceMapper for CustomListEntryMapper {
    type Resource = CustomListEntry;

    fn create(&mut self, entry: CustomListEntry) -> Result<CustomListEntry, MlgateError> {
        check_identifier("custom list entry", &entry.name)?;
        self.check_parent(&entry)?;
        self.inner.create(entry)
    }

    fn edit(&mut self, entry: CustomListEntry) -> Result<CustomListEntry, MlgateError> {
        self.check_parent(&entry)?;
        self.inner.edit(entry)
    }

    fn read(&mut self, key: &str) -> Result<CustomListEntry, MlgateError> {
        self.inner.read(key)
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        self.inner.list()
    }

    fn delete(&mut self, key: &str) -> Result<CustomListEntry, MlgateError> {
        // Missing entries report NotFound before the reference check.
        self.inner.read(key)?;
        self.check_unreferenced(key)?;
        self.inner.delete(key)
    }

    fn list_details(
        &mut self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CustomListEntry>, MlgateError> {
        self.inner.list_details(limit, offset)
    }

    fn search(&mut self, query: &Query) -> Result<Vec<CustomListEntry>, MlgateError> {
        self.inner.search(query)
    }
}
