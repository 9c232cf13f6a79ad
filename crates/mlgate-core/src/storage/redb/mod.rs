//! # redb-backed Relational Storage
//!
//! The relational backend, built on the redb embedded database:
//! - ACID transactions (one write transaction per mutating mapper call)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Artifacts are decomposed into normalized row tables (see [`schema`]).
//! Flat stores (catalog, custom lists, users) keep one table of JSON
//! documents per collection.
//!
//! ## Transactions
//!
//! A write transaction that is dropped without `commit()` is aborted by
//! redb, so an error anywhere in a mapper call leaves no partial row graph.

pub mod artifacts;
pub mod card;
pub mod evidence;
pub mod report;
pub mod schema;
pub mod suite;

pub use artifacts::{RedbArtifactMapper, RedbContainerMapper};

use crate::model::{DataClassification, ProblemType};
use crate::primitives::IN_MEMORY_LOCATION;
use crate::store::{Resource, ResourceMapper};
use crate::MlgateError;
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, TableHandle, WriteTransaction,
};
use schema::{
    INDEXES, METADATA, NC_DATA_CLASSIFICATION, NC_PROBLEM_TYPE, NEXT_ROW_ID, NameIndex, NameRow,
    ROW_TABLES, RowTable,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) fn db_err<E: Display>(e: E) -> MlgateError {
    MlgateError::Backend(e.to_string())
}

pub(crate) fn encode<T: Serialize>(row: &T) -> Result<Vec<u8>, MlgateError> {
    postcard::to_allocvec(row).map_err(|e| MlgateError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, MlgateError> {
    postcard::from_bytes(bytes).map_err(|e| MlgateError::Serialization(e.to_string()))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, MlgateError> {
    serde_json::to_string(value).map_err(|e| MlgateError::Serialization(e.to_string()))
}

pub(crate) fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, MlgateError> {
    serde_json::from_str(json).map_err(|e| MlgateError::Serialization(e.to_string()))
}

// =============================================================================
// DATABASE
// =============================================================================

/// Open a redb database at `location`, or an in-memory one for `:memory:`.
pub fn open_database(location: &str) -> Result<Arc<Database>, MlgateError> {
    let db = if location == IN_MEMORY_LOCATION {
        redb::Builder::new()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(db_err)?
    } else {
        let path = Path::new(location);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(db_err)?;
        }
        Database::create(path).map_err(db_err)?
    };
    info!(location, "opened redb database");
    Ok(Arc::new(db))
}

/// Run `f` in a write transaction and commit when it succeeds.
pub(crate) fn write<T>(
    db: &Database,
    f: impl FnOnce(&WriteTransaction) -> Result<T, MlgateError>,
) -> Result<T, MlgateError> {
    let txn = db.begin_write().map_err(db_err)?;
    let value = f(&txn)?;
    txn.commit().map_err(db_err)?;
    Ok(value)
}

/// Run `f` in a read transaction.
pub(crate) fn read<T>(
    db: &Database,
    f: impl FnOnce(&ReadTransaction) -> Result<T, MlgateError>,
) -> Result<T, MlgateError> {
    let txn = db.begin_read().map_err(db_err)?;
    f(&txn)
}

// =============================================================================
// ROW ACCESS
// =============================================================================

/// Row reads shared by read and write transactions.
pub(crate) trait RowSource {
    /// Every row of a table, in id order.
    fn scan<T: DeserializeOwned>(&self, table: RowTable) -> Result<Vec<(u64, T)>, MlgateError>;

    fn get<T: DeserializeOwned>(&self, table: RowTable, id: u64) -> Result<Option<T>, MlgateError>;

    /// Row id indexed under `(parent_id, name)`.
    fn lookup(&self, index: NameIndex, parent_id: u64, name: &str) -> Result<Option<u64>, MlgateError>;

    /// `(name, id)` of every child of `parent_id`, in name order.
    fn children(&self, index: NameIndex, parent_id: u64) -> Result<Vec<(String, u64)>, MlgateError>;

    /// The rows of a table matching `keep`, in id order.
    fn scan_where<T: DeserializeOwned>(
        &self,
        table: RowTable,
        keep: impl Fn(&T) -> bool,
    ) -> Result<Vec<(u64, T)>, MlgateError> {
        Ok(self
            .scan::<T>(table)?
            .into_iter()
            .filter(|(_, row)| keep(row))
            .collect())
    }

    /// A row that must exist.
    fn require<T: DeserializeOwned>(&self, table: RowTable, id: u64) -> Result<T, MlgateError> {
        self.get(table, id)?.ok_or_else(|| {
            MlgateError::Backend(format!("dangling reference to {} row {id}", table.name()))
        })
    }
}

fn scan_in<T, Tb>(table: &Tb) -> Result<Vec<(u64, T)>, MlgateError>
where
    T: DeserializeOwned,
    Tb: ReadableTable<u64, &'static [u8]>,
{
    let mut rows = Vec::new();
    for entry in table.iter().map_err(db_err)? {
        let (key, value) = entry.map_err(db_err)?;
        rows.push((key.value(), decode(value.value())?));
    }
    Ok(rows)
}

fn get_in<T, Tb>(table: &Tb, id: u64) -> Result<Option<T>, MlgateError>
where
    T: DeserializeOwned,
    Tb: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id).map_err(db_err)? {
        Some(data) => Ok(Some(decode(data.value())?)),
        None => Ok(None),
    }
}

fn lookup_in<Tb>(index: &Tb, parent_id: u64, name: &str) -> Result<Option<u64>, MlgateError>
where
    Tb: ReadableTable<(u64, &'static str), u64>,
{
    Ok(index
        .get((parent_id, name))
        .map_err(db_err)?
        .map(|id| id.value()))
}

fn children_in<Tb>(index: &Tb, parent_id: u64) -> Result<Vec<(String, u64)>, MlgateError>
where
    Tb: ReadableTable<(u64, &'static str), u64>,
{
    let mut children = Vec::new();
    let end = parent_id.saturating_add(1);
    for entry in index.range((parent_id, "")..(end, "")).map_err(db_err)? {
        let (key, id) = entry.map_err(db_err)?;
        let (_parent, name) = key.value();
        children.push((name.to_string(), id.value()));
    }
    Ok(children)
}

impl RowSource for ReadTransaction {
    fn scan<T: DeserializeOwned>(&self, table: RowTable) -> Result<Vec<(u64, T)>, MlgateError> {
        let table = self.open_table(table).map_err(db_err)?;
        scan_in(&table)
    }

    fn get<T: DeserializeOwned>(&self, table: RowTable, id: u64) -> Result<Option<T>, MlgateError> {
        let table = self.open_table(table).map_err(db_err)?;
        get_in(&table, id)
    }

    fn lookup(&self, index: NameIndex, parent_id: u64, name: &str) -> Result<Option<u64>, MlgateError> {
        let index = self.open_table(index).map_err(db_err)?;
        lookup_in(&index, parent_id, name)
    }

    fn children(&self, index: NameIndex, parent_id: u64) -> Result<Vec<(String, u64)>, MlgateError> {
        let index = self.open_table(index).map_err(db_err)?;
        children_in(&index, parent_id)
    }
}

impl RowSource for WriteTransaction {
    fn scan<T: DeserializeOwned>(&self, table: RowTable) -> Result<Vec<(u64, T)>, MlgateError> {
        let table = self.open_table(table).map_err(db_err)?;
        scan_in(&table)
    }

    fn get<T: DeserializeOwned>(&self, table: RowTable, id: u64) -> Result<Option<T>, MlgateError> {
        let table = self.open_table(table).map_err(db_err)?;
        get_in(&table, id)
    }

    fn lookup(&self, index: NameIndex, parent_id: u64, name: &str) -> Result<Option<u64>, MlgateError> {
        let index = self.open_table(index).map_err(db_err)?;
        lookup_in(&index, parent_id, name)
    }

    fn children(&self, index: NameIndex, parent_id: u64) -> Result<Vec<(String, u64)>, MlgateError> {
        let index = self.open_table(index).map_err(db_err)?;
        children_in(&index, parent_id)
    }
}

/// Allocate the next surrogate id.
pub(crate) fn next_id(txn: &WriteTransaction) -> Result<u64, MlgateError> {
    let mut table = txn.open_table(METADATA).map_err(db_err)?;
    let current = table
        .get(NEXT_ROW_ID)
        .map_err(db_err)?
        .map(|v| v.value())
        .unwrap_or(1);
    table
        .insert(NEXT_ROW_ID, current.saturating_add(1))
        .map_err(db_err)?;
    Ok(current)
}

/// Insert a row under a fresh id.
pub(crate) fn insert_row<T: Serialize>(
    txn: &WriteTransaction,
    table: RowTable,
    row: &T,
) -> Result<u64, MlgateError> {
    let id = next_id(txn)?;
    update_row(txn, table, id, row)?;
    Ok(id)
}

/// Write a row under an existing id.
pub(crate) fn update_row<T: Serialize>(
    txn: &WriteTransaction,
    table: RowTable,
    id: u64,
    row: &T,
) -> Result<(), MlgateError> {
    let bytes = encode(row)?;
    let mut table = txn.open_table(table).map_err(db_err)?;
    table.insert(id, bytes.as_slice()).map_err(db_err)?;
    Ok(())
}

pub(crate) fn delete_row(txn: &WriteTransaction, table: RowTable, id: u64) -> Result<(), MlgateError> {
    let mut table = txn.open_table(table).map_err(db_err)?;
    table.remove(id).map_err(db_err)?;
    Ok(())
}

/// Record `id` under `(parent_id, name)`.
pub(crate) fn index_insert(
    txn: &WriteTransaction,
    index: NameIndex,
    parent_id: u64,
    name: &str,
    id: u64,
) -> Result<(), MlgateError> {
    let mut index = txn.open_table(index).map_err(db_err)?;
    index.insert((parent_id, name), id).map_err(db_err)?;
    Ok(())
}

pub(crate) fn index_remove(
    txn: &WriteTransaction,
    index: NameIndex,
    parent_id: u64,
    name: &str,
) -> Result<(), MlgateError> {
    let mut index = txn.open_table(index).map_err(db_err)?;
    index.remove((parent_id, name)).map_err(db_err)?;
    Ok(())
}

/// Delete the rows matching `keep` and return them.
pub(crate) fn delete_where<T: DeserializeOwned>(
    txn: &WriteTransaction,
    table: RowTable,
    keep: impl Fn(&T) -> bool,
) -> Result<Vec<(u64, T)>, MlgateError> {
    let rows = txn.scan_where(table, keep)?;
    for (id, _) in &rows {
        delete_row(txn, table, *id)?;
    }
    Ok(rows)
}

/// Id of a seeded reference row by name.
pub(crate) fn seed_id(src: &impl RowSource, table: RowTable, name: &str) -> Result<u64, MlgateError> {
    src.scan::<NameRow>(table)?
        .into_iter()
        .find(|(_, row)| row.name == name)
        .map(|(id, _)| id)
        .ok_or_else(|| MlgateError::Backend(format!("{} has no row '{name}'", table.name())))
}

/// Name of a seeded reference row by id.
pub(crate) fn seed_name(src: &impl RowSource, table: RowTable, id: u64) -> Result<String, MlgateError> {
    src.require::<NameRow>(table, id).map(|row| row.name)
}

// =============================================================================
// ARTIFACT DATABASE
// =============================================================================

/// Shared handle to a relational artifact database.
#[derive(Clone)]
pub struct RedbArtifacts {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbArtifacts").finish_non_exhaustive()
    }
}

impl RedbArtifacts {
    /// Open the database, create every table, fill empty indexes and seed
/// reference rows.
    pub fn open(location: &str) -> Result<Self, MlgateError> {
        let db = open_database(location)?;
        write(&db, |txn| {
            for table in ROW_TABLES {
                let _ = txn.open_table(table).map_err(db_err)?;
            }
            let _ = txn.open_table(METADATA).map_err(db_err)?;
            for index in INDEXES {
                let _ = txn.open_table(index).map_err(db_err)?;
            }
            artifacts::rebuild_indexes(txn)?;
            seed(txn, NC_PROBLEM_TYPE, ProblemType::ALL.iter().map(|p| p.as_str()))?;
            seed(
                txn,
                NC_DATA_CLASSIFICATION,
                DataClassification::ALL.iter().map(|c| c.as_str()),
            )?;
            Ok(())
        })?;
        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}

/// Populate a reference table once, when it is empty.
fn seed<'a>(
    txn: &WriteTransaction,
    table: RowTable,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), MlgateError> {
    let is_empty = txn.open_table(table).map_err(db_err)?.is_empty().map_err(db_err)?;
    if !is_empty {
        return Ok(());
    }
    let mut count = 0usize;
    for name in names {
        insert_row(txn, table, &NameRow { name: name.to_string() })?;
        count += 1;
    }
    info!(table = table.name(), rows = count, "seeded reference table");
    Ok(())
}

// =============================================================================
// DOCUMENT COLLECTIONS
// =============================================================================

/// Shared handle to a database of JSON document collections.
#[derive(Clone)]
pub struct RedbCollections {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbCollections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbCollections").finish_non_exhaustive()
    }
}

fn collection_table(name: &str) -> String {
    format!("collection_{name}")
}

impl RedbCollections {
    /// Open the database and create one table per collection.
    pub fn open(location: &str, collections: &[&str]) -> Result<Self, MlgateError> {
        let db = open_database(location)?;
        write(&db, |txn| {
            for collection in collections {
                let name = collection_table(collection);
                let def: TableDefinition<&str, &[u8]> = TableDefinition::new(&name);
                let _ = txn.open_table(def).map_err(db_err)?;
            }
            Ok(())
        })?;
        Ok(Self { db })
    }

    pub fn mapper<R: Resource>(&self, collection: &str) -> RedbCollectionMapper<R> {
        RedbCollectionMapper {
            db: Arc::clone(&self.db),
            table: collection_table(collection),
            _resource: PhantomData,
        }
    }
}

/// Mapper over one document collection. Keys list in sorted order.
pub struct RedbCollectionMapper<R> {
    db: Arc<Database>,
    table: String,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> RedbCollectionMapper<R> {
    fn def(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        TableDefinition::new(&self.table)
    }

    fn encode_doc(resource: &R) -> Result<Vec<u8>, MlgateError> {
        serde_json::to_vec(resource).map_err(|e| MlgateError::Serialization(e.to_string()))
    }

    fn decode_doc(bytes: &[u8]) -> Result<R, MlgateError> {
        serde_json::from_slice(bytes).map_err(|e| MlgateError::Serialization(e.to_string()))
    }

    fn get_doc<Tb>(table: &Tb, key: &str) -> Result<Option<R>, MlgateError>
    where
        Tb: ReadableTable<&'static str, &'static [u8]>,
    {
        match table.get(key).map_err(db_err)? {
            Some(data) => Ok(Some(Self::decode_doc(data.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace, requiring the key to be absent (`create`) or
    /// present (`edit`).
    fn put(&self, resource: R, must_exist: bool) -> Result<R, MlgateError> {
        let key = resource.key();
        let bytes = Self::encode_doc(&resource)?;
        write(&self.db, |txn| {
            let mut table = txn.open_table(self.def()).map_err(db_err)?;
            let exists = Self::get_doc(&table, &key)?.is_some();
            match (exists, must_exist) {
                (true, false) => return Err(MlgateError::already_exists(R::KIND, &key)),
                (false, true) => return Err(MlgateError::not_found(R::KIND, &key)),
                _ => {}
            }
            table.insert(key.as_str(), bytes.as_slice()).map_err(db_err)?;
            Ok(())
        })?;
        debug!(kind = R::KIND, key = %key, "redb put");
        Ok(resource)
    }
}

impl<R: Resource> ResourceMapper for RedbCollectionMapper<R> {
    type Resource = R;

    fn create(&mut self, resource: R) -> Result<R, MlgateError> {
        self.put(resource, false)
    }

    fn edit(&mut self, resource: R) -> Result<R, MlgateError> {
        self.put(resource, true)
    }

    fn read(&mut self, key: &str) -> Result<R, MlgateError> {
        read(&self.db, |txn| {
            let table = txn.open_table(self.def()).map_err(db_err)?;
            Self::get_doc(&table, key)?.ok_or_else(|| MlgateError::not_found(R::KIND, key))
        })
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        read(&self.db, |txn| {
            let table = txn.open_table(self.def()).map_err(db_err)?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(db_err)? {
                let (key, _) = entry.map_err(db_err)?;
                keys.push(key.value().to_string());
            }
            Ok(keys)
        })
    }

    fn delete(&mut self, key: &str) -> Result<R, MlgateError> {
        write(&self.db, |txn| {
            let mut table = txn.open_table(self.def()).map_err(db_err)?;
            let existing = Self::get_doc(&table, key)?
                .ok_or_else(|| MlgateError::not_found(R::KIND, key))?;
            table.remove(key).map_err(db_err)?;
            Ok(existing)
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
