//! Container and artifact mappers over the relational tables.
//!
//! Every mapper call runs in its own transaction. Deleting a container
//! removes its whole subtree, including every artifact row graph below it.
//!
//! Containers and artifact headers are found through `(parent id, name)`
//! indexes kept in the same transaction as the rows they point at.

use super::schema::{
    ARTIFACT_HEADER, ARTIFACT_INDEX, ArtifactHeaderRow, ContainerRow, MODEL, MODEL_INDEX,
    NAMESPACE, NAMESPACE_INDEX, NameIndex, RowTable, VERSION, VERSION_INDEX,
};
use super::{
    RedbArtifacts, RowSource, card, db_err, delete_row, evidence, index_insert, index_remove,
    insert_row, read, report, suite, update_row, write,
};
use crate::model::{Artifact, ArtifactBody, ArtifactHeader, ArtifactType, Context};
use crate::store::{Container, ResourceMapper};
use crate::MlgateError;
use redb::{ReadableTableMetadata, WriteTransaction};
use std::marker::PhantomData;
use tracing::debug;

// =============================================================================
// LOOKUP
// =============================================================================

fn require_container(
    src: &impl RowSource,
    index: NameIndex,
    kind: &str,
    parent_id: u64,
    name: &str,
) -> Result<u64, MlgateError> {
    src.lookup(index, parent_id, name)?
        .ok_or_else(|| MlgateError::not_found(kind, name))
}

fn namespace_id(src: &impl RowSource, namespace: &str) -> Result<u64, MlgateError> {
    require_container(src, NAMESPACE_INDEX, "namespace", 0, namespace)
}

fn model_id(src: &impl RowSource, namespace: &str, model: &str) -> Result<u64, MlgateError> {
    let ns = namespace_id(src, namespace)?;
    require_container(src, MODEL_INDEX, "model", ns, model)
}

fn version_id(src: &impl RowSource, ctx: &Context) -> Result<u64, MlgateError> {
    let m = model_id(src, &ctx.namespace, &ctx.model)?;
    require_container(src, VERSION_INDEX, "version", m, &ctx.version)
}

/// Fill any empty index from its row table. Databases written before the
/// indexes existed get them on first open.
pub(super) fn rebuild_indexes(txn: &WriteTransaction) -> Result<(), MlgateError> {
    let containers = [
        (NAMESPACE_INDEX, NAMESPACE),
        (MODEL_INDEX, MODEL),
        (VERSION_INDEX, VERSION),
    ];
    for (index, table) in containers {
        if index_is_empty(txn, index)? {
            for (id, row) in txn.scan::<ContainerRow>(table)? {
                index_insert(txn, index, row.parent_id, &row.name, id)?;
            }
        }
    }
    if index_is_empty(txn, ARTIFACT_INDEX)? {
        for (id, row) in txn.scan::<ArtifactHeaderRow>(ARTIFACT_HEADER)? {
            index_insert(txn, ARTIFACT_INDEX, row.version_id, &row.identifier, id)?;
        }
    }
    Ok(())
}

fn index_is_empty(txn: &WriteTransaction, index: NameIndex) -> Result<bool, MlgateError> {
    txn.open_table(index).map_err(db_err)?.is_empty().map_err(db_err)
}

// =============================================================================
// CASCADE
// =============================================================================

fn delete_body(
    txn: &WriteTransaction,
    header_id: u64,
    artifact_type: ArtifactType,
) -> Result<(), MlgateError> {
    match artifact_type {
        ArtifactType::NegotiationCard => card::delete(txn, header_id),
        ArtifactType::TestSuite => suite::delete_suite(txn, header_id),
        ArtifactType::Evidence => evidence::delete(txn, header_id),
        ArtifactType::TestResults => suite::delete_results(txn, header_id),
        ArtifactType::Report => report::delete(txn, header_id),
    }
}

/// Delete one artifact's header, body rows and index entry.
fn delete_artifact_rows(
    txn: &WriteTransaction,
    version_id: u64,
    identifier: &str,
    header_id: u64,
    artifact_type: ArtifactType,
) -> Result<(), MlgateError> {
    delete_body(txn, header_id, artifact_type)?;
    delete_row(txn, ARTIFACT_HEADER, header_id)?;
    index_remove(txn, ARTIFACT_INDEX, version_id, identifier)
}

fn delete_artifacts_of(txn: &WriteTransaction, version_id: u64) -> Result<(), MlgateError> {
    for (identifier, header_id) in txn.children(ARTIFACT_INDEX, version_id)? {
        let header = txn.require::<ArtifactHeaderRow>(ARTIFACT_HEADER, header_id)?;
        delete_artifact_rows(txn, version_id, &identifier, header_id, header.artifact_type.parse()?)?;
    }
    Ok(())
}

/// Delete every child container row of `parent_id` and return their ids.
fn delete_containers_of(
    txn: &WriteTransaction,
    index: NameIndex,
    table: RowTable,
    parent_id: u64,
) -> Result<Vec<u64>, MlgateError> {
    let children = txn.children(index, parent_id)?;
    for (name, id) in &children {
        delete_row(txn, table, *id)?;
        index_remove(txn, index, parent_id, name)?;
    }
    Ok(children.into_iter().map(|(_, id)| id).collect())
}

fn delete_versions_of(txn: &WriteTransaction, model_id: u64) -> Result<(), MlgateError> {
    for id in delete_containers_of(txn, VERSION_INDEX, VERSION, model_id)? {
        delete_artifacts_of(txn, id)?;
    }
    Ok(())
}

fn delete_models_of(txn: &WriteTransaction, namespace_id: u64) -> Result<(), MlgateError> {
    for id in delete_containers_of(txn, MODEL_INDEX, MODEL, namespace_id)? {
        delete_versions_of(txn, id)?;
    }
    Ok(())
}

// =============================================================================
// CONTAINER MAPPER
// =============================================================================

#[derive(Debug, Clone)]
enum Level {
    Namespace,
    Model { namespace: String },
    Version { namespace: String, model: String },
}

impl Level {
    fn table(&self) -> RowTable {
        match self {
            Self::Namespace => NAMESPACE,
            Self::Model { .. } => MODEL,
            Self::Version { .. } => VERSION,
        }
    }

    fn index(&self) -> NameIndex {
        match self {
            Self::Namespace => NAMESPACE_INDEX,
            Self::Model { .. } => MODEL_INDEX,
            Self::Version { .. } => VERSION_INDEX,
        }
    }

    fn parent_id(&self, src: &impl RowSource) -> Result<u64, MlgateError> {
        match self {
            Self::Namespace => Ok(0),
            Self::Model { namespace } => namespace_id(src, namespace),
            Self::Version { namespace, model } => model_id(src, namespace, model),
        }
    }

    fn delete_children(&self, txn: &WriteTransaction, id: u64) -> Result<(), MlgateError> {
        match self {
            Self::Namespace => delete_models_of(txn, id),
            Self::Model { .. } => delete_versions_of(txn, id),
            Self::Version { .. } => delete_artifacts_of(txn, id),
        }
    }
}

/// Mapper over namespaces, the models of a namespace, or the versions of a
/// model. Names list in sorted order.
pub struct RedbContainerMapper<R> {
    store: RedbArtifacts,
    level: Level,
    _resource: PhantomData<fn() -> R>,
}

impl RedbArtifacts {
    pub fn namespace_mapper<R: Container>(&self) -> RedbContainerMapper<R> {
        RedbContainerMapper::new(self.clone(), Level::Namespace)
    }

    pub fn model_mapper<R: Container>(&self, namespace: &str) -> RedbContainerMapper<R> {
        RedbContainerMapper::new(
            self.clone(),
            Level::Model {
                namespace: namespace.to_string(),
            },
        )
    }

    pub fn version_mapper<R: Container>(&self, namespace: &str, model: &str) -> RedbContainerMapper<R> {
        RedbContainerMapper::new(
            self.clone(),
            Level::Version {
                namespace: namespace.to_string(),
                model: model.to_string(),
            },
        )
    }

    pub fn artifact_mapper(&self, ctx: &Context) -> RedbArtifactMapper {
        RedbArtifactMapper {
            store: self.clone(),
            ctx: ctx.clone(),
        }
    }
}

impl<R: Container> RedbContainerMapper<R> {
    fn new(store: RedbArtifacts, level: Level) -> Self {
        Self {
            store,
            level,
            _resource: PhantomData,
        }
    }
}

impl<R: Container> ResourceMapper for RedbContainerMapper<R> {
    type Resource = R;

    fn create(&mut self, resource: R) -> Result<R, MlgateError> {
        let name = resource.key();
        write(self.store.db(), |txn| {
            let parent_id = self.level.parent_id(txn)?;
            if txn.lookup(self.level.index(), parent_id, &name)?.is_some() {
                return Err(MlgateError::already_exists(R::KIND, &name));
            }
            let id = insert_row(
                txn,
                self.level.table(),
                &ContainerRow {
                    name: name.clone(),
                    parent_id,
                },
            )?;
            index_insert(txn, self.level.index(), parent_id, &name, id)
        })?;
        debug!(kind = R::KIND, key = %name, "redb create");
        Ok(resource)
    }

    fn edit(&mut self, resource: R) -> Result<R, MlgateError> {
        self.read(&resource.key())?;
        Ok(resource)
    }

    fn read(&mut self, key: &str) -> Result<R, MlgateError> {
        read(self.store.db(), |txn| {
            let parent_id = self.level.parent_id(txn)?;
            require_container(txn, self.level.index(), R::KIND, parent_id, key)
        })?;
        R::from_identifier(key)
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        read(self.store.db(), |txn| {
            let parent_id = self.level.parent_id(txn)?;
            Ok(txn
                .children(self.level.index(), parent_id)?
                .into_iter()
                .map(|(name, _)| name)
                .collect())
        })
    }

    fn delete(&mut self, key: &str) -> Result<R, MlgateError> {
        write(self.store.db(), |txn| {
            let parent_id = self.level.parent_id(txn)?;
            let id = require_container(txn, self.level.index(), R::KIND, parent_id, key)?;
            self.level.delete_children(txn, id)?;
            delete_row(txn, self.level.table(), id)?;
            index_remove(txn, self.level.index(), parent_id, key)
        })?;
        debug!(kind = R::KIND, key = %key, "redb delete (cascade)");
        R::from_identifier(key)
    }
}

// =============================================================================
// ARTIFACT MAPPER
// =============================================================================

/// Mapper over the artifacts of one version. Identifiers list in sorted
/// order.
pub struct RedbArtifactMapper {
    store: RedbArtifacts,
    ctx: Context,
}

pub(super) fn find_header(
    src: &impl RowSource,
    version_id: u64,
    identifier: &str,
) -> Result<Option<(u64, ArtifactHeaderRow)>, MlgateError> {
    match src.lookup(ARTIFACT_INDEX, version_id, identifier)? {
        Some(header_id) => Ok(Some((header_id, src.require(ARTIFACT_HEADER, header_id)?))),
        None => Ok(None),
    }
}

fn header_row(header: &ArtifactHeader, version_id: u64) -> ArtifactHeaderRow {
    ArtifactHeaderRow {
        identifier: header.identifier.clone(),
        artifact_type: header.artifact_type.as_str().to_string(),
        timestamp: header.timestamp,
        creator: header.creator.clone(),
        version_id,
    }
}

fn insert_body(
    txn: &WriteTransaction,
    header_id: u64,
    version_id: u64,
    body: &ArtifactBody,
) -> Result<(), MlgateError> {
    match body {
        ArtifactBody::NegotiationCard(c) => card::insert(txn, header_id, c)?,
        ArtifactBody::TestSuite(s) => suite::insert_suite(txn, header_id, s)?,
        ArtifactBody::Evidence(e) => evidence::insert(txn, header_id, e)?,
        ArtifactBody::TestResults(r) => suite::insert_results(txn, header_id, version_id, r)?,
        ArtifactBody::Report(r) => report::insert(txn, header_id, r)?,
    };
    Ok(())
}

fn load_artifact(
    src: &impl RowSource,
    header_id: u64,
    row: ArtifactHeaderRow,
) -> Result<Artifact, MlgateError> {
    let artifact_type: ArtifactType = row.artifact_type.parse()?;
    let body = match artifact_type {
        ArtifactType::NegotiationCard => ArtifactBody::NegotiationCard(card::load(src, header_id)?),
        ArtifactType::TestSuite => ArtifactBody::TestSuite(suite::load_suite(src, header_id)?),
        ArtifactType::Evidence => ArtifactBody::Evidence(evidence::load(src, header_id)?),
        ArtifactType::TestResults => ArtifactBody::TestResults(suite::load_results(src, header_id)?),
        ArtifactType::Report => ArtifactBody::Report(report::load(src, header_id)?),
    };
    let header = ArtifactHeader {
        identifier: row.identifier,
        artifact_type,
        timestamp: row.timestamp,
        creator: row.creator,
    };
    Artifact::new(header, body)
}

impl ResourceMapper for RedbArtifactMapper {
    type Resource = Artifact;

    fn create(&mut self, artifact: Artifact) -> Result<Artifact, MlgateError> {
        write(self.store.db(), |txn| {
            let version_id = version_id(txn, &self.ctx)?;
            if find_header(txn, version_id, artifact.identifier())?.is_some() {
                return Err(MlgateError::already_exists("artifact", artifact.identifier()));
            }
            let header_id =
                insert_row(txn, ARTIFACT_HEADER, &header_row(artifact.header(), version_id))?;
            index_insert(txn, ARTIFACT_INDEX, version_id, artifact.identifier(), header_id)?;
            insert_body(txn, header_id, version_id, artifact.body())
        })?;
        debug!(context = %self.ctx, identifier = artifact.identifier(), "redb create artifact");
        Ok(artifact)
    }

    fn edit(&mut self, artifact: Artifact) -> Result<Artifact, MlgateError> {
        write(self.store.db(), |txn| {
            let version_id = version_id(txn, &self.ctx)?;
            let (header_id, old) = find_header(txn, version_id, artifact.identifier())?
                .ok_or_else(|| MlgateError::not_found("artifact", artifact.identifier()))?;
            delete_body(txn, header_id, old.artifact_type.parse()?)?;
            update_row(txn, ARTIFACT_HEADER, header_id, &header_row(artifact.header(), version_id))?;
            insert_body(txn, header_id, version_id, artifact.body())
        })?;
        Ok(artifact)
    }

    fn read(&mut self, key: &str) -> Result<Artifact, MlgateError> {
        read(self.store.db(), |txn| {
            let version_id = version_id(txn, &self.ctx)?;
            let (header_id, row) = find_header(txn, version_id, key)?
                .ok_or_else(|| MlgateError::not_found("artifact", key))?;
            load_artifact(txn, header_id, row)
        })
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        read(self.store.db(), |txn| {
            let version_id = version_id(txn, &self.ctx)?;
            Ok(txn
                .children(ARTIFACT_INDEX, version_id)?
                .into_iter()
                .map(|(identifier, _)| identifier)
                .collect())
        })
    }

    fn delete(&mut self, key: &str) -> Result<Artifact, MlgateError> {
        write(self.store.db(), |txn| {
            let version_id = version_id(txn, &self.ctx)?;
            let (header_id, row) = find_header(txn, version_id, key)?
                .ok_or_else(|| MlgateError::not_found("artifact", key))?;
            let artifact = load_artifact(txn, header_id, row)?;
            delete_artifact_rows(txn, version_id, key, header_id, artifact.artifact_type())?;
            Ok(artifact)
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
    use crate::model::{EvidenceMetadata, EvidenceValue, Model, Namespace, Report, Version};
    use crate::primitives::IN_MEMORY_LOCATION;
    use crate::storage::redb::db_err;
    use crate::storage::redb::schema::{EVIDENCE, INDEXES, REPORT};
    use redb::{ReadableTableMetadata, TableHandle};

    fn store_with_version() -> (RedbArtifacts, Context) {
        let store = RedbArtifacts::open(IN_MEMORY_LOCATION).unwrap();
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
        (store, Context::new("ns", "m", "v1").unwrap())
    }

    fn index_len(store: &RedbArtifacts, index: NameIndex) -> u64 {
        read(store.db(), |txn| {
            let index = txn.open_table(index).map_err(db_err)?;
            index.len().map_err(db_err)
        })
        .unwrap()
    }

    fn row_count(store: &RedbArtifacts, table: RowTable) -> u64 {
        read(store.db(), |txn| {
            let table = txn.open_table(table).map_err(db_err)?;
            table.len().map_err(db_err)
        })
        .unwrap()
    }

    #[test]
    fn same_name_under_different_parents() {
        let (store, _) = store_with_version();
        store
            .namespace_mapper::<Namespace>()
            .create(Namespace::new("other").unwrap())
            .unwrap();
        store
            .model_mapper::<Model>("other")
            .create(Model::new("m").unwrap())
            .unwrap();
        let err = store
            .model_mapper::<Model>("ns")
            .create(Model::new("m").unwrap())
            .unwrap_err();
        assert_eq!(err, MlgateError::already_exists("model", "m"));
    }

    #[test]
    fn missing_ancestor_is_not_found() {
        let store = RedbArtifacts::open(IN_MEMORY_LOCATION).unwrap();
        let err = store
            .version_mapper::<Version>("ns", "m")
            .list()
            .unwrap_err();
        assert_eq!(err, MlgateError::not_found("namespace", "ns"));
    }

    #[test]
    fn edit_replaces_body_rows() {
        let (store, ctx) = store_with_version();
        let mut artifacts = store.artifact_mapper(&ctx);
        let metadata = EvidenceMetadata::new("tc-1", "accuracy");
        let first = EvidenceValue::Real(0.5).with_metadata(metadata.clone());
        let second = EvidenceValue::Real(0.9).with_metadata(metadata);
        artifacts
            .create(Artifact::from_body("e", ArtifactBody::Evidence(first)).unwrap())
            .unwrap();
        let edited = Artifact::from_body("e", ArtifactBody::Evidence(second)).unwrap();
        artifacts.edit(edited.clone()).unwrap();

        assert_eq!(artifacts.read("e").unwrap(), edited);
        assert_eq!(row_count(&store, EVIDENCE), 1);
    }

    #[test]
    fn deleting_namespace_removes_every_row_below() {
        let (store, ctx) = store_with_version();
        store
            .artifact_mapper(&ctx)
            .create(Artifact::from_body("r", ArtifactBody::Report(Report::default())).unwrap())
            .unwrap();
        store
            .namespace_mapper::<Namespace>()
            .delete("ns")
            .unwrap();

        for table in [NAMESPACE, MODEL, VERSION, ARTIFACT_HEADER, REPORT] {
            assert_eq!(row_count(&store, table), 0, "{}", table.name());
        }
        for index in INDEXES {
            assert_eq!(index_len(&store, index), 0, "{}", index.name());
        }
    }

    #[test]
    fn index_tracks_create_and_delete() {
        let (store, ctx) = store_with_version();
        let mut artifacts = store.artifact_mapper(&ctx);
        for id in ["b", "a", "c"] {
            artifacts
                .create(Artifact::from_body(id, ArtifactBody::Report(Report::default())).unwrap())
                .unwrap();
        }
        assert_eq!(index_len(&store, ARTIFACT_INDEX), 3);
        assert_eq!(artifacts.list().unwrap(), vec!["a", "b", "c"]);

        artifacts.delete("b").unwrap();
        assert_eq!(index_len(&store, ARTIFACT_INDEX), 2);
        assert!(matches!(artifacts.read("b"), Err(MlgateError::NotFound(_))));
        assert_eq!(artifacts.list().unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn missing_indexes_are_rebuilt_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.redb");
        let location = path.to_str().unwrap();
        let ctx = Context::new("ns", "m", "v1").unwrap();
        let report = Artifact::from_body("r", ArtifactBody::Report(Report::default())).unwrap();
        {
            let store = RedbArtifacts::open(location).unwrap();
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
            store.artifact_mapper(&ctx).create(report.clone()).unwrap();
            write(store.db(), |txn| {
                for index in INDEXES {
                    txn.delete_table(index).map_err(db_err)?;
                }
                Ok(())
            })
            .unwrap();
        }

        let store = RedbArtifacts::open(location).unwrap();
        assert_eq!(store.artifact_mapper(&ctx).read("r").unwrap(), report);
        assert_eq!(store.version_mapper::<Version>("ns", "m").list().unwrap(), vec!["v1"]);
    }
}
