//! # Artifact Store
//!
//! The namespace -> model -> version -> artifact hierarchy on any backend.
//!
//! ```text
//! ArtifactStore ──session()──▶ ArtifactSession ──┬─ namespace_mapper()
//!   (Arc-shared handle)        (closed on drop)  ├─ model_mapper(ns)
//!                                                ├─ version_mapper(ns, m)
//!                                                └─ artifact_mapper(ctx)
//! ```
//!
//! The session conveniences (`write_artifact`, `read_artifact`, ...) and the
//! [`Persistable`] trait are thin layers over those four mappers.

use crate::model::{
    Artifact, ArtifactBody, ArtifactType, Context, Evidence, Model, Namespace, NegotiationCard,
    Report, Version,
};
use crate::primitives::ARTIFACT_FOLDER;
use crate::query::Query;
use crate::storage::fs::{FileSystemStorage, FsContainerMapper, FsDocumentMapper, Parent};
#[cfg(feature = "remote")]
use crate::storage::http::{self, HttpClient};
use crate::storage::memory::MemoryArtifacts;
use crate::storage::redb::RedbArtifacts;
use crate::store::{BoxedMapper, SessionState};
use crate::uri::{StoreType, StoreUri};
use crate::validation::{TestResults, TestSuite};
use crate::MlgateError;
use crate::types::check_identifier;
use tracing::{debug, info, warn};

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Clone)]
enum ArtifactBackend {
    InMemory(MemoryArtifacts),
    FileSystem(FileSystemStorage),
    Relational(RedbArtifacts),
    #[cfg(feature = "remote")]
    Remote(HttpClient),
}

/// A shareable handle to one artifact store.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    uri: StoreUri,
    backend: ArtifactBackend,
}

/// Open the artifact store a URI selects.
pub fn create_artifact_store(uri: &str) -> Result<ArtifactStore, MlgateError> {
    ArtifactStore::open(&StoreUri::parse(uri)?, None)
}

impl ArtifactStore {
    /// Open a store; `token` authenticates against a remote store.
    pub fn open(uri: &StoreUri, token: Option<&str>) -> Result<Self, MlgateError> {
        let backend = match uri.store_type {
            StoreType::LocalMemory => ArtifactBackend::InMemory(MemoryArtifacts::new()),
            StoreType::LocalFilesystem => ArtifactBackend::FileSystem(FileSystemStorage::open(
                uri.as_path(),
                ARTIFACT_FOLDER,
            )?),
            StoreType::RelationalDb => ArtifactBackend::Relational(RedbArtifacts::open(&uri.path)?),
            #[cfg(feature = "remote")]
            StoreType::RemoteHttp => {
                ArtifactBackend::Remote(HttpClient::new(&uri.path, token.map(str::to_string)))
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
        info!(uri = %uri.uri, backend = %uri.store_type, "opened artifact store");
        Ok(Self {
            uri: uri.clone(),
            backend,
        })
    }

    pub fn uri(&self) -> &StoreUri {
        &self.uri
    }

    /// Start a session.
    pub fn session(&self) -> ArtifactSession {
        ArtifactSession {
            store: self.clone(),
            state: SessionState::default(),
        }
    }

    /// Run `f` in a session that is closed on every exit path.
    pub fn with_session<T>(
        &self,
        f: impl FnOnce(&mut ArtifactSession) -> Result<T, MlgateError>,
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

/// How [`ArtifactSession::write_artifact`] treats existing data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Replace an artifact that already exists.
    pub force: bool,
    /// Create missing namespace, model and version first.
    pub parents: bool,
}

impl WriteOptions {
    pub fn force() -> Self {
        Self {
            force: true,
            parents: false,
        }
    }

    pub fn with_parents(mut self) -> Self {
        self.parents = true;
        self
    }
}

/// A container key that is not a valid identifier names nothing.
fn known_container(kind: &str, key: &str) -> Result<(), MlgateError> {
    check_identifier(kind, key).map_err(|_| MlgateError::not_found(kind, key))
}

/// A unit of work against an [`ArtifactStore`].
pub struct ArtifactSession {
    store: ArtifactStore,
    state: SessionState,
}

impl ArtifactSession {
    const KIND: &'static str = "artifact";

    pub fn namespace_mapper(&self) -> Result<BoxedMapper<Namespace>, MlgateError> {
        self.state.ensure_open(Self::KIND)?;
        Ok(match &self.store.backend {
            ArtifactBackend::InMemory(s) => Box::new(s.namespace_mapper::<Namespace>()),
            ArtifactBackend::FileSystem(s) => {
                Box::new(FsContainerMapper::<Namespace>::new(s, "", Vec::new()))
            }
            ArtifactBackend::Relational(s) => Box::new(s.namespace_mapper::<Namespace>()),
            #[cfg(feature = "remote")]
            ArtifactBackend::Remote(c) => Box::new(c.mapper::<Namespace>(http::namespaces_path())),
        })
    }

    pub fn model_mapper(&self, namespace: &str) -> Result<BoxedMapper<Model>, MlgateError> {
        self.state.ensure_open(Self::KIND)?;
        known_container(Namespace::KIND, namespace)?;
        Ok(match &self.store.backend {
            ArtifactBackend::InMemory(s) => Box::new(s.model_mapper::<Model>(namespace)),
            ArtifactBackend::FileSystem(s) => Box::new(FsContainerMapper::<Model>::new(
                s,
                namespace,
                vec![Parent::new("namespace", namespace)],
            )),
            ArtifactBackend::Relational(s) => Box::new(s.model_mapper::<Model>(namespace)),
            #[cfg(feature = "remote")]
            ArtifactBackend::Remote(c) => Box::new(c.mapper::<Model>(http::models_path(namespace))),
        })
    }

    pub fn version_mapper(
        &self,
        namespace: &str,
        model: &str,
    ) -> Result<BoxedMapper<Version>, MlgateError> {
        self.state.ensure_open(Self::KIND)?;
        known_container(Namespace::KIND, namespace)?;
        known_container(Model::KIND, model)?;
        Ok(match &self.store.backend {
            ArtifactBackend::InMemory(s) => Box::new(s.version_mapper::<Version>(namespace, model)),
            ArtifactBackend::FileSystem(s) => Box::new(FsContainerMapper::<Version>::new(
                s,
                format!("{namespace}/{model}"),
                vec![Parent::new("namespace", namespace), Parent::new("model", model)],
            )),
            ArtifactBackend::Relational(s) => {
                Box::new(s.version_mapper::<Version>(namespace, model))
            }
            #[cfg(feature = "remote")]
            ArtifactBackend::Remote(c) => {
                Box::new(c.mapper::<Version>(http::versions_path(namespace, model)))
            }
        })
    }

    pub fn artifact_mapper(&self, ctx: &Context) -> Result<BoxedMapper<Artifact>, MlgateError> {
        self.state.ensure_open(Self::KIND)?;
        known_container(Namespace::KIND, &ctx.namespace)?;
        known_container(Model::KIND, &ctx.model)?;
        known_container(Version::KIND, &ctx.version)?;
        Ok(match &self.store.backend {
            ArtifactBackend::InMemory(s) => Box::new(s.artifact_mapper(ctx)),
            ArtifactBackend::FileSystem(s) => Box::new(FsDocumentMapper::<Artifact>::new(
                s,
                ctx.to_string(),
                vec![
                    Parent::new("namespace", &ctx.namespace),
                    Parent::new("model", &ctx.model),
                    Parent::new("version", &ctx.version),
                ],
            )),
            ArtifactBackend::Relational(s) => Box::new(s.artifact_mapper(ctx)),
            #[cfg(feature = "remote")]
            ArtifactBackend::Remote(c) => Box::new(c.mapper::<Artifact>(http::artifacts_path(
                &ctx.namespace,
                &ctx.model,
                &ctx.version,
            ))),
        })
    }

    // -------------------------------------------------------------------------
    // Conveniences
    // -------------------------------------------------------------------------

    /// Create whichever of the context's namespace, model and version are
    /// missing. Existing containers are left alone.
    pub fn create_context(&self, ctx: &Context) -> Result<(), MlgateError> {
        let mut namespaces = self.namespace_mapper()?;
        if !namespaces.exists(&ctx.namespace)? {
            namespaces.create(Namespace::new(&ctx.namespace)?)?;
        }
        let mut models = self.model_mapper(&ctx.namespace)?;
        if !models.exists(&ctx.model)? {
            models.create(Model::new(&ctx.model)?)?;
        }
        let mut versions = self.version_mapper(&ctx.namespace, &ctx.model)?;
        if !versions.exists(&ctx.version)? {
            versions.create(Version::new(&ctx.version)?)?;
        }
        debug!(context = %ctx, "context ready");
        Ok(())
    }

    /// Store an artifact under a context.
    ///
    /// Fails with `AlreadyExists` unless `options.force` is set, and with
    /// `NotFound` for a missing container unless `options.parents` is set.
    pub fn write_artifact(
        &self,
        ctx: &Context,
        artifact: Artifact,
        options: WriteOptions,
    ) -> Result<Artifact, MlgateError> {
        if options.parents {
            self.create_context(ctx)?;
        }
        let mut artifacts = self.artifact_mapper(ctx)?;
        if options.force && artifacts.exists(artifact.identifier())? {
            return artifacts.edit(artifact);
        }
        artifacts.create(artifact)
    }

    pub fn read_artifact(&self, ctx: &Context, identifier: &str) -> Result<Artifact, MlgateError> {
        self.artifact_mapper(ctx)?.read(identifier)
    }

    pub fn list_artifacts(&self, ctx: &Context) -> Result<Vec<String>, MlgateError> {
        self.artifact_mapper(ctx)?.list()
    }

    pub fn delete_artifact(&self, ctx: &Context, identifier: &str) -> Result<Artifact, MlgateError> {
        self.artifact_mapper(ctx)?.delete(identifier)
    }

    pub fn search_artifacts(&self, ctx: &Context, query: &Query) -> Result<Vec<Artifact>, MlgateError> {
        self.artifact_mapper(ctx)?.search(query)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Close the session. Closing twice is a no-op.
    ///
    /// Fails when the backing location disappeared while the session was
    /// open.
    pub fn close(&mut self) -> Result<(), MlgateError> {
        if !self.state.mark_closed() {
            return Ok(());
        }
        if let ArtifactBackend::FileSystem(storage) = &self.store.backend
            && !storage.sub_folder().is_dir()
        {
            return Err(MlgateError::Backend(format!(
                "store folder '{}' vanished",
                storage.sub_folder().display()
            )));
        }
        debug!(uri = %self.store.uri.uri, "artifact session closed");
        Ok(())
    }
}

impl Drop for ArtifactSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(uri = %self.store.uri.uri, error = %e, "failed to close artifact session");
        }
    }
}

// =============================================================================
// PERSISTABLE
// =============================================================================

/// A model that is stored as the body of an artifact.
pub trait Persistable: Sized {
    const ARTIFACT_TYPE: ArtifactType;

    /// Identifier used when none is given.
    fn default_identifier(&self) -> String;

    /// Identifier [`Persistable::load_with`] reads, when the type has a
    /// fixed one.
    fn fixed_identifier() -> Option<&'static str>;

    fn to_body(&self) -> ArtifactBody;

    fn from_body(body: ArtifactBody) -> Option<Self>;

    /// Save under the default identifier, failing if it exists.
    fn save_with(&self, ctx: &Context, store: &ArtifactStore) -> Result<Artifact, MlgateError> {
        self.save_with_options(ctx, store, &self.default_identifier(), WriteOptions::default())
    }

    fn save_with_options(
        &self,
        ctx: &Context,
        store: &ArtifactStore,
        identifier: &str,
        options: WriteOptions,
    ) -> Result<Artifact, MlgateError> {
        let artifact = Artifact::from_body(identifier, self.to_body())?;
        store.with_session(|s| s.write_artifact(ctx, artifact, options))
    }

    /// Load from the fixed default identifier.
    fn load_with(ctx: &Context, store: &ArtifactStore) -> Result<Self, MlgateError> {
        let identifier = Self::fixed_identifier().ok_or_else(|| {
            MlgateError::Validation(format!(
                "{} has no fixed identifier; load it by identifier",
                Self::ARTIFACT_TYPE
            ))
        })?;
        Self::load_as(ctx, store, identifier)
    }

    /// Load from an explicit identifier, checking the artifact type.
    fn load_as(ctx: &Context, store: &ArtifactStore, identifier: &str) -> Result<Self, MlgateError> {
        let artifact = store.with_session(|s| s.read_artifact(ctx, identifier))?;
        let found = artifact.artifact_type();
        let (_, body) = artifact.into_parts();
        Self::from_body(body).ok_or_else(|| {
            MlgateError::Validation(format!(
                "artifact '{identifier}' is a {found}, not a {}",
                Self::ARTIFACT_TYPE
            ))
        })
    }
}

impl Persistable for NegotiationCard {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::NegotiationCard;

    fn default_identifier(&self) -> String {
        Self::DEFAULT_ID.to_string()
    }

    fn fixed_identifier() -> Option<&'static str> {
        Some(Self::DEFAULT_ID)
    }

    fn to_body(&self) -> ArtifactBody {
        ArtifactBody::NegotiationCard(self.clone())
    }

    fn from_body(body: ArtifactBody) -> Option<Self> {
        match body {
            ArtifactBody::NegotiationCard(card) => Some(card),
            _ => None,
        }
    }
}

impl Persistable for TestSuite {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::TestSuite;

    fn default_identifier(&self) -> String {
        Self::DEFAULT_ID.to_string()
    }

    fn fixed_identifier() -> Option<&'static str> {
        Some(Self::DEFAULT_ID)
    }

    fn to_body(&self) -> ArtifactBody {
        ArtifactBody::TestSuite(self.clone())
    }

    fn from_body(body: ArtifactBody) -> Option<Self> {
        match body {
            ArtifactBody::TestSuite(suite) => Some(suite),
            _ => None,
        }
    }
}

impl Persistable for TestResults {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::TestResults;

    fn default_identifier(&self) -> String {
        Self::DEFAULT_ID.to_string()
    }

    fn fixed_identifier() -> Option<&'static str> {
        Some(Self::DEFAULT_ID)
    }

    fn to_body(&self) -> ArtifactBody {
        ArtifactBody::TestResults(self.clone())
    }

    fn from_body(body: ArtifactBody) -> Option<Self> {
        match body {
            ArtifactBody::TestResults(results) => Some(results),
            _ => None,
        }
    }
}

impl Persistable for Report {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::Report;

    fn default_identifier(&self) -> String {
        Self::DEFAULT_ID.to_string()
    }

    fn fixed_identifier() -> Option<&'static str> {
        Some(Self::DEFAULT_ID)
    }

    fn to_body(&self) -> ArtifactBody {
        ArtifactBody::Report(self.clone())
    }

    fn from_body(body: ArtifactBody) -> Option<Self> {
        match body {
            ArtifactBody::Report(report) => Some(report),
            _ => None,
        }
    }
}

/// Evidence is keyed by its test case: `evidence.<test_case_id>`.
impl Persistable for Evidence {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::Evidence;

    fn default_identifier(&self) -> String {
        Evidence::default_identifier(self)
    }

    fn fixed_identifier() -> Option<&'static str> {
        None
    }

    fn to_body(&self) -> ArtifactBody {
        ArtifactBody::Evidence(self.clone())
    }

    fn from_body(body: ArtifactBody) -> Option<Self> {
        match body {
            ArtifactBody::Evidence(evidence) => Some(evidence),
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::model::{EvidenceMetadata, EvidenceValue};
    use tempfile::tempdir;

    fn ctx() -> Context {
        Context::new("ns", "m", "v1").unwrap()
    }

    #[test]
    fn create_context_is_idempotent() {
        let store = create_artifact_store("memory://").unwrap();
        store
            .with_session(|s| {
                s.create_context(&ctx())?;
                s.create_context(&ctx())?;
                assert_eq!(s.namespace_mapper()?.list()?, vec!["ns"]);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn write_requires_parents_unless_asked() {
        let store = create_artifact_store("memory://").unwrap();
        let session = store.session();
        let report = Artifact::from_body("r", ArtifactBody::Report(Report::default())).unwrap();

        let err = session
            .write_artifact(&ctx(), report.clone(), WriteOptions::default())
            .unwrap_err();
        assert_eq!(err, MlgateError::not_found("namespace", "ns"));

        let options = WriteOptions::default().with_parents();
        session.write_artifact(&ctx(), report.clone(), options).unwrap();
        assert!(matches!(
            session.write_artifact(&ctx(), report.clone(), options),
            Err(MlgateError::AlreadyExists(_))
        ));
        session
            .write_artifact(&ctx(), report, WriteOptions::force())
            .unwrap();
    }

    #[test]
    fn closed_session_refuses_work() {
        let store = create_artifact_store("memory://").unwrap();
        let mut session = store.session();
        session.close().unwrap();
        session.close().unwrap();
        assert!(session.is_closed());
        assert!(matches!(
            session.namespace_mapper(),
            Err(MlgateError::Validation(_))
        ));
    }

    #[test]
    fn evidence_needs_an_explicit_identifier_to_load() {
        let dir = tempdir().expect("temp dir");
        let store = create_artifact_store(&format!("fs://{}", dir.path().display())).unwrap();
        store.with_session(|s| s.create_context(&ctx())).unwrap();

        let evidence = EvidenceValue::Integer(3).with_metadata(EvidenceMetadata::new("T1", "count"));
        evidence.save_with(&ctx(), &store).unwrap();
        assert!(dir.path().join("artifacts/ns/m/v1/evidence.T1.json").is_file());

        assert!(matches!(
            Evidence::load_with(&ctx(), &store),
            Err(MlgateError::Validation(_))
        ));
        assert_eq!(Evidence::load_as(&ctx(), &store, "evidence.T1").unwrap(), evidence);
        assert!(matches!(
            Report::load_as(&ctx(), &store, "evidence.T1"),
            Err(MlgateError::Validation(_))
        ));
    }
}
