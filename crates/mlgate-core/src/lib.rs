//! # mlgate-core
//!
//! Evidence-based governance for machine-learning models - THE LOGIC.
//!
//! This crate captures measurements as evidence, checks them against the
//! conditions of a test suite, and persists every step as versioned
//! artifacts in a pluggable store.
//!
//! ## Layout
//!
//! - `model`: artifacts and the namespace -> model -> version hierarchy
//! - `query`: composable filters usable against any store
//! - `store`: the resource-mapper contract, sessions and the four stores
//! - `storage`: memory, filesystem, redb and HTTP backends
//! - `validation`: test suites, validators and the suite validator
//!
//! ## Constraints
//!
//! - Synchronous: every operation blocks the calling thread
//! - No global state: stores are explicit values
//! - Every backend honours the same mapper contract

// =============================================================================
// MODULES
// =============================================================================

pub mod model;
pub mod primitives;
pub mod query;
pub mod storage;
pub mod store;
pub mod types;
pub mod uri;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{MlgateError, check_finite, check_identifier};
pub use uri::{StoreType, StoreUri};

// =============================================================================
// RE-EXPORTS: Model
// =============================================================================

pub use model::{
    Artifact, ArtifactBody, ArtifactHeader, ArtifactType, CatalogEntry, Context, CustomListEntry,
    CustomListName, Evidence, EvidenceMetadata, EvidenceValue, Group, Model, Namespace,
    NegotiationCard, Permission, Report, User, Version,
};

// =============================================================================
// RE-EXPORTS: Query and Stores
// =============================================================================

pub use query::{Filter, Filterable, Query};
pub use store::{
    ArtifactSession, ArtifactStore, BoxedMapper, CatalogGroup, CatalogSession, CatalogStore,
    CustomListSession, CustomListStore, Persistable, ResourceMapper, UserSession, UserStore,
    WriteOptions, create_artifact_store, create_catalog_store, create_custom_list_store,
    create_user_store,
};

// =============================================================================
// RE-EXPORTS: Validation
// =============================================================================

pub use validation::{
    QaCategory, ResultType, TestCase, TestResults, TestSuite, TestSuiteValidator,
    ValidationResult, Validator,
};
