//! # Data Model
//!
//! Everything an artifact store persists.
//!
//! - `artifact`: header/body envelope and the artifact type set
//! - `context`: namespace, model and version containers
//! - `negotiation`, `evidence`, `report`: artifact bodies
//!   (test suites and test results live in `validation`)
//! - `catalog`, `custom_list`, `user`: records of the auxiliary stores

pub mod artifact;
pub mod catalog;
pub mod context;
pub mod custom_list;
pub mod evidence;
pub mod negotiation;
pub mod report;
pub mod user;

pub use artifact::{Artifact, ArtifactBody, ArtifactHeader, ArtifactType};
pub use catalog::{CatalogEntry, CatalogEntryHeader};
pub use context::{Context, Model, Namespace, Version};
pub use custom_list::{CustomListEntry, CustomListName};
pub use evidence::{Evidence, EvidenceMetadata, EvidenceValue};
pub use negotiation::{
    DataClassification, DataDescriptor, FieldDescriptor, GoalDescriptor, LabelDescriptor,
    MetricDescriptor, ModelDescriptor, ModelResourcesDescriptor, NegotiationCard, ProblemType,
    RiskDescriptor, SystemDescriptor,
};
pub use report::Report;
pub use user::{Group, Method, Permission, ResourceType, Role, User};
