//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::{CONFIG_FILE_NAME, Settings};
use mlgate_core::primitives::MAX_DOCUMENT_SIZE;
use mlgate_core::{
    Artifact, ArtifactBody, ArtifactType, CatalogEntry, CatalogGroup, CatalogStore,
    CustomListEntry, CustomListName, Evidence, Filter, Group, MlgateError, Persistable, Query,
    ResultType, StoreUri, TestSuite, TestSuiteValidator, User, WriteOptions, check_identifier,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::info;

use super::{CatalogAction, CustomListAction, UsersAction};

// =============================================================================
// OUTPUT
// =============================================================================

/// How results are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    fn print_json<T: Serialize>(&self, value: &T) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }

    /// A human-facing status line, silent in JSON and quiet modes.
    fn note(&self, message: impl std::fmt::Display) {
        if !self.json && !self.quiet {
            println!("{message}");
        }
    }
}

// =============================================================================
// FILE INPUT
// =============================================================================

/// Read a JSON document, refusing directories and oversized files.
fn read_json_file(path: &Path) -> Result<Value, MlgateError> {
    let canonical = path.canonicalize().map_err(|e| {
        MlgateError::Backend(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(MlgateError::Backend(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| MlgateError::Backend(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_DOCUMENT_SIZE {
        return Err(MlgateError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_DOCUMENT_SIZE
        )));
    }

    let contents = std::fs::read(&canonical)
        .map_err(|e| MlgateError::Backend(format!("Read file: {}", e)))?;
    serde_json::from_slice(&contents).map_err(|e| {
        MlgateError::Serialization(format!("'{}' is not valid JSON: {}", path.display(), e))
    })
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T, MlgateError> {
    serde_json::from_value(value).map_err(|e| MlgateError::Serialization(format!("{what}: {e}")))
}

/// Parse an inline JSON argument, or the file it names with a leading `@`.
fn json_argument(arg: &str) -> Result<Value, MlgateError> {
    match arg.strip_prefix('@') {
        Some(path) => read_json_file(Path::new(path)),
        None => serde_json::from_str(arg)
            .map_err(|e| MlgateError::Serialization(format!("invalid JSON argument: {e}"))),
    }
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the configured context, optionally writing a starter config.
pub fn cmd_init(settings: &Settings, out: Output, write_config: bool) -> Result<(), MlgateError> {
    if write_config {
        let path = Path::new(CONFIG_FILE_NAME);
        if path.exists() {
            out.note(format!("{CONFIG_FILE_NAME} already exists, leaving it alone"));
        } else {
            std::fs::write(path, Settings::default_toml()).map_err(|e| {
                MlgateError::Backend(format!("Failed to write {CONFIG_FILE_NAME}: {e}"))
            })?;
            out.note(format!("Wrote {CONFIG_FILE_NAME}"));
        }
        if settings.namespace.is_none() {
            return Ok(());
        }
    }

    let ctx = settings.context()?;
    let store = settings.artifact_store()?;
    store.with_session(|s| s.create_context(&ctx))?;
    info!(context = %ctx, store = %settings.store_uri, "context initialized");

    if out.json {
        out.print_json(&json!({
            "context": ctx.to_string(),
            "store": settings.store_uri,
        }));
    } else {
        out.note(format!("Initialized {} in {}", ctx, settings.store_uri));
    }
    Ok(())
}

// =============================================================================
// NAMESPACES COMMAND
// =============================================================================

fn sorted(mut keys: Vec<String>) -> Vec<String> {
    keys.sort();
    keys
}

/// List namespaces, optionally with their models and versions.
pub fn cmd_namespaces(settings: &Settings, out: Output, tree: bool) -> Result<(), MlgateError> {
    let store = settings.artifact_store()?;
    let listing = store.with_session(|s| {
        let mut listing = Vec::new();
        for namespace in sorted(s.namespace_mapper()?.list()?) {
            let mut models = Vec::new();
            if tree {
                for model in sorted(s.model_mapper(&namespace)?.list()?) {
                    let versions = sorted(s.version_mapper(&namespace, &model)?.list()?);
                    models.push((model, versions));
                }
            }
            listing.push((namespace, models));
        }
        Ok(listing)
    })?;

    if out.json {
        let value: Vec<Value> = listing
            .iter()
            .map(|(namespace, models)| {
                if tree {
                    let models: Vec<Value> = models
                        .iter()
                        .map(|(model, versions)| json!({"model": model, "versions": versions}))
                        .collect();
                    json!({"namespace": namespace, "models": models})
                } else {
                    json!({"namespace": namespace})
                }
            })
            .collect();
        out.print_json(&value);
        return Ok(());
    }

    if listing.is_empty() {
        out.note("No namespaces");
    }
    for (namespace, models) in &listing {
        println!("{namespace}");
        for (model, versions) in models {
            println!("  {model}");
            for version in versions {
                println!("    {version}");
            }
        }
    }
    Ok(())
}

// =============================================================================
// ARTIFACT COMMANDS
// =============================================================================

fn artifact_type(name: &str) -> Result<ArtifactType, MlgateError> {
    name.parse()
}

/// List artifacts in the current context.
pub fn cmd_artifacts(
    settings: &Settings,
    out: Output,
    type_filter: Option<&str>,
) -> Result<(), MlgateError> {
    let ctx = settings.context()?;
    let filter = match type_filter {
        Some(name) => Filter::item_type(artifact_type(name)?.as_str()),
        None => Filter::All,
    };
    let store = settings.artifact_store()?;
    let mut artifacts = store.with_session(|s| s.search_artifacts(&ctx, &Query::new(filter)))?;
    artifacts.sort_by(|a, b| a.identifier().cmp(b.identifier()));

    if out.json {
        let headers: Vec<_> = artifacts.iter().map(Artifact::header).collect();
        out.print_json(&headers);
        return Ok(());
    }

    if artifacts.is_empty() {
        out.note(format!("No artifacts in {ctx}"));
    }
    for artifact in &artifacts {
        let header = artifact.header();
        println!(
            "{:<32} {:<18} {}",
            header.identifier,
            header.artifact_type,
            header.creator.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Print one artifact as JSON.
pub fn cmd_show(settings: &Settings, out: Output, identifier: &str) -> Result<(), MlgateError> {
    let ctx = settings.context()?;
    let store = settings.artifact_store()?;
    let artifact = store.with_session(|s| s.read_artifact(&ctx, identifier))?;
    out.print_json(&artifact);
    Ok(())
}

/// Arguments of the `write` command.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub file: PathBuf,
    pub artifact_type: Option<String>,
    pub identifier: Option<String>,
    pub creator: Option<String>,
    pub force: bool,
    pub parents: bool,
}

/// Turn a bare body document into a typed body.
pub fn body_from_value(artifact_type: ArtifactType, value: Value) -> Result<ArtifactBody, MlgateError> {
    let Value::Object(mut fields) = value else {
        return Err(MlgateError::Validation(format!(
            "a {artifact_type} body must be a JSON object"
        )));
    };
    if let Some(tag) = fields.get("artifact_type")
        && tag.as_str() != Some(artifact_type.as_str())
    {
        return Err(MlgateError::Validation(format!(
            "body says artifact_type {tag}, expected \"{artifact_type}\""
        )));
    }
    fields.insert(
        "artifact_type".to_string(),
        Value::from(artifact_type.as_str()),
    );
    from_value(Value::Object(fields), "artifact body")
}

/// Identifier a body is stored under when none is given.
pub fn default_identifier(body: &ArtifactBody) -> String {
    match body {
        ArtifactBody::NegotiationCard(card) => Persistable::default_identifier(card),
        ArtifactBody::TestSuite(suite) => Persistable::default_identifier(suite),
        ArtifactBody::Evidence(evidence) => evidence.default_identifier(),
        ArtifactBody::TestResults(results) => Persistable::default_identifier(results),
        ArtifactBody::Report(report) => Persistable::default_identifier(report),
    }
}

/// Build the artifact a `write` request describes.
pub fn artifact_from_request(request: &WriteRequest) -> Result<Artifact, MlgateError> {
    let document = read_json_file(&request.file)?;
    let artifact = match &request.artifact_type {
        Some(name) => {
            let body = body_from_value(artifact_type(name)?, document)?;
            let identifier = request
                .identifier
                .clone()
                .unwrap_or_else(|| default_identifier(&body));
            Artifact::from_body(identifier, body)?
        }
        None => {
            let artifact: Artifact = from_value(document, "artifact")?;
            match &request.identifier {
                Some(identifier) => {
                    let (mut header, body) = artifact.into_parts();
                    header.identifier = identifier.clone();
                    Artifact::new(header, body)?
                }
                None => artifact,
            }
        }
    };
    Ok(match &request.creator {
        Some(creator) => artifact.with_creator(creator.as_str()),
        None => artifact,
    })
}

/// Store an artifact from a JSON file.
pub fn cmd_write(settings: &Settings, out: Output, request: &WriteRequest) -> Result<(), MlgateError> {
    let ctx = settings.context()?;
    let artifact = artifact_from_request(request)?;
    let options = WriteOptions {
        force: request.force,
        parents: request.parents,
    };

    let store = settings.artifact_store()?;
    let written = store.with_session(|s| s.write_artifact(&ctx, artifact, options))?;
    info!(context = %ctx, artifact = written.identifier(), "artifact written");

    if out.json {
        out.print_json(written.header());
    } else {
        out.note(format!(
            "Wrote {} ({}) to {}",
            written.identifier(),
            written.artifact_type(),
            ctx
        ));
    }
    Ok(())
}

/// Remove an artifact.
pub fn cmd_delete(settings: &Settings, out: Output, identifier: &str) -> Result<(), MlgateError> {
    let ctx = settings.context()?;
    let store = settings.artifact_store()?;
    let removed = store.with_session(|s| s.delete_artifact(&ctx, identifier))?;

    if out.json {
        out.print_json(removed.header());
    } else {
        out.note(format!("Deleted {} from {}", removed.identifier(), ctx));
    }
    Ok(())
}

/// Parse `name=value`; the value is JSON when it parses, else a string.
fn property_filter(arg: &str) -> Result<Filter, MlgateError> {
    let (name, raw) = arg.split_once('=').ok_or_else(|| {
        MlgateError::Validation(format!("property filter '{arg}' must look like name=value"))
    })?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw));
    Ok(Filter::property(name, value))
}

/// Combine the search arguments into one query.
pub fn build_query(
    query: Option<&str>,
    type_filter: Option<&str>,
    properties: &[String],
) -> Result<Query, MlgateError> {
    let mut filters = Vec::new();
    if let Some(arg) = query {
        let query: Query = from_value(json_argument(arg)?, "query")?;
        filters.push(query.filter);
    }
    if let Some(name) = type_filter {
        filters.push(Filter::item_type(artifact_type(name)?.as_str()));
    }
    for arg in properties {
        filters.push(property_filter(arg)?);
    }

    let filter = match filters.len() {
        0 => Filter::All,
        1 => filters.remove(0),
        _ => Filter::and(filters),
    };
    Ok(Query::new(filter))
}

/// Find artifacts in the current context.
pub fn cmd_search(
    settings: &Settings,
    out: Output,
    query: Option<&str>,
    type_filter: Option<&str>,
    properties: &[String],
) -> Result<(), MlgateError> {
    let ctx = settings.context()?;
    let query = build_query(query, type_filter, properties)?;
    let store = settings.artifact_store()?;
    let hits = store.with_session(|s| s.search_artifacts(&ctx, &query))?;

    if out.json {
        out.print_json(&hits);
        return Ok(());
    }
    out.note(format!("{} match(es) in {}", hits.len(), ctx));
    for hit in &hits {
        println!("{:<32} {}", hit.identifier(), hit.artifact_type());
    }
    Ok(())
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Validate every evidence artifact in the context against a stored suite.
///
/// Fails when evidence is missing or any test case fails, so the exit status
/// can gate a pipeline.
pub fn cmd_validate(
    settings: &Settings,
    out: Output,
    suite_id: &str,
    save: bool,
    results_id: &str,
) -> Result<(), MlgateError> {
    let ctx = settings.context()?;
    let store = settings.artifact_store()?;
    let suite = TestSuite::load_as(&ctx, &store, suite_id)?;

    let evidence_filter = Query::new(Filter::item_type(ArtifactType::Evidence.as_str()));
    let evidence: Vec<Evidence> = store
        .with_session(|s| s.search_artifacts(&ctx, &evidence_filter))?
        .into_iter()
        .filter_map(|artifact| match artifact.into_parts().1 {
            ArtifactBody::Evidence(evidence) => Some(evidence),
            _ => None,
        })
        .collect();
    info!(context = %ctx, suite = suite_id, evidence = evidence.len(), "validating");

    let mut validator = TestSuiteValidator::new(&suite).with_test_suite_id(suite_id);
    validator.add_evidence_list(evidence)?;
    let results = validator.validate()?;

    if save {
        results.save_with_options(&ctx, &store, results_id, WriteOptions::force())?;
        out.note(format!("Saved results as {results_id}"));
    }

    let summary = results.summary();
    if out.json {
        out.print_json(&results);
    } else {
        for (test_case, result) in results.results() {
            let label = match result.result_type {
                ResultType::Success => "PASS",
                ResultType::Failure => "FAIL",
                ResultType::Info => "INFO",
            };
            println!("{label} {test_case}: {}", result.message);
        }
        out.note(format!(
            "{} passed, {} failed, {} informational",
            summary.success, summary.failure, summary.info
        ));
    }

    if summary.failure > 0 {
        return Err(MlgateError::Validation(format!(
            "{} of {} test cases failed",
            summary.failure,
            results.results().len()
        )));
    }
    Ok(())
}

// =============================================================================
// CATALOG COMMAND
// =============================================================================

fn split_pair<'a>(arg: &'a str, what: &str) -> Result<(&'a str, &'a str), MlgateError> {
    arg.split_once('=')
        .ok_or_else(|| MlgateError::Validation(format!("{what} '{arg}' must look like id=uri")))
}

/// Catalog subcommands.
pub fn cmd_catalog(settings: &Settings, out: Output, action: CatalogAction) -> Result<(), MlgateError> {
    let store = settings.catalog_store()?;

    match action {
        CatalogAction::List { limit, offset } => {
            let entries = store.with_session(|s| s.entry_mapper()?.list_details(limit, offset))?;
            if out.json {
                out.print_json(&entries);
            } else {
                for entry in &entries {
                    println!(
                        "{:<32} {}",
                        entry.header.identifier,
                        entry.description.as_deref().unwrap_or("")
                    );
                }
            }
        }
        CatalogAction::Show { identifier } => {
            let entry = store.with_session(|s| s.entry_mapper()?.read(&identifier))?;
            out.print_json(&entry);
        }
        CatalogAction::Add { file, force } => {
            let mut entry: CatalogEntry = from_value(read_json_file(&file)?, "catalog entry")?;
            if entry.header.created == 0 {
                let stamped = CatalogEntry::new("", "").header;
                entry.header.created = stamped.created;
                entry.header.updated = stamped.updated;
            }
            let identifier = entry.header.identifier.clone();
            store.with_session(|s| {
                let mut entries = s.entry_mapper()?;
                if force && entries.exists(&identifier)? {
                    entries.edit(entry)
                } else {
                    entries.create(entry)
                }
            })?;
            out.note(format!("Stored catalog entry {identifier}"));
        }
        CatalogAction::Delete { identifier } => {
            store.with_session(|s| s.entry_mapper()?.delete(&identifier))?;
            out.note(format!("Deleted catalog entry {identifier}"));
        }
        CatalogAction::Search { tag, extra } => {
            let mut group = CatalogGroup::new();
            group.add_catalog("default", store, false)?;
            for arg in &extra {
                let (id, uri) = split_pair(arg, "catalog")?;
                let catalog = CatalogStore::open(&StoreUri::parse(uri)?, settings.api_token.as_deref())?
                    .with_read_only(true);
                group.add_catalog(id, catalog, false)?;
            }

            let filter = Filter::and(tag.iter().map(|t| Filter::tag("tags", t.as_str())).collect());
            let hits = group.search(&Query::new(filter))?;
            if out.json {
                out.print_json(&hits);
            } else {
                for hit in &hits {
                    println!("{}/{}", hit.header.catalog_id, hit.header.identifier);
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// CUSTOM LIST COMMAND
// =============================================================================

/// Custom-list subcommands.
pub fn cmd_custom_list(
    settings: &Settings,
    out: Output,
    list: &str,
    action: CustomListAction,
) -> Result<(), MlgateError> {
    let list: CustomListName = list.parse()?;
    let store = settings.custom_list_store()?;

    match action {
        CustomListAction::List => {
            let entries = store.with_session(|s| s.entry_mapper(list)?.list_details(usize::MAX, 0))?;
            if out.json {
                out.print_json(&entries);
            } else {
                for entry in &entries {
                    match &entry.parent {
                        Some(parent) => println!("{} ({parent}): {}", entry.name, entry.description),
                        None => println!("{}: {}", entry.name, entry.description),
                    }
                }
            }
        }
        CustomListAction::Add {
            name,
            description,
            parent,
        } => {
            let mut entry = CustomListEntry::new(name.as_str(), description);
            entry.parent = parent;
            store.with_session(|s| s.entry_mapper(list)?.create(entry))?;
            out.note(format!("Added {name} to {list}"));
        }
        CustomListAction::Delete { name } => {
            store.with_session(|s| s.entry_mapper(list)?.delete(&name))?;
            out.note(format!("Removed {name} from {list}"));
        }
    }
    Ok(())
}

// =============================================================================
// USERS COMMAND
// =============================================================================

/// User and group subcommands.
pub fn cmd_users(settings: &Settings, out: Output, action: UsersAction) -> Result<(), MlgateError> {
    let store = settings.user_store()?;

    match action {
        UsersAction::List => {
            let users = store.with_session(|s| s.user_mapper()?.list_details(usize::MAX, 0))?;
            if out.json {
                out.print_json(&users);
            } else {
                for user in &users {
                    println!("{:<24} {}", user.username, user.groups.join(","));
                }
            }
        }
        UsersAction::Add {
            username,
            email,
            group,
        } => {
            let mut user = User::new(username.as_str())?;
            user.email = email;
            user.groups = group;
            store.with_session(|s| s.user_mapper()?.create(user))?;
            out.note(format!("Added user {username}"));
        }
        UsersAction::Groups => {
            let groups = store.with_session(|s| s.group_mapper()?.list_details(usize::MAX, 0))?;
            if out.json {
                out.print_json(&groups);
            } else {
                for group in &groups {
                    println!("{:<24} {} permission(s)", group.name, group.permissions.len());
                }
            }
        }
        UsersAction::AddGroup { name } => {
            check_identifier("group", &name)?;
            let group = Group {
                name: name.clone(),
                permissions: Vec::new(),
            };
            store.with_session(|s| s.group_mapper()?.create(group))?;
            out.note(format!("Added group {name}"));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use mlgate_core::NegotiationCard;

    #[test]
    fn bare_bodies_get_their_type_tag() {
        let body = body_from_value(ArtifactType::Report, json!({"summary": "ok"})).unwrap();
        assert_eq!(default_identifier(&body), "default.report");

        let card = body_from_value(ArtifactType::NegotiationCard, json!({})).unwrap();
        assert_eq!(card, ArtifactBody::NegotiationCard(NegotiationCard::default()));
    }

    #[test]
    fn conflicting_type_tag_is_rejected() {
        let err = body_from_value(
            ArtifactType::Report,
            json!({"artifact_type": "test_suite"}),
        )
        .unwrap_err();
        assert!(matches!(err, MlgateError::Validation(_)));
        assert!(body_from_value(ArtifactType::Report, json!([1])).is_err());
    }

    #[test]
    fn evidence_defaults_to_its_test_case() {
        let body = body_from_value(
            ArtifactType::Evidence,
            json!({
                "metadata": {"test_case_id": "T1", "measurement_type": "accuracy"},
                "value": {"value_type": "real", "value": 0.9}
            }),
        )
        .unwrap();
        assert_eq!(default_identifier(&body), "evidence.T1");
    }

    #[test]
    fn search_arguments_combine_with_and() {
        assert_eq!(build_query(None, None, &[]).unwrap(), Query::all());

        let one = build_query(None, Some("report"), &[]).unwrap();
        assert_eq!(one.filter, Filter::item_type("report"));

        let both = build_query(
            Some(r#"{"filter": {"type": "identifier", "id": "a"}}"#),
            None,
            &["score=3".to_string(), "owner=ana".to_string()],
        )
        .unwrap();
        assert_eq!(
            both.filter,
            Filter::and(vec![
                Filter::identifier("a"),
                Filter::property("score", 3),
                Filter::property("owner", "ana"),
            ])
        );
    }

    #[test]
    fn bad_search_arguments_fail() {
        assert!(build_query(None, Some("spreadsheet"), &[]).is_err());
        assert!(build_query(None, None, &["novalue".to_string()]).is_err());
        assert!(matches!(
            build_query(Some("{not json"), None, &[]),
            Err(MlgateError::Serialization(_))
        ));
    }
}
