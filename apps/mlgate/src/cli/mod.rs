//! # mlgate CLI Module
//!
//! This module implements the CLI interface for mlgate.
//!
//! ## Available Commands
//!
//! - `init` - Create the configured namespace, model and version
//! - `namespaces` - List namespaces (optionally with models and versions)
//! - `artifacts` - List artifacts in the current context
//! - `show` - Print one artifact
//! - `write` - Store an artifact from a JSON file
//! - `delete` - Remove an artifact
//! - `search` - Find artifacts with a query
//! - `validate` - Validate stored evidence against a test suite
//! - `catalog` - Manage catalog entries
//! - `custom-list` - Manage QA categories and quality attributes
//! - `users` - Manage users and groups

mod commands;

use crate::config::Settings;
use clap::{Parser, Subcommand};
use mlgate_core::MlgateError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// mlgate - evidence-based governance for machine-learning models
///
/// Records negotiation cards, test suites and evidence per model version,
/// and validates the evidence against the suite.
#[derive(Parser, Debug)]
#[command(name = "mlgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Configuration file (defaults to ./mlgate.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Artifact store URI (overrides configuration)
    #[arg(short, long, global = true)]
    pub store: Option<String>,

    /// Context as namespace/model/version (overrides configuration)
    #[arg(short, long, global = true)]
    pub context: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the configured namespace, model and version
    Init {
        /// Also write a starter mlgate.toml to the working directory
        #[arg(long)]
        write_config: bool,
    },

    /// List namespaces
    Namespaces {
        /// Include models and versions
        #[arg(short, long)]
        tree: bool,
    },

    /// List artifacts in the current context
    Artifacts {
        /// Only artifacts of this type (negotiation_card, test_suite, ...)
        #[arg(short = 't', long)]
        artifact_type: Option<String>,
    },

    /// Print one artifact
    Show {
        /// Artifact identifier
        identifier: String,
    },

    /// Store an artifact from a JSON file
    Write {
        /// Path to the JSON document
        #[arg(short, long)]
        file: PathBuf,

        /// Treat the file as a bare body of this type instead of a full artifact
        #[arg(short = 't', long)]
        artifact_type: Option<String>,

        /// Identifier to store under (defaults to the type's default)
        #[arg(short, long)]
        identifier: Option<String>,

        /// Recorded creator
        #[arg(long)]
        creator: Option<String>,

        /// Replace an existing artifact
        #[arg(long)]
        force: bool,

        /// Create the namespace, model and version when missing
        #[arg(short, long)]
        parents: bool,
    },

    /// Remove an artifact
    Delete {
        /// Artifact identifier
        identifier: String,
    },

    /// Find artifacts in the current context
    Search {
        /// Query as JSON, or @path to a JSON file
        #[arg(long)]
        query: Option<String>,

        /// Only artifacts of this type
        #[arg(short = 't', long)]
        artifact_type: Option<String>,

        /// Property filter as name=value (value parsed as JSON when possible)
        #[arg(long)]
        property: Vec<String>,
    },

    /// Validate stored evidence against a test suite
    Validate {
        /// Identifier of the test suite artifact
        #[arg(long, default_value = mlgate_core::TestSuite::DEFAULT_ID)]
        suite: String,

        /// Store the results as an artifact
        #[arg(long)]
        save: bool,

        /// Identifier for the stored results
        #[arg(long, default_value = mlgate_core::TestResults::DEFAULT_ID)]
        results_id: String,
    },

    /// Manage catalog entries
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Manage QA categories and quality attributes
    CustomList {
        /// List name (qa_categories, quality_attributes)
        list: String,

        #[command(subcommand)]
        action: CustomListAction,
    },

    /// Manage users and groups
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CatalogAction {
    /// List entry identifiers
    List {
        #[arg(long, default_value_t = mlgate_core::primitives::DEFAULT_LIST_LIMIT)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Print one entry
    Show { identifier: String },

    /// Add an entry from a JSON file
    Add {
        #[arg(short, long)]
        file: PathBuf,

        /// Replace an existing entry
        #[arg(long)]
        force: bool,
    },

    /// Remove an entry
    Delete { identifier: String },

    /// Search the catalog, plus any extra catalogs
    Search {
        /// Tag the entry must carry
        #[arg(long)]
        tag: Vec<String>,

        /// Extra catalog as id=uri, searched read-only
        #[arg(long = "with")]
        extra: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CustomListAction {
    /// List entries
    List,

    /// Add an entry
    Add {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Entry of the parent list (child lists only)
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Remove an entry
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum UsersAction {
    /// List users
    List,

    /// Add a user
    Add {
        username: String,

        #[arg(long)]
        email: Option<String>,

        /// Group membership (repeatable)
        #[arg(short, long)]
        group: Vec<String>,
    },

    /// List groups
    Groups,

    /// Add a group
    AddGroup { name: String },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve settings: file and environment, then flags.
pub fn resolve_settings(cli: &Cli) -> Result<Settings, MlgateError> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(store) = &cli.store {
        settings.store_uri = store.clone();
    }
    if let Some(context) = &cli.context {
        settings.set_context(context)?;
    }
    Ok(settings)
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), MlgateError> {
    let settings = resolve_settings(&cli)?;
    let out = Output {
        json: cli.json_mode,
        quiet: cli.quiet,
    };

    match cli.command {
        Some(Commands::Init { write_config }) => cmd_init(&settings, out, write_config),
        Some(Commands::Namespaces { tree }) => cmd_namespaces(&settings, out, tree),
        Some(Commands::Artifacts { artifact_type }) => {
            cmd_artifacts(&settings, out, artifact_type.as_deref())
        }
        Some(Commands::Show { identifier }) => cmd_show(&settings, out, &identifier),
        Some(Commands::Write {
            file,
            artifact_type,
            identifier,
            creator,
            force,
            parents,
        }) => cmd_write(
            &settings,
            out,
            &WriteRequest {
                file,
                artifact_type,
                identifier,
                creator,
                force,
                parents,
            },
        ),
        Some(Commands::Delete { identifier }) => cmd_delete(&settings, out, &identifier),
        Some(Commands::Search {
            query,
            artifact_type,
            property,
        }) => cmd_search(
            &settings,
            out,
            query.as_deref(),
            artifact_type.as_deref(),
            &property,
        ),
        Some(Commands::Validate {
            suite,
            save,
            results_id,
        }) => cmd_validate(&settings, out, &suite, save, &results_id),
        Some(Commands::Catalog { action }) => cmd_catalog(&settings, out, action),
        Some(Commands::CustomList { list, action }) => {
            cmd_custom_list(&settings, out, &list, action)
        }
        Some(Commands::Users { action }) => cmd_users(&settings, out, action),
        None => {
            // No subcommand - list namespaces by default
            cmd_namespaces(&settings, out, false)
        }
    }
}
