//! # Configuration
//!
//! Settings resolve in three layers, later layers winning:
//!
//! 1. a TOML file (`--config`, or `mlgate.toml` in the working directory)
//! 2. `MLGATE_*` environment variables
//! 3. command-line flags (applied by the CLI)
//!
//! Every store URI defaults to `memory://`.

use mlgate_core::{
    ArtifactStore, CatalogStore, Context, CustomListStore, MlgateError, StoreUri, UserStore,
};
use serde::Deserialize;
use std::path::Path;

/// File looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "mlgate.toml";

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "MLGATE_";

const DEFAULT_URI: &str = "memory://";

/// Resolved application settings.
///
/// # Example
///
/// ```toml
/// store_uri = "fs://./governance"
/// catalog_uri = "rdbs+redb://./catalog.redb"
/// namespace = "vision"
/// model = "weld-inspector"
/// version = "v1"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub store_uri: String,
    pub catalog_uri: String,
    pub custom_list_uri: String,
    pub user_store_uri: String,
    pub namespace: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    /// Bearer token for remote stores.
    pub api_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_uri: DEFAULT_URI.to_string(),
            catalog_uri: DEFAULT_URI.to_string(),
            custom_list_uri: DEFAULT_URI.to_string(),
            user_store_uri: DEFAULT_URI.to_string(),
            namespace: None,
            model: None,
            version: None,
            api_token: None,
        }
    }
}

impl Settings {
    /// Load the file layer and apply the process environment.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, MlgateError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE_NAME).is_file() => {
                Self::from_file(Path::new(CONFIG_FILE_NAME))?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, MlgateError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MlgateError::Backend(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content).map_err(|e| {
            MlgateError::Validation(format!("config file '{}': {}", path.display(), e))
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, MlgateError> {
        toml::from_str(content).map_err(|e| MlgateError::Validation(e.to_string()))
    }

    /// Override fields from `MLGATE_<FIELD>` variables found by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        if let Some(v) = var("STORE_URI") {
            self.store_uri = v;
        }
        if let Some(v) = var("CATALOG_URI") {
            self.catalog_uri = v;
        }
        if let Some(v) = var("CUSTOM_LIST_URI") {
            self.custom_list_uri = v;
        }
        if let Some(v) = var("USER_STORE_URI") {
            self.user_store_uri = v;
        }
        if let Some(v) = var("NAMESPACE") {
            self.namespace = Some(v);
        }
        if let Some(v) = var("MODEL") {
            self.model = Some(v);
        }
        if let Some(v) = var("VERSION") {
            self.version = Some(v);
        }
        if let Some(v) = var("API_TOKEN") {
            self.api_token = Some(v);
        }
    }

    /// Override the context from a `namespace/model/version` string.
    pub fn set_context(&mut self, spec: &str) -> Result<(), MlgateError> {
        let parts: Vec<&str> = spec.split('/').collect();
        let [namespace, model, version] = parts.as_slice() else {
            return Err(MlgateError::Validation(format!(
                "context '{spec}' must look like namespace/model/version"
            )));
        };
        self.namespace = Some((*namespace).to_string());
        self.model = Some((*model).to_string());
        self.version = Some((*version).to_string());
        Ok(())
    }

    /// The configured context; every part must be set.
    pub fn context(&self) -> Result<Context, MlgateError> {
        match (&self.namespace, &self.model, &self.version) {
            (Some(namespace), Some(model), Some(version)) => {
                Context::new(namespace.as_str(), model.as_str(), version.as_str())
            }
            _ => Err(MlgateError::Validation(
                "no context: set namespace, model and version (or pass --context ns/model/version)"
                    .to_string(),
            )),
        }
    }

    fn token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    pub fn artifact_store(&self) -> Result<ArtifactStore, MlgateError> {
        ArtifactStore::open(&StoreUri::parse(&self.store_uri)?, self.token())
    }

    pub fn catalog_store(&self) -> Result<CatalogStore, MlgateError> {
        CatalogStore::open(&StoreUri::parse(&self.catalog_uri)?, self.token())
    }

    pub fn custom_list_store(&self) -> Result<CustomListStore, MlgateError> {
        CustomListStore::open(&StoreUri::parse(&self.custom_list_uri)?, self.token())
    }

    pub fn user_store(&self) -> Result<UserStore, MlgateError> {
        UserStore::open(&StoreUri::parse(&self.user_store_uri)?, self.token())
    }

    /// Commented starter file written by `mlgate init --write-config`.
    pub fn default_toml() -> &'static str {
        r#"# mlgate configuration
#
# Store URIs: memory://, fs://<dir>, rdbs+redb://<file>, http(s)://<host>
store_uri = "memory://"
catalog_uri = "memory://"
custom_list_uri = "memory://"
user_store_uri = "memory://"

# Context used by artifact commands
# namespace = "my-namespace"
# model = "my-model"
# version = "v1"

# Bearer token for http(s):// stores
# api_token = "..."
"#
    }
}
