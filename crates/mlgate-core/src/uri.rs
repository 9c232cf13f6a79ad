//! # Store URIs
//!
//! Parsing of the string that selects a store backend.
//!
//! | URI | Backend |
//! |-----|---------|
//! | `memory://` | in-memory ordered maps |
//! | `fs://<path>`, `local://<path>` | one JSON document per resource |
//! | `rdbs+redb://<path>`, `rdbs+redb://:memory:` | normalized redb tables |
//! | `http://<host>`, `https://<host>` | remote REST store |
//!
//! A URI is parsed once into a [`StoreUri`]; every factory dispatches on
//! [`StoreType`] and never re-reads the raw string.

use crate::primitives::{
    FILESYSTEM_PREFIXES, HTTP_PREFIXES, MEMORY_PREFIX, RELATIONAL_PREFIX, SUPPORTED_DIALECTS,
};
use crate::MlgateError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The backend family a URI selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    LocalMemory,
    LocalFilesystem,
    RelationalDb,
    RemoteHttp,
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocalMemory => "memory",
            Self::LocalFilesystem => "filesystem",
            Self::RelationalDb => "relational",
            Self::RemoteHttp => "http",
        };
        f.write_str(name)
    }
}

/// A parsed store location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUri {
    /// The URI exactly as given.
    pub uri: String,
    /// The selected backend family.
    pub store_type: StoreType,
    /// The location after the scheme: a directory, database path or base URL.
    pub path: String,
    /// The relational dialect (`redb`), only set for `RelationalDb`.
    pub dialect: Option<String>,
}

impl StoreUri {
    /// Parse a store URI.
    pub fn parse(uri: &str) -> Result<Self, MlgateError> {
        let trimmed = uri.trim();
        let Some((scheme, rest)) = trimmed.split_once("://") else {
            return Err(MlgateError::InvalidUri(format!(
                "'{uri}' has no scheme (expected e.g. memory://, fs://<path>)"
            )));
        };
        let prefix = format!("{scheme}://");

        if prefix == MEMORY_PREFIX {
            return Ok(Self {
                uri: trimmed.to_string(),
                store_type: StoreType::LocalMemory,
                path: String::new(),
                dialect: None,
            });
        }

        if FILESYSTEM_PREFIXES.contains(&prefix.as_str()) {
            if rest.is_empty() {
                return Err(MlgateError::InvalidUri(format!(
                    "'{uri}' is missing a directory path"
                )));
            }
            return Ok(Self {
                uri: trimmed.to_string(),
                store_type: StoreType::LocalFilesystem,
                path: rest.to_string(),
                dialect: None,
            });
        }

        if let Some(dialect) = scheme.strip_prefix(RELATIONAL_PREFIX) {
            if dialect.is_empty() {
                return Err(MlgateError::InvalidUri(format!(
                    "'{uri}' is missing a relational dialect"
                )));
            }
            if !SUPPORTED_DIALECTS.contains(&dialect) {
                return Err(MlgateError::UnknownBackend(format!(
                    "relational dialect '{dialect}' (supported: {})",
                    SUPPORTED_DIALECTS.join(", ")
                )));
            }
            if rest.is_empty() {
                return Err(MlgateError::InvalidUri(format!(
                    "'{uri}' is missing a database location"
                )));
            }
            return Ok(Self {
                uri: trimmed.to_string(),
                store_type: StoreType::RelationalDb,
                path: rest.to_string(),
                dialect: Some(dialect.to_string()),
            });
        }

        if HTTP_PREFIXES.contains(&prefix.as_str()) {
            if rest.is_empty() {
                return Err(MlgateError::InvalidUri(format!("'{uri}' is missing a host")));
            }
            return Ok(Self {
                uri: trimmed.to_string(),
                store_type: StoreType::RemoteHttp,
                path: trimmed.trim_end_matches('/').to_string(),
                dialect: None,
            });
        }

        Err(MlgateError::UnknownBackend(format!("scheme '{scheme}'")))
    }

    /// The location as a filesystem path (filesystem and relational stores).
    pub fn as_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

impl FromStr for StoreUri {
    type Err = MlgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

// =============================================================================
// TESTS
// =============================================================================
