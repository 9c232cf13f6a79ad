//! # Store Primitives
//!
//! Fixed constants shared by the stores, backends and the CLI.
//!
//! These values define on-disk layout, URI prefixes and wire paths. Changing
//! any of them changes where existing data is found.

/// URI prefix selecting the in-memory backend.
pub const MEMORY_PREFIX: &str = "memory://";

/// URI prefixes selecting the filesystem backend.
pub const FILESYSTEM_PREFIXES: [&str; 2] = ["fs://", "local://"];

/// URI prefix selecting the relational backend; followed by `<dialect>://`.
pub const RELATIONAL_PREFIX: &str = "rdbs+";

/// URI prefixes selecting the remote HTTP backend.
pub const HTTP_PREFIXES: [&str; 2] = ["http://", "https://"];

/// The relational dialects this build can open.
pub const SUPPORTED_DIALECTS: [&str; 1] = ["redb"];

/// Relational location that opens a non-persistent database.
pub const IN_MEMORY_LOCATION: &str = ":memory:";

/// Extension of every document written by the filesystem backend.
pub const JSON_EXTENSION: &str = "json";

/// Sub-folder holding artifact store data under a filesystem root.
pub const ARTIFACT_FOLDER: &str = "artifacts";

/// Sub-folder holding catalog entries under a filesystem root.
pub const CATALOG_FOLDER: &str = "catalog";

/// Sub-folder holding custom lists under a filesystem root.
pub const CUSTOM_LIST_FOLDER: &str = "custom_lists";

/// Sub-folder holding user store data under a filesystem root.
pub const USER_FOLDER: &str = "users";

/// Path prefix of every remote store endpoint.
pub const API_PREFIX: &str = "/api";

/// Default page size for `list_details`.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Maximum size accepted for a single stored document (16 MiB).
///
/// Checked before deserialization on the filesystem backend.
pub const MAX_DOCUMENT_SIZE: u64 = 16 * 1024 * 1024;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_disjoint() {
        for fs in FILESYSTEM_PREFIXES {
            assert_ne!(fs, MEMORY_PREFIX);
            for http in HTTP_PREFIXES {
                assert_ne!(fs, http);
            }
        }
    }
}
