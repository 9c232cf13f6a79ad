//! # Core Type Definitions
//!
//! Shared error taxonomy and identifier rules for every store and the
//! validation engine.
//!
//! - Error types (`MlgateError`)
//! - Identifier validation (`check_identifier`)
//!
//! ## Error Boundary
//!
//! Backends never leak driver errors (redb, `std::io`, reqwest) past the
//! mapper boundary. They are wrapped into `MlgateError::Backend` or
//! `MlgateError::Serialization` at the call site.

use thiserror::Error;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in mlgate stores and validation.
///
/// - No silent failures
/// - Use `Result<T, MlgateError>` for fallible operations
/// - Mapper operations fail synchronously; nothing is retried internally
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MlgateError {
    /// Read, edit or delete on an absent key.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Create on a key that is already present.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Evidence added twice for the same test case in one validation pass.
    #[error("Duplicate evidence for test case: {0}")]
    Duplicate(String),

    /// A model or validation invariant does not hold.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store URI could not be parsed.
    #[error("Invalid store URI: {0}")]
    InvalidUri(String),

    /// The store URI names a scheme or dialect with no backend.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// An underlying I/O, database or transport failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A document or row could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MlgateError {
    /// Build a `NotFound` error for a resource kind and key.
    pub fn not_found(kind: &str, key: &str) -> Self {
        Self::NotFound(format!("{kind} '{key}'"))
    }

    /// Build an `AlreadyExists` error for a resource kind and key.
    pub fn already_exists(kind: &str, key: &str) -> Self {
        Self::AlreadyExists(format!("{kind} '{key}'"))
    }
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Check that an identifier can be used as a store key on every backend.
///
/// Identifiers become directory and file names on the filesystem backend and
/// path segments on the HTTP backend, so they must be non-empty, must not
/// contain path separators and must not start with a dot.
pub fn check_identifier(kind: &str, identifier: &str) -> Result<(), MlgateError> {
    if identifier.trim().is_empty() {
        return Err(MlgateError::Validation(format!(
            "{kind} identifier must not be empty"
        )));
    }
    if identifier.contains('/') || identifier.contains('\\') {
        return Err(MlgateError::Validation(format!(
            "{kind} identifier '{identifier}' must not contain path separators"
        )));
    }
    if identifier.starts_with('.') {
        return Err(MlgateError::Validation(format!(
            "{kind} identifier '{identifier}' must not start with '.'"
        )));
    }
    Ok(())
}

/// Check that a number survives JSON. NaN and infinities encode as `null`
/// and would not read back.
pub fn check_finite(what: &str, value: f64) -> Result<(), MlgateError> {
    if !value.is_finite() {
        return Err(MlgateError::Validation(format!(
            "{what} must be a finite number, got {value}"
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rules() {
        assert!(check_identifier("artifact", "card1").is_ok());
        assert!(check_identifier("artifact", "default.test_suite").is_ok());
        assert!(check_identifier("artifact", "with space").is_ok());

        assert!(matches!(
            check_identifier("artifact", ""),
            Err(MlgateError::Validation(_))
        ));
        assert!(matches!(
            check_identifier("artifact", "a/b"),
            Err(MlgateError::Validation(_))
        ));
        assert!(matches!(
            check_identifier("artifact", "..up"),
            Err(MlgateError::Validation(_))
        ));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(check_finite("threshold", 0.5).is_ok());
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                check_finite("threshold", bad),
                Err(MlgateError::Validation(_))
            ));
        }
    }

    #[test]
    fn error_helpers_format_kind_and_key() {
        let err = MlgateError::not_found("namespace", "ns");
        assert_eq!(err.to_string(), "Resource not found: namespace 'ns'");

        let err = MlgateError::already_exists("model", "m");
        assert_eq!(err.to_string(), "Resource already exists: model 'm'");
    }
}
