//! # Validation Engine
//!
//! Maps evidence to declared conditions and aggregates the outcome.
//!
//! 1. A [`TestSuite`] declares test cases, each with an optional [`Validator`]
//! 2. A [`TestSuiteValidator`] collects one piece of evidence per test case
//! 3. `validate()` evaluates every case and returns [`TestResults`]
//!
//! Results carry the validator and evidence metadata that produced them, so
//! a stored `TestResults` artifact is self-describing.

pub mod result;
pub mod suite;
pub mod suite_validator;
pub mod test_results;
pub mod validator;

pub use result::{ResultType, ValidationResult};
pub use suite::{QaCategory, TestCase, TestSuite};
pub use suite_validator::{TestSuiteValidator, ValidatorState};
pub use test_results::{ResultSummary, TestResults};
pub use validator::Validator;
