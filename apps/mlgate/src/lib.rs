//! # mlgate
//!
//! The command-line application over `mlgate-core`.
//!
//! - `cli`: argument parsing and command implementations
//! - `config`: layered settings (file, environment, flags)

pub mod cli;
pub mod config;
