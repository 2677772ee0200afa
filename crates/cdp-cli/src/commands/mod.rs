//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function. Commands print
//! human-readable output to stdout; logs go to stderr.

pub mod clean;
pub mod config;
pub mod generate;
pub mod status;
pub mod validate;
