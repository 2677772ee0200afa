//! CDP Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the CDP project.
//!
//! # Overview
//!
//! This crate provides common functionality used across all CDP workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Checksums**: Content fingerprints for source files and generated corpora
//! - **Logging**: Centralized `tracing` subscriber setup
//! - **Types**: The public API data model written to the static dataset
//!
//! # Example
//!
//! ```no_run
//! use cdp_common::checksum::fingerprint;
//!
//! fn process_file(path: &str) -> std::io::Result<()> {
//!     let bytes = std::fs::read(path)?;
//!     println!("File fingerprint: {}", fingerprint(&bytes));
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CdpError, Result};
