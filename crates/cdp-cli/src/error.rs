//! Error types for CDP CLI
//!
//! User-facing error types with clear, actionable messages. Per-record
//! problems are *not* errors: they are collected as diagnostics in the
//! validation report. Only conditions that stop the run live here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Fatal errors of a validation or generation run
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check cdp.toml, CDP_* environment variables and command-line flags.")]
    Config(String),

    /// Records directory does not exist
    #[error("Records directory not found: '{0}'. Set records_dir in cdp.toml or pass --records-dir.")]
    RecordsDirNotFound(PathBuf),

    /// A reference table is missing or malformed
    #[error("Invalid reference table '{file}': {message}")]
    ReferenceTable { file: PathBuf, message: String },

    /// Validation found errors in strict mode
    #[error("Validation failed with {errors} error(s). Nothing was published.")]
    ValidationFailed { errors: usize },

    /// Staging or publishing the dataset failed
    #[error("Failed to write output '{path}': {message}. The published dataset was left untouched.")]
    WriteFailure { path: PathBuf, message: String },

    /// A validated record failed to transform
    #[error("Transform failed: {0}. Re-run 'cdp validate' against the current reference tables.")]
    Transform(#[from] crate::transform::TransformError),

    /// Build cache could not be persisted
    #[error("Cache error: {0}. Try running 'cdp clean' to reset the build cache.")]
    Cache(String),

    /// Shared library error
    #[error(transparent)]
    Common(#[from] cdp_common::CdpError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parsing failed
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// A background task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a reference table error
    pub fn reference(file: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ReferenceTable {
            file: file.into(),
            message: msg.into(),
        }
    }

    /// Create a write failure
    pub fn write_failure(path: impl Into<PathBuf>, msg: impl std::fmt::Display) -> Self {
        Self::WriteFailure {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }
}
