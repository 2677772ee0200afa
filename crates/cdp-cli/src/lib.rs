//! CDP CLI Library
//!
//! Turns a tree of hand-authored YAML program records into the static JSON
//! dataset served to the community directory apps.
//!
//! # Overview
//!
//! - **Validation**: Check every record against the reference tables (`cdp validate`)
//! - **Generation**: Transform and atomically publish the dataset (`cdp generate`)
//! - **Status**: Inspect the build cache and the published dataset (`cdp status`)
//! - **Cache Management**: Reset the incremental build cache (`cdp clean`)
//! - **Configuration**: Show the effective settings (`cdp config`)
//!
//! # Pipeline
//!
//! ```text
//! loader → validate (gate) → id → transform (cached, parallel) → writer
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod id;
pub mod loader;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod reference;
pub mod transform;
pub mod validate;
pub mod writer;

// Re-export commonly used types
pub use config::Config;
pub use error::{CliError, Result};

use clap::{Args, Parser, Subcommand};
use config::ConfigOverrides;
use std::path::PathBuf;

/// CDP - Community Directory Pipeline
#[derive(Parser, Debug)]
#[command(name = "cdp")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output (debug logging and per-record detail)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to ./cdp.toml when present)
    #[arg(long, env = "CDP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Root directory of the YAML program records
    #[arg(long, env = "CDP_RECORDS_DIR", global = true)]
    pub records_dir: Option<PathBuf>,

    /// Directory holding the reference tables
    #[arg(long, env = "CDP_REFERENCE_DIR", global = true)]
    pub reference_dir: Option<PathBuf>,

    /// Directory the dataset is published to
    #[arg(long, env = "CDP_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Directory of the incremental build cache
    #[arg(long, env = "CDP_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of files transformed concurrently
    #[arg(long, env = "CDP_CONCURRENCY", global = true)]
    pub concurrency: Option<usize>,

    /// Print the CLI reference as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

impl Cli {
    /// Flag and environment values that override the config file
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            records_dir: self.records_dir.clone(),
            reference_dir: self.reference_dir.clone(),
            output_dir: self.output_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            concurrency: self.concurrency,
        }
    }

    /// Effective configuration for this invocation
    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config.as_deref(), &self.overrides())
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate every record without writing output
    Validate(ReportArgs),

    /// Validate, transform and publish the dataset
    Generate(GenerateArgs),

    /// Show build cache and published dataset status
    Status,

    /// Remove the incremental build cache
    Clean,

    /// Show the effective configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Report rendering options shared by `validate` and `generate`
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Only print errors (warnings are still counted)
    #[arg(long)]
    pub errors_only: bool,

    /// Also write the full report as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Options of `cdp generate`
#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub report: ReportArgs,

    /// Ignore the build cache and transform every file
    #[arg(long)]
    pub full: bool,

    /// Publish valid records even when others have errors
    #[arg(long)]
    pub lenient: bool,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Get configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show all configuration
    Show,
}
