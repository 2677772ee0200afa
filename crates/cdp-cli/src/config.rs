//! Configuration management for CDP CLI
//!
//! Settings are layered: built-in defaults, then an optional `cdp.toml`,
//! then `CDP_*` environment variables and command-line flags (clap reads
//! both). Relative paths in a config file are resolved against the file's
//! own directory.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// CLI Configuration Constants
// ============================================================================

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "cdp.toml";

pub const DEFAULT_RECORDS_DIR: &str = "data/records";
pub const DEFAULT_REFERENCE_DIR: &str = "data/reference";
pub const DEFAULT_OUTPUT_DIR: &str = "dist/api";
pub const DEFAULT_CACHE_DIR: &str = ".cdp-cache";

/// Effective pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the source record tree
    pub records_dir: PathBuf,

    /// Directory holding categories/groups/areas/cities/suppressed tables
    pub reference_dir: PathBuf,

    /// Published dataset directory
    pub output_dir: PathBuf,

    /// Incremental build cache directory
    pub cache_dir: PathBuf,

    /// Maximum number of files transformed concurrently
    pub concurrency: usize,
}

/// On-disk shape of `cdp.toml`; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    records_dir: Option<PathBuf>,
    reference_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    concurrency: Option<usize>,
}

/// Values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub records_dir: Option<PathBuf>,
    pub reference_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            records_dir: PathBuf::from(DEFAULT_RECORDS_DIR),
            reference_dir: PathBuf::from(DEFAULT_REFERENCE_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Config {
    /// Load configuration
    ///
    /// An explicit `path` must exist. Without one, `cdp.toml` in the working
    /// directory is used when present.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::config(format!(
                        "config file '{}' does not exist",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            },
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            },
        };

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        let mut config = Self::default();
        if let Some(dir) = file.records_dir {
            config.records_dir = resolve(dir);
        }
        if let Some(dir) = file.reference_dir {
            config.reference_dir = resolve(dir);
        }
        if let Some(dir) = file.output_dir {
            config.output_dir = resolve(dir);
        }
        if let Some(dir) = file.cache_dir {
            config.cache_dir = resolve(dir);
        }
        if let Some(n) = file.concurrency {
            config.concurrency = n;
        }
        Ok(config)
    }

    /// Apply flag / environment overrides
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref dir) = overrides.records_dir {
            self.records_dir = dir.clone();
        }
        if let Some(ref dir) = overrides.reference_dir {
            self.reference_dir = dir.clone();
        }
        if let Some(ref dir) = overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(ref dir) = overrides.cache_dir {
            self.cache_dir = dir.clone();
        }
        if let Some(n) = overrides.concurrency {
            self.concurrency = n;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(CliError::config("concurrency must be at least 1"));
        }
        if self.output_dir.as_os_str().is_empty() || self.output_dir.parent().is_none() {
            return Err(CliError::config(format!(
                "output_dir '{}' must name a directory below an existing parent",
                self.output_dir.display()
            )));
        }
        Ok(())
    }

    /// Look up a single setting by key, as shown by `cdp config get`
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "records_dir" => self.records_dir.display().to_string(),
            "reference_dir" => self.reference_dir.display().to_string(),
            "output_dir" => self.output_dir.display().to_string(),
            "cache_dir" => self.cache_dir.display().to_string(),
            "concurrency" => self.concurrency.to_string(),
            _ => return Err(CliError::config(format!("Unknown config key: {}", key))),
        };
        Ok(value)
    }

    /// Keys accepted by [`Config::get`]
    pub fn keys() -> &'static [&'static str] {
        &[
            "records_dir",
            "reference_dir",
            "output_dir",
            "cache_dir",
            "concurrency",
        ]
    }
}
