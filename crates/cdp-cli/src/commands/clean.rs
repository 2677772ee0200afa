//! `cdp clean` command implementation
//!
//! Removes the incremental build cache. The published dataset is kept.

use crate::cache::BuildCache;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;

/// Remove the build cache
pub async fn run(config: &Config) -> Result<()> {
    if BuildCache::clear(&config.cache_dir)? {
        println!(
            "{} Removed build cache at {}",
            "✓".green(),
            config.cache_dir.display()
        );
        println!("  The next 'cdp generate' will transform every file.");
    } else {
        println!("No build cache at {}", config.cache_dir.display());
    }
    Ok(())
}
