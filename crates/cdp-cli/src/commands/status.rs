//! `cdp status` command implementation
//!
//! Shows the build cache and the currently published dataset.

use crate::cache::BuildCache;
use crate::config::Config;
use crate::error::Result;
use crate::progress::format_bytes;
use crate::writer::read_published_metadata;
use colored::Colorize;

/// Show cache and dataset status
pub async fn run(config: &Config) -> Result<()> {
    println!("{}", "Build Cache:".cyan().bold());
    match BuildCache::inspect(&config.cache_dir) {
        Ok(Some(summary)) => {
            println!("  Path:       {}", summary.path.display());
            println!("  Files:      {}", summary.files);
            println!("  Programs:   {}", summary.programs);
            println!("  Size:       {}", format_bytes(summary.size_bytes));
            println!("  References: {}", summary.reference_fingerprint.short());
        },
        Ok(None) => {
            println!("  No build cache at {}", config.cache_dir.display());
        },
        Err(e) => {
            println!("  {} {}", "Unusable:".yellow(), e);
            println!("  The next 'cdp generate' will rebuild it; 'cdp clean' removes it.");
        },
    }

    println!();
    println!("{}", "Published Dataset:".cyan().bold());
    match read_published_metadata(&config.output_dir)? {
        Some(metadata) => {
            println!("  Path:       {}", config.output_dir.display());
            println!("  Generated:  {}", metadata.generated_at.to_rfc3339());
            println!("  Programs:   {}", metadata.counts.total);
            println!("  Suppressed: {}", metadata.counts.suppressed);
            println!("  Warnings:   {}", metadata.counts.warnings);
            println!("  Sources:    {}", metadata.counts.source_files);
            println!("  Corpus:     {}", metadata.corpus_fingerprint.short());
        },
        None => {
            println!("  Nothing published at {}", config.output_dir.display());
            println!("  Run 'cdp generate' to publish the dataset.");
        },
    }

    Ok(())
}
