//! `cdp generate` command implementation
//!
//! Validates, transforms and publishes the dataset. In strict mode any
//! validation error aborts the run before anything is written.

use crate::commands::validate::emit_report;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::pipeline::{self, GenerateOptions};
use crate::progress::create_spinner;
use crate::GenerateArgs;
use colored::Colorize;

/// Generate and publish the dataset
pub async fn run(config: &Config, args: &GenerateArgs, verbose: bool) -> Result<()> {
    let options = GenerateOptions {
        full: args.full,
        lenient: args.lenient,
        ..GenerateOptions::new()?
    };

    let spinner = create_spinner("Generating dataset...", verbose);
    let outcome = pipeline::generate(config, &options).await;
    spinner.finish_and_clear();
    let outcome = outcome?;

    emit_report(&outcome.report, &args.report, verbose)?;

    let Some(summary) = outcome.published else {
        return Err(CliError::ValidationFailed {
            errors: outcome.report.error_count(),
        });
    };

    println!();
    println!(
        "{} Published {} program(s) to {}",
        "✓".green().bold(),
        summary.programs,
        config.output_dir.display()
    );
    println!("  Documents:   {}", summary.documents);
    println!("  Suppressed:  {}", summary.suppressed);
    if summary.excluded > 0 {
        println!(
            "  {} {} record(s) with errors",
            "Excluded:".yellow(),
            summary.excluded
        );
    }
    println!(
        "  Cache:       {} reused, {} transformed, {} pruned",
        summary.cache_hits, summary.transformed, summary.pruned
    );

    Ok(())
}
