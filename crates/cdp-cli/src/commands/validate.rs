//! `cdp validate` command implementation
//!
//! Checks every record and prints the consolidated report. Nothing is written
//! except the optional JSON report.

use crate::config::Config;
use crate::error::{CliError, Result};
use crate::pipeline;
use crate::progress::create_spinner;
use crate::validate::{RenderOptions, ValidationReport};
use crate::ReportArgs;
use colored::Colorize;

/// Validate the corpus
pub async fn run(config: &Config, args: &ReportArgs, verbose: bool) -> Result<()> {
    let spinner = create_spinner("Validating records...", verbose);
    let checked = pipeline::check(config).await;
    spinner.finish_and_clear();

    let report = checked?.validation.report;
    emit_report(&report, args, verbose)?;

    match report.error_count() {
        0 => Ok(()),
        errors => Err(CliError::ValidationFailed { errors }),
    }
}

/// Print the report and write the JSON artifact when requested
pub(crate) fn emit_report(report: &ValidationReport, args: &ReportArgs, verbose: bool) -> Result<()> {
    print!(
        "{}",
        report.render(RenderOptions {
            errors_only: args.errors_only,
            verbose,
        })
    );

    if let Some(ref path) = args.report {
        report.write_json(path)?;
        println!("{} Report written to {}", "→".cyan(), path.display());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &std::path::Path) -> Config {
        let reference = root.join("reference");
        fs::create_dir_all(&reference).unwrap();
        fs::create_dir_all(root.join("records")).unwrap();
        fs::write(reference.join("categories.yml"), "- key: food\n  label: Food\n").unwrap();
        fs::write(reference.join("groups.yml"), "- key: families\n  label: Families\n").unwrap();
        fs::write(reference.join("areas.yml"), "- key: alameda\n  label: Alameda\n").unwrap();
        fs::write(reference.join("cities.yml"), "Alameda: [Oakland]\n").unwrap();

        Config {
            records_dir: root.join("records"),
            reference_dir: reference,
            output_dir: root.join("dist/api"),
            cache_dir: root.join(".cdp-cache"),
            concurrency: 1,
        }
    }

    #[tokio::test]
    async fn test_validate_reports_failure() {
        let temp = TempDir::new().unwrap();
        let config = config(temp.path());
        fs::write(config.records_dir.join("a.yml"), "name: Pantry\ncategory: snacks\n").unwrap();

        let report_path = temp.path().join("report.json");
        let args = ReportArgs {
            errors_only: false,
            report: Some(report_path.clone()),
        };
        let result = run(&config, &args, false).await;

        assert!(matches!(result, Err(CliError::ValidationFailed { errors: 3 })));
        assert!(report_path.exists());
        assert!(!config.output_dir.exists());
    }

    #[tokio::test]
    async fn test_validate_passes_clean_corpus() {
        let temp = TempDir::new().unwrap();
        let config = config(temp.path());
        fs::write(
            config.records_dir.join("a.yml"),
            "name: Pantry\ncategory: food\ngroup: families\narea: alameda\n",
        )
        .unwrap();

        run(&config, &ReportArgs::default(), false).await.unwrap();
    }
}
