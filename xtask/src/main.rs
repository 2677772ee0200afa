//! Build automation tasks for CDP
//!
//! Currently one task: rendering the CLI reference from the clap definitions.

use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for CDP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<cdp_cli::Cli>();

    let content = format!(
        r#"# CDP CLI Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

CDP (Community Directory Pipeline) turns hand-authored YAML program records
into the static JSON dataset served to the community directory apps. Records
are validated against reference tables, transformed incrementally and
published atomically.

## Quick Start

```bash
# Check every record
cdp validate

# Publish the dataset to dist/api
cdp generate

# Inspect the build cache and the published dataset
cdp status
```

## Configuration

Settings are read from `cdp.toml` (or `--config FILE`), then `CDP_*`
environment variables, then flags:

```toml
records_dir = "data/records"
reference_dir = "data/reference"
output_dir = "dist/api"
cache_dir = ".cdp-cache"
concurrency = 8
```

Set `SOURCE_DATE_EPOCH` to pin the timestamp in `metadata.json` for
reproducible builds.

## Exit Codes

| Code | Meaning |
|------|---------|
| 0 | Success (warnings allowed) |
| 1 | Validation errors or a fatal error; nothing was published |
| 2 | Usage error |

## Commands

{}

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)
        .with_context(|| format!("Failed to write {}", file_path.display()))?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
