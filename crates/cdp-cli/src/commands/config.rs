//! `cdp config` command implementation
//!
//! Shows the effective configuration after defaults, `cdp.toml`, `CDP_*`
//! environment variables and flags have been layered.

use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::error::Result;
use colored::Colorize;
use std::path::Path;

/// Get configuration value
pub async fn get(config: &Config, key: &str) -> Result<()> {
    println!("{}", config.get(key)?);
    Ok(())
}

/// Show all configuration
pub async fn show(config: &Config, file: Option<&Path>) -> Result<()> {
    println!("{}", "CDP Configuration:".cyan().bold());
    println!();
    for key in Config::keys() {
        println!("{:<15} {}", format!("{key}:"), config.get(key)?);
    }

    println!();
    let source = match file {
        Some(path) => path.display().to_string(),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => DEFAULT_CONFIG_FILE.to_string(),
        None => "built-in defaults".to_string(),
    };
    println!("{} {}", "Config file:".cyan(), source);
    println!("{}", "Environment Variables:".cyan());
    for key in Config::keys() {
        println!("  {}", format_env_var(key));
    }

    Ok(())
}

/// Format config key as environment variable name
fn format_env_var(key: &str) -> String {
    format!("CDP_{}", key.to_uppercase())
}
