//! CDP CLI - Main entry point

use cdp_cli::commands;
use cdp_cli::{Cli, Commands, ConfigCommand};
use cdp_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Pick up CDP_* and LOG_* settings from a local .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(ref command) = cli.command else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    // Console logs go to stderr; stdout carries the report
    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .output(LogOutput::Console)
        .log_file_prefix("cdp")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(&cli, command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, command: &Commands) -> cdp_cli::Result<()> {
    let config = cli.load_config()?;

    match command {
        Commands::Validate(args) => commands::validate::run(&config, args, cli.verbose).await,
        Commands::Generate(args) => commands::generate::run(&config, args, cli.verbose).await,
        Commands::Status => commands::status::run(&config).await,
        Commands::Clean => commands::clean::run(&config).await,
        Commands::Config { command } => match command {
            ConfigCommand::Get { key } => commands::config::get(&config, key).await,
            ConfigCommand::Show => commands::config::show(&config, cli.config.as_deref()).await,
        },
    }
}
