//! Binary entry point for codeintel-retention.
//!
//! This binary runs the upload expirer and provides administrative commands
//! for the retention store.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use codeintel_retention::config::RetentionAppConfig;
use codeintel_retention::observability::{self, InitOptions};
use commands::{PolicyAction, UploadAction};
use std::path::PathBuf;
use std::process::ExitCode;

/// codeintel-retention - retention scanning for code-intelligence uploads.
#[derive(Parser)]
#[command(name = "codeintel-retention")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "CODEINTEL_RETENTION_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the upload expirer periodically until interrupted.
    Run,

    /// Run a single retention scan and print its summary.
    Scan,

    /// Manage retention policies.
    Policies {
        /// Policy subcommand.
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Manage uploads.
    Uploads {
        /// Upload subcommand.
        #[command(subcommand)]
        action: UploadAction,
    },

    /// Manage configuration.
    Config {
        /// Show the effective configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match RetentionAppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let long_running = matches!(cli.command, Commands::Run);
    let _observability = match observability::init_from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: long_running,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(cli: Cli, config: RetentionAppConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run => commands::cmd_run(&config).await,
        Commands::Scan => commands::cmd_scan(&config).await,
        Commands::Policies { action } => commands::cmd_policies(&config, action),
        Commands::Uploads { action } => commands::cmd_uploads(&config, action),
        Commands::Config { show } => commands::cmd_config(&config, show),
    }
}
