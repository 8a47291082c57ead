// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sightline - data-analyst backend with a Slack front door.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sightline_config::SightlineConfig;

/// Sightline - data-analyst backend with a Slack front door.
#[derive(Parser, Debug)]
#[command(name = "sightline", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server and the background worker.
    Serve,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Bootstrap organizations, users and API tokens.
    Admin {
        #[command(subcommand)]
        action: admin::AdminCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and report every problem found.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> Result<SightlineConfig, ExitCode> {
    let loaded = match path {
        Some(path) => sightline_config::load_and_validate_path(path),
        None => sightline_config::load_and_validate(),
    };
    loaded.map_err(|errors| {
        sightline_config::render_errors(&errors);
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Config {
            action: ConfigCommand::Check,
        } => {
            println!("configuration OK");
            println!("  server: {}:{}", config.server.host, config.server.port);
            println!("  database: {}", config.storage.database_path);
            println!(
                "  slack integration: {}",
                if config.slack.enabled { "enabled" } else { "disabled" }
            );
            println!(
                "  worker: {}",
                if config.worker.enabled { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        Commands::Admin { action } => admin::run(&config, action).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sightline: {e}");
            ExitCode::FAILURE
        }
    }
}
