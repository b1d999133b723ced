// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Docker Elastic Agents
//!
//! The `elastic-agents` binary hosts the plugin service the CI server talks
//! to when it needs single-use build agents.
//!
//! ## Commands
//!
//! - `elastic-agents serve` - Run the plugin service
//! - `elastic-agents config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod server;

use commands::ConfigCommand;

/// Docker Elastic Agents - single-use build agents for the CI server
#[derive(Parser)]
#[command(name = "elastic-agents")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "ELASTIC_AGENTS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true, env = "ELASTIC_AGENTS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true, env = "ELASTIC_AGENTS_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the plugin service
    #[command(name = "serve")]
    Serve {
        /// HTTP API port (overrides the config file)
        #[arg(long, env = "ELASTIC_AGENTS_PORT")]
        port: Option<u16>,

        /// HTTP API bind address (overrides the config file)
        #[arg(long, env = "ELASTIC_AGENTS_HOST")]
        host: Option<String>,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port, host }) => {
            let mut config =
                docker_elastic_agents_core::domain::plugin_config::PluginConfigManifest::load_or_default(
                    cli.config,
                )
                .context("Failed to load configuration")?;
            if let Some(port) = port {
                config.spec.server.port = port;
            }
            if let Some(host) = host {
                config.spec.server.bind_address = host;
            }

            let observability = &config.spec.observability;
            init_logging(
                cli.log_level.as_deref().unwrap_or(&observability.log_level),
                cli.log_format.as_deref().unwrap_or(&observability.log_format),
            )?;

            server::run(config).await
        }
        Some(Commands::Config { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}
