// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use docker_elastic_agents_core::domain::plugin_config::PluginConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with every default spelled out
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./elastic-agents.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output } => generate(output),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = PluginConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. ELASTIC_AGENTS_CONFIG_PATH: {}",
            std::env::var("ELASTIC_AGENTS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./elastic-agents.yaml");
        println!("  4. ~/.elastic-agents/config.yaml");
        println!("  5. /etc/elastic-agents/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Docker:".bold());
    println!(
        "  Socket: {}",
        spec.docker.socket_path.as_deref().unwrap_or("(local default)")
    );
    println!("  Timeout: {:?}", spec.docker.timeout);
    println!();

    println!("{}", "Agent:".bold());
    println!("  Image: {}", spec.agent.image);
    println!("  Working dir: {}", spec.agent.working_dir);
    println!("  Artifact: {}", spec.agent.artifact_path.display());
    println!("  Server URL: {}", spec.agent.server_url);
    println!("  Staging root: {}", spec.agent.staging_root().display());
    println!();

    println!("{}", "Pool:".bold());
    println!("  Create deadline: {:?}", spec.pool.create_deadline);
    println!("  Max agent age: {:?}", spec.pool.max_agent_age);
    println!("  Orphan grace: {:?}", spec.pool.orphan_grace);
    if spec.pool.reaper_enabled {
        println!("  Reaper: every {:?}", spec.pool.reconcile_interval);
    } else {
        println!("  Reaper: {}", "disabled".yellow());
    }
    println!();

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", spec.server.bind_address, spec.server.port);
    match spec.observability.metrics_port {
        Some(port) => println!("  Metrics: {}:{}", spec.server.bind_address, port),
        None => println!("  Metrics: {}", "(disabled)".dimmed()),
    }
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = PluginConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf) -> Result<()> {
    let yaml = PluginConfigManifest::default()
        .to_yaml_string()
        .context("Failed to render configuration")?;

    std::fs::write(&output, yaml)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
