//! assetline - a front-end asset pipeline with a live-reload dev server.

mod cli;
mod config;
mod core;
mod embed;
mod logger;
mod paths;
mod pipeline;
mod reload;
mod step;
mod utils;
mod watch;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::ProjectConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = Arc::new(ProjectConfig::load(&cli)?);

    match &cli.command {
        Commands::Dev { .. } => cli::dev::run_dev(&config),
        Commands::Build { .. } => cli::build::build_project(&config),
        Commands::Linter => cli::lint::lint_styles(&config),
        Commands::Clean => cli::build::clean_project(&config),
    }
}
