//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::core::Mode;

/// Front-end asset pipeline with a live-reload dev server
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: assetline.toml, searched upward)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build, then watch sources and serve the output with live reload
    #[command(visible_alias = "d")]
    Dev {
        /// Pipeline to run (default from [build] mode)
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve without watching sources
        #[arg(long)]
        no_watch: bool,
    },

    /// Clean and run the production pipeline once
    #[command(visible_alias = "prod")]
    Build {
        /// Fail the run when any step fails
        #[arg(long)]
        strict: bool,
    },

    /// Lint Sass sources
    Linter,

    /// Remove the output directory
    Clean,
}
