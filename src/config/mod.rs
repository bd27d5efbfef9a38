//! Project configuration management for `assetline.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [paths] [build] [serve] [styles] [scripts] [images] [tools.*]
//! ├── types/         # ConfigError, ConfigDiagnostics
//! └── mod.rs         # ProjectConfig (this file)
//! ```
//!
//! The file is optional: without one every section takes its defaults and
//! the current directory is the project root. When present it is searched
//! upward from the current directory and its directory becomes the root.

pub mod section;
pub mod types;

pub use section::{
    BuildConfig, ImagesConfig, LintConfig, PathsConfig, ScriptsConfig, ServeConfig,
    StylesConfig, ToolConfig, ToolsConfig,
};
pub use types::{ConfigDiagnostics, ConfigError};

use crate::{
    cli::{Cli, Commands},
    debug, log,
    utils::fs::normalize_path,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Default config file name.
pub const CONFIG_FILE: &str = "assetline.toml";

/// Root configuration structure representing `assetline.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Absolute path to the config file, empty when running on defaults
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root: parent of the config file or the working directory
    #[serde(skip)]
    pub root: PathBuf,

    pub paths: PathsConfig,
    pub build: BuildConfig,
    pub serve: ServeConfig,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub images: ImagesConfig,
    pub tools: ToolsConfig,
}

impl ProjectConfig {
    /// Load configuration for the parsed command line.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match &cli.config {
            // An explicit path must exist
            Some(path) => {
                let path = cwd.join(path);
                if !path.is_file() {
                    return Err(ConfigError::Io(path, io::ErrorKind::NotFound.into()).into());
                }
                Self::from_path(&path)?
            }
            None => match find_config_file(&cwd, Path::new(CONFIG_FILE)) {
                Some(path) => Self::from_path(&path)?,
                None => {
                    debug!("config"; "no {} found, using defaults", CONFIG_FILE);
                    let mut config = Self::default();
                    config.root = normalize_path(&cwd);
                    config
                }
            },
        };

        config.apply_command_options(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        let path = normalize_path(path);
        config.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = path;
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// CLI flags override config values.
    fn apply_command_options(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Dev {
                mode,
                interface,
                port,
                no_watch,
            } => {
                update_option(&mut self.build.mode, mode.as_ref());
                update_option(&mut self.serve.interface, interface.as_ref());
                update_option(&mut self.serve.port, port.as_ref());
                if *no_watch {
                    self.serve.watch = false;
                }
            }
            Commands::Build { strict } => {
                self.build.strict |= *strict;
            }
            Commands::Linter | Commands::Clean => {}
        }
    }

    /// Validate all sections, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.paths.validate(&mut diag);
        self.styles.validate(&mut diag);
        self.scripts.validate(&mut diag);
        self.images.validate(&mut diag);
        self.tools.validate(&mut diag);
        diag.into_result()
    }

    /// Absolute source root.
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.paths.source)
    }
}

fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
    if let Some(option) = cli_option {
        *config_option = option.clone();
    }
}

/// Find config file by searching upward from `start`.
fn find_config_file(start: &Path, name: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

// ============================================================================
// Test Helpers
// ============================================================================

/// Parse a config snippet. Panics on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ProjectConfig {
    let (parsed, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
