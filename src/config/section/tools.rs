//! `[tools.*]` external tool configuration.
//!
//! Each tool is a command array plus optional per-mode arguments. Arguments
//! may contain placeholders that are substituted per invocation:
//!
//! | Placeholder   | Value                                   |
//! |---------------|-----------------------------------------|
//! | `$INPUT`      | absolute path of the source file        |
//! | `$OUTPUT`     | absolute path of the file to produce    |
//! | `$OUTPUT_DIR` | absolute output directory of the step   |
//! | `$ROOT`       | project root                            |
//! | `$QUALITY`    | `[images] webp_quality` (webp only)     |
//!
//! # Example
//!
//! ```toml
//! [tools.sass]
//! command = ["npx", "sass", "--style=expanded", "$INPUT"]
//! dev_args = ["--embed-source-map"]
//! build_args = ["--no-source-map"]
//!
//! [tools.webp]
//! command = ["cwebp", "-quiet", "-q", "$QUALITY", "$INPUT", "-o", "$OUTPUT"]
//! ```
//!
//! Overriding a tool replaces the whole entry, including its mode arguments.

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;
use crate::core::Mode;

/// One external command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    pub command: Vec<String>,
    /// Appended in development mode.
    pub dev_args: Vec<String>,
    /// Appended in production mode.
    pub build_args: Vec<String>,
}

impl ToolConfig {
    fn new(command: &[&str]) -> Self {
        Self {
            command: command.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }

    fn with_mode_args(mut self, dev: &[&str], build: &[&str]) -> Self {
        self.dev_args = dev.iter().map(|s| (*s).to_string()).collect();
        self.build_args = build.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Program name (first element of the command).
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Full argument template for a mode: command followed by mode arguments.
    pub fn argv(&self, mode: Mode) -> impl Iterator<Item = &str> {
        let extra = match mode {
            Mode::Development => &self.dev_args,
            Mode::Production => &self.build_args,
        };
        self.command.iter().chain(extra).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Template engine: source on stdin, HTML on stdout.
    pub pug: ToolConfig,
    /// Sass compiler: CSS on stdout.
    pub sass: ToolConfig,
    /// Script bundler: bundle on stdout.
    pub bundler: ToolConfig,
    /// TTF/OTF to WOFF converter, writes `$OUTPUT`.
    pub woff: ToolConfig,
    /// TTF to WOFF2 converter, writes `$OUTPUT`.
    pub woff2: ToolConfig,
    /// Optional WebP encoder writing `$OUTPUT`; the builtin encoder is used when absent.
    pub webp: Option<ToolConfig>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pug: ToolConfig::new(&["npx", "pug", "--pretty", "--path", "$INPUT"]),
            sass: ToolConfig::new(&["npx", "sass", "--style=expanded", "$INPUT"])
                .with_mode_args(&["--embed-source-map"], &["--no-source-map"]),
            bundler: ToolConfig::new(&["npx", "esbuild", "$INPUT", "--bundle", "--target=es2015"]),
            woff: ToolConfig::new(&[
                "fonttools", "ttLib", "--flavor", "woff", "-o", "$OUTPUT", "$INPUT",
            ]),
            woff2: ToolConfig::new(&[
                "fonttools", "ttLib", "--flavor", "woff2", "-o", "$OUTPUT", "$INPUT",
            ]),
            webp: None,
        }
    }
}

impl ToolsConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        let named = [
            ("tools.pug", Some(&self.pug)),
            ("tools.sass", Some(&self.sass)),
            ("tools.bundler", Some(&self.bundler)),
            ("tools.woff", Some(&self.woff)),
            ("tools.woff2", Some(&self.woff2)),
            ("tools.webp", self.webp.as_ref()),
        ];
        for (field, tool) in named {
            if let Some(tool) = tool
                && tool.program().is_none_or(str::is_empty)
            {
                diag.error_with_hint(
                    format!("{field}.command"),
                    "command must not be empty",
                    "e.g. command = [\"npx\", \"sass\", \"$INPUT\"]",
                );
            }
        }
    }
}
