//! Transform steps.
//!
//! A step turns the source set of one or more asset kinds into files under
//! the output root. Steps are created once, hold no state between runs and
//! receive everything they need through [`StepContext`].
//!
//! ```text
//! step/
//! ├── clean        # remove the output root
//! ├── markup       # pug -> html, validated by `hint`
//! ├── style        # raw css copy, dev and production sass, post-processed by `css`
//! ├── lint         # builtin sass lint
//! ├── script       # bundle + minify
//! ├── image        # per-format optimization (`svg` cleanup)
//! ├── webp         # webp siblings of optimized rasters
//! ├── sprite       # icon symbol sprite
//! └── font         # woff / woff2
//! ```

mod clean;
pub mod css;
mod font;
mod hint;
mod image;
pub mod lint;
mod markup;
mod script;
mod sprite;
mod style;
mod svg;
mod tool;
mod webp;

pub use clean::CleanStep;
pub use font::FontStep;
pub use image::ImageStep;
pub use lint::LintStep;
pub use markup::MarkupStep;
pub use script::ScriptStep;
pub use sprite::SpriteStep;
pub use style::{DevStyleStep, ProdStyleStep, RawStyleStep};
pub use webp::WebpStep;

use anyhow::Result;
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::ProjectConfig;
use crate::core::{AssetKind, Mode};
use crate::paths::PathTable;
use crate::reload::Refresh;

/// Identity of every step the composer and router can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepId {
    Clean,
    Markup,
    StylesRaw,
    StylesDev,
    StylesLint,
    StylesProd,
    Scripts,
    Images,
    Webp,
    Sprite,
    FontsWoff,
    FontsWoff2,
}

impl StepId {
    pub const ALL: [Self; 12] = [
        Self::Clean,
        Self::Markup,
        Self::StylesRaw,
        Self::StylesDev,
        Self::StylesLint,
        Self::StylesProd,
        Self::Scripts,
        Self::Images,
        Self::Webp,
        Self::Sprite,
        Self::FontsWoff,
        Self::FontsWoff2,
    ];

    /// Short stable name used in logs and live-reload messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Markup => "markup",
            Self::StylesRaw => "css",
            Self::StylesDev => "styles",
            Self::StylesLint => "lint",
            Self::StylesProd => "styles:prod",
            Self::Scripts => "scripts",
            Self::Images => "images",
            Self::Webp => "webp",
            Self::Sprite => "sprite",
            Self::FontsWoff => "woff",
            Self::FontsWoff2 => "woff2",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a step may read while running.
#[derive(Clone)]
pub struct StepContext {
    pub mode: Mode,
    pub config: Arc<ProjectConfig>,
    pub paths: Arc<PathTable>,
}

impl StepContext {
    pub fn new(mode: Mode, config: Arc<ProjectConfig>) -> Result<Self> {
        let paths = Arc::new(PathTable::from_config(&config)?);
        Ok(Self {
            mode,
            config,
            paths,
        })
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Root-relative display form of a path.
    pub fn display<'a>(&self, path: &'a Path) -> std::path::Display<'a> {
        self.paths.relative(path).unwrap_or(path).display()
    }
}

/// What a successful step produced.
#[derive(Debug, Default, Clone)]
pub struct StepReport {
    pub written: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl StepReport {
    pub fn wrote(&mut self, path: PathBuf) {
        self.written.push(path);
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Failure of a step.
#[derive(Debug, Error)]
pub enum StepError {
    /// An external tool or library rejected its input. Logged; a watch series continues.
    #[error("{tool}: {message}")]
    Tool { tool: String, message: String },

    /// Rendered output failed structural validation.
    #[error("{}:{line}: {message}", path.display())]
    Validation {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("I/O error at `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepError {
    pub fn tool(tool: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error stops a watch series.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Tool { .. })
    }
}

/// A unit of transformation scheduled by the executor.
pub trait TransformStep: Send + Sync {
    fn id(&self) -> StepId;

    /// Asset kinds the step reads. Clean reads none.
    fn inputs(&self) -> &'static [AssetKind] {
        &[]
    }

    /// Notification sent to the dev server after a successful run.
    fn refresh(&self) -> Option<Refresh> {
        None
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError>;
}

/// Step implementations by id.
#[derive(Clone, Default)]
pub struct Registry {
    steps: FxHashMap<StepId, Arc<dyn TransformStep>>,
}

impl Registry {
    /// Registry holding every builtin step.
    pub fn builtin() -> Self {
        Self::default()
            .with(CleanStep)
            .with(MarkupStep)
            .with(RawStyleStep)
            .with(DevStyleStep)
            .with(LintStep)
            .with(ProdStyleStep)
            .with(ScriptStep)
            .with(ImageStep)
            .with(WebpStep)
            .with(SpriteStep)
            .with(FontStep::woff())
            .with(FontStep::woff2())
    }

    /// Register a step, replacing any step with the same id.
    pub fn with(mut self, step: impl TransformStep + 'static) -> Self {
        self.steps.insert(step.id(), Arc::new(step));
        self
    }

    pub fn get(&self, id: StepId) -> Option<Arc<dyn TransformStep>> {
        self.steps.get(&id).cloned()
    }

    /// Whether the step registered under `id` reads `kind`.
    pub fn reads(&self, id: StepId, kind: AssetKind) -> bool {
        self.steps.get(&id).is_some_and(|s| s.inputs().contains(&kind))
    }
}

/// Log a step's warnings under its name.
pub fn log_warnings(id: StepId, report: &StepReport) {
    for warning in &report.warnings {
        crate::log!(id.name(); "{}", warning);
    }
}

/// Output path for `source` under `out_dir`, keeping its path below `base`.
pub fn mirrored(source: &Path, base: &Path, out_dir: &Path) -> PathBuf {
    match source.strip_prefix(base) {
        Ok(relative) if !relative.as_os_str().is_empty() => out_dir.join(relative),
        _ => out_dir.join(source.file_name().unwrap_or_default()),
    }
}

/// File stem as an owned string.
pub fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for step tests.

    use super::*;
    use tempfile::TempDir;

    /// Context rooted at `dir` with a config snippet applied.
    pub fn context(dir: &TempDir, mode: Mode, toml: &str) -> StepContext {
        let mut config = crate::config::test_parse_config(toml);
        config.root = dir.path().to_path_buf();
        StepContext::new(mode, Arc::new(config)).unwrap()
    }

    /// Write a file below `dir`, creating parents.
    pub fn put(dir: &TempDir, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = dir.path().join(relative);
        crate::utils::fs::write_file(&path, contents).unwrap();
        path
    }
}
