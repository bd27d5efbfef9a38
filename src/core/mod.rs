//! Core types shared by every layer of the pipeline.
//!
//! - [`Mode`]: development or production, threaded explicitly through composition,
//!   routing and step execution
//! - [`AssetKind`]: the categories of source files the path table knows about
//! - `state`: process-wide shutdown handling

mod state;

pub use state::{is_shutdown, register_server, setup_shutdown_handler};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Build mode.
///
/// Selects the pipeline shape, the watch routing of style sources and the
/// extra arguments passed to external tools.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category of source asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Pug templates
    Markup,
    /// Sass entry point and partials
    StyleSource,
    /// Plain CSS copied as-is
    StyleRaw,
    /// JavaScript entry and modules
    Script,
    /// Raster and vector images (icons excluded)
    Image,
    /// SVG icons combined into the sprite
    Icon,
    /// TTF/OTF fonts
    Font,
}

impl AssetKind {
    pub const ALL: [Self; 7] = [
        Self::Markup,
        Self::StyleSource,
        Self::StyleRaw,
        Self::Script,
        Self::Image,
        Self::Icon,
        Self::Font,
    ];

    /// Position in [`AssetKind::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Markup => 0,
            Self::StyleSource => 1,
            Self::StyleRaw => 2,
            Self::Script => 3,
            Self::Image => 4,
            Self::Icon => 5,
            Self::Font => 6,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::StyleSource => "sass",
            Self::StyleRaw => "css",
            Self::Script => "script",
            Self::Image => "image",
            Self::Icon => "icon",
            Self::Font => "font",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
