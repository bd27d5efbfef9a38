//! Configuration sections of `assetline.toml`.

mod build;
mod images;
mod paths;
mod scripts;
mod serve;
mod styles;
mod tools;

pub use build::BuildConfig;
pub use images::ImagesConfig;
pub use paths::PathsConfig;
pub use scripts::ScriptsConfig;
pub use serve::ServeConfig;
pub use styles::{LintConfig, StylesConfig};
pub use tools::{ToolConfig, ToolsConfig};
