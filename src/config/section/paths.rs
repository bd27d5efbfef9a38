//! `[paths]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [paths]
//! source = "src"     # root of pug/, scss/, css/, js/, img/, fonts/
//! output = "dist"    # removed and rebuilt by every full run
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::config::ConfigDiagnostics;

/// Source and output roots, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: "src".into(),
            output: "dist".into(),
        }
    }
}

impl PathsConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for (field, path) in [("paths.source", &self.source), ("paths.output", &self.output)] {
            if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
                diag.error(field, format!("`{}` must stay inside the project root", path.display()));
            }
        }

        // The output directory is deleted on every run
        if is_root(&self.output) {
            diag.error_with_hint(
                "paths.output",
                "output cannot be the project root",
                "use a dedicated directory such as \"dist\"",
            );
        } else if self.source.starts_with(&self.output)
            || (!is_root(&self.source) && self.output.starts_with(&self.source))
        {
            diag.error(
                "paths.output",
                "source and output directories must not contain each other",
            );
        }
    }
}

fn is_root(path: &Path) -> bool {
    path.components().all(|c| c == Component::CurDir)
}
