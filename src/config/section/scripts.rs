//! `[scripts]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [scripts]
//! output = "script.js"   # bundle file name under <output>/js
//! minify = true
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub output: String,
    pub minify: bool,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            output: "script.js".into(),
            minify: true,
        }
    }
}

impl ScriptsConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.output.is_empty() || self.output.contains(['/', '\\']) {
            diag.error("scripts.output", "must be a plain file name");
        }
    }
}
