//! `[styles]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [styles]
//! browsers = ["last 2 versions"]   # browserslist query for vendor prefixing
//!
//! [styles.lint]
//! enable = true
//! max_nesting_depth = 4
//! disable = ["declaration-no-important"]
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;
use crate::step::lint::RULES;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Browserslist queries used as prefixing targets.
    pub browsers: Vec<String>,
    pub lint: LintConfig,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            browsers: vec!["last 2 versions".into()],
            lint: LintConfig::default(),
        }
    }
}

/// Settings for the builtin Sass lint pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    pub enable: bool,
    pub max_nesting_depth: usize,
    /// Rule names to turn off.
    pub disable: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            enable: true,
            max_nesting_depth: 4,
            disable: Vec::new(),
        }
    }
}

impl LintConfig {
    pub fn is_enabled(&self, rule: &str) -> bool {
        self.enable && !self.disable.iter().any(|r| r == rule)
    }
}

impl StylesConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if let Err(e) = lightningcss::targets::Browsers::from_browserslist(&self.browsers) {
            diag.error("styles.browsers", format!("invalid browserslist query: {e}"));
        }

        for rule in &self.lint.disable {
            if !RULES.contains(&rule.as_str()) {
                diag.error_with_hint(
                    "styles.lint.disable",
                    format!("unknown lint rule `{rule}`"),
                    format!("known rules: {}", RULES.join(", ")),
                );
            }
        }
    }
}
