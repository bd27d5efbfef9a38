//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! mode = "development"   # pipeline used by `assetline dev`
//! strict = false         # any failed step fails the run, not only ordering-critical ones
//! ```

use serde::{Deserialize, Serialize};

use crate::core::Mode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Mode used by the `dev` command (`build` is always production).
    pub mode: Mode,
    pub strict: bool,
}
