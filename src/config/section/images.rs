//! `[images]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [images]
//! jpeg_quality = 75
//! webp_quality = 75   # passed to [tools.webp] as $QUALITY
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub jpeg_quality: u8,
    pub webp_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            webp_quality: 75,
        }
    }
}

impl ImagesConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for (field, value) in [
            ("images.jpeg_quality", self.jpeg_quality),
            ("images.webp_quality", self.webp_quality),
        ] {
            if !(1..=100).contains(&value) {
                diag.error(field, format!("quality {value} is outside 1..=100"));
            }
        }
    }
}
