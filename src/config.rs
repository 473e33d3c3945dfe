//! Pipeline configuration.
//!
//! Every tolerance of every stage is fixed at construction time through these
//! values. They deserialize from JSON with `#[serde(default)]`, so a file only
//! needs to name the fields it overrides:
//!
//! ```
//! use grimoire::GrimoireConfig;
//!
//! let config = GrimoireConfig::from_json(r#"{ "detector": { "star_proximity": 0.8 } }"#).unwrap();
//! assert_eq!(config.detector.star_proximity, 0.8);
//! assert_eq!(config.connections.dash_gap, 14.0);
//! ```

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::connections::ConnectionConfig;
use crate::detector::{DetectorConfig, SymbolDetector};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrimoireConfig {
    pub limits: ImageLimits,
    pub detector: DetectorConfig,
    pub connections: ConnectionConfig,
}

/// Largest input the pipeline accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLimits {
    pub max_width: u32,
    pub max_height: u32,
    /// Size of the encoded file, in bytes.
    pub max_file_bytes: u64,
}

impl Default for ImageLimits {
    fn default() -> Self {
        ImageLimits {
            max_width: 10_000,
            max_height: 10_000,
            max_file_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ImageLimits {
    /// Decoder limits enforcing the pixel dimensions.
    pub fn decoder_limits(&self) -> image::Limits {
        let mut limits = image::Limits::default();
        limits.max_image_width = Some(self.max_width);
        limits.max_image_height = Some(self.max_height);
        limits
    }

    pub fn admits(&self, width: u32, height: u32) -> bool {
        width <= self.max_width && height <= self.max_height
    }
}

impl GrimoireConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Read a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        GrimoireConfig::from_json(&text)
            .with_context(|| format!("parsing configuration {}", path.display()))
    }

    /// A detector running both front-end stages with these settings.
    pub fn detector(&self) -> SymbolDetector {
        SymbolDetector::new(self.detector.clone()).with_connection_config(self.connections.clone())
    }
}
