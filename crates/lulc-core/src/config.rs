use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assignment::DEFAULT_LABEL_PREFIX;
use crate::error::{Cause, RemapError, Result};
use crate::raster::BackendMode;

/// Engine settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `auto`, `geotiff` or `dry-run`.
    pub mode: BackendMode,
    /// Appended to output paths that have no extension.
    pub default_extension: String,
    /// Synthetic class names read `"{label_prefix} {value}"`.
    pub label_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Auto,
            default_extension: "tif".to_string(),
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_err = |source: Cause| RemapError::Config {
            path: path.to_path_buf(),
            source,
        };
        let text = fs::read_to_string(path).map_err(|e| config_err(e.into()))?;
        serde_json::from_str(&text).map_err(|e| config_err(e.into()))
    }

    pub fn dry_run() -> Self {
        Self {
            mode: BackendMode::DryRun,
            ..Self::default()
        }
    }
}
