//! Engine-wide writer settings.

use std::path::Path;

use serde::Deserialize;

use crate::backend::Compression;
use crate::error::WriterError;

/// Settings passed to the engine at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Upper bound on worker threads per pool; `0` means one per element
    pub workers: usize,
    /// Skip unknown template tags with a warning instead of failing
    pub skip_unsupported_tags: bool,
    /// `canfail` value of strategies that do not set it
    pub default_can_fail: bool,
    /// Replace an existing file in `open_file`
    pub overwrite: bool,
    /// Write `file_name`, `file_time` and `NX_class` on the file root
    pub file_attributes: bool,
    /// Compression used by fields whose strategy enables it without details
    pub default_compression: Compression,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            workers: 100,
            skip_unsupported_tags: false,
            default_can_fail: false,
            overwrite: true,
            file_attributes: true,
            default_compression: Compression::default(),
        }
    }
}

impl WriterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_skip_unsupported_tags(mut self, skip: bool) -> Self {
        self.skip_unsupported_tags = skip;
        self
    }

    pub fn with_default_can_fail(mut self, can_fail: bool) -> Self {
        self.default_can_fail = can_fail;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_file_attributes(mut self, enabled: bool) -> Self {
        self.file_attributes = enabled;
        self
    }

    pub fn with_default_compression(mut self, compression: Compression) -> Self {
        self.default_compression = compression;
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, WriterError> {
        serde_json::from_str(s).map_err(|e| WriterError::Config(e.to_string()))
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(s: &str) -> Result<Self, WriterError> {
        serde_yaml::from_str(s).map_err(|e| WriterError::Config(e.to_string()))
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(s: &str) -> Result<Self, WriterError> {
        toml::from_str(s).map_err(|e| WriterError::Config(e.to_string()))
    }

    /// Load a config file, picking the format from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WriterError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Self::from_json_str(&content),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Self::from_yaml_str(&content),
            #[cfg(feature = "toml")]
            "toml" => Self::from_toml_str(&content),
            other => Err(WriterError::Config(format!(
                "unsupported config format '{}'",
                other
            ))),
        }
    }
}
