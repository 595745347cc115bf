//! TOML configuration of default session options.
//!
//! ```toml
//! [export]
//! iges_version = "5.3"
//! step_schema = "AP203"
//!
//! [import]
//! read_timeout_secs = 30
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ExchangeError, Result};
use crate::options::{ExportOptions, ImportOptions};

/// Root of the configuration file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeConfig {
    /// Defaults for exporters.
    pub export: ExportConfig,
    /// Defaults for importers.
    pub import: ImportConfig,
}

/// `[export]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// IGES version, `5.1` or `5.3`.
    pub iges_version: Option<String>,
    /// STEP schema, `AP203` or `AP214CD`.
    pub step_schema: Option<String>,
}

/// `[import]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Read budget in seconds; unbounded when absent.
    pub read_timeout_secs: Option<u64>,
}

impl ExchangeConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ExchangeError::Config(e.to_string()))?;
        config.export_options()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ExchangeError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded exchange configuration");
        Ok(config)
    }

    /// Export options carrying the configured values, checked against the
    /// format registry.
    pub fn export_options(&self) -> Result<ExportOptions> {
        let mut options = ExportOptions::new();
        if let Some(version) = &self.export.iges_version {
            options = options.iges_version(version.as_str());
        }
        if let Some(schema) = &self.export.step_schema {
            options = options.step_schema(schema.as_str());
        }
        options.resolved_iges_version()?;
        options.resolved_step_schema()?;
        Ok(options)
    }

    /// Import options carrying the configured values.
    pub fn import_options(&self) -> ImportOptions {
        match self.import.read_timeout_secs {
            Some(secs) => ImportOptions::new().read_timeout(Duration::from_secs(secs)),
            None => ImportOptions::new(),
        }
    }
}
