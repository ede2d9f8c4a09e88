//! Configuration loading and parsing
//!
//! An optional TOML file supplies the DBC path and the generation settings;
//! command line flags override whatever it sets.

use crate::codegen::{Sdk, DEFAULT_HEADER_NAME};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from vera.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default = "default_dbc")]
    pub dbc: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { dbc: default_dbc() }
    }
}

fn default_dbc() -> PathBuf {
    PathBuf::from("config.dbc")
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    pub build_dir: Option<PathBuf>,
    #[serde(default = "default_header_name")]
    pub header_name: String,
    pub sdk: Option<Sdk>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            build_dir: None,
            header_name: default_header_name(),
            sdk: None,
        }
    }
}

fn default_header_name() -> String {
    DEFAULT_HEADER_NAME.to_string()
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dbc: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
    pub header_name: Option<String>,
    pub sdk: Option<Sdk>,
}

impl AppConfig {
    /// Apply command line values on top of the file values
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(dbc) = overrides.dbc {
            self.input.dbc = dbc;
        }
        if let Some(build_dir) = overrides.build_dir {
            self.output.build_dir = Some(build_dir);
        }
        if let Some(header_name) = overrides.header_name {
            self.output.header_name = header_name;
        }
        if let Some(sdk) = overrides.sdk {
            self.output.sdk = Some(sdk);
        }
        self
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
