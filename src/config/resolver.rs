//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`SX_INSIGHT_ENDPOINT`, `SX_API_TOKEN`, `SX_DATA`)
//! 3. Project sextant.kdl (`./sextant.kdl` or `--config <path>`)
//! 4. System config.kdl (`~/.config/sextant/config.kdl`)
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::schema::{
    OutputFormat, SextantConfig, mask_secret, validate_debounce_ms, validate_timeout_secs,
};
use crate::insight::scheduler::DEFAULT_DEBOUNCE_MS;
use crate::{Error, Result};

/// Environment variable for the insight endpoint.
pub const INSIGHT_ENDPOINT_ENV: &str = "SX_INSIGHT_ENDPOINT";

/// Environment variable for the API bearer token.
pub const API_TOKEN_ENV: &str = "SX_API_TOKEN";

/// Environment variable for the entity data source.
pub const DATA_ENV: &str = "SX_DATA";

/// Overrides the system config directory (used by tests).
pub const CONFIG_DIR_ENV: &str = "SX_CONFIG_DIR";

/// Project-level config file name, looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "sextant.kdl";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from the project sextant.kdl
    Project,
    /// Value from the system config.kdl
    System,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Project => write!(f, "project"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Locations of the config files to layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    pub system: Option<PathBuf>,
    pub project: Option<PathBuf>,
}

impl ConfigPaths {
    /// Standard locations. An explicit project path must exist; the implicit
    /// `./sextant.kdl` is used only if present.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let project = match explicit {
            Some(path) if !path.exists() => {
                return Err(Error::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(PROJECT_CONFIG_FILE)).filter(|p| p.exists()),
        };
        Ok(Self {
            system: Self::system_config_path(),
            project,
        })
    }

    /// `$SX_CONFIG_DIR/config.kdl`, else `~/.config/sextant/config.kdl`.
    pub fn system_config_path() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir).join("config.kdl")),
            _ => dirs::config_dir().map(|d| d.join("sextant").join("config.kdl")),
        }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub insight_endpoint: Option<String>,
    pub debounce_ms: Option<u64>,
    pub output_format: Option<OutputFormat>,
    pub data_file: Option<String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_insight_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.insight_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = Some(ms);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_data_file(mut self, data: impl Into<String>) -> Self {
        self.data_file = Some(data.into());
        self
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub insight_endpoint: Option<Resolved<String>>,
    #[serde(skip)]
    pub api_token: Option<Resolved<String>>,
    pub debounce_ms: Resolved<u64>,
    pub request_timeout_secs: Resolved<u64>,
    pub output_format: Resolved<OutputFormat>,
    pub data_file: Option<Resolved<String>>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            insight_endpoint: None,
            api_token: None,
            debounce_ms: Resolved::new(DEFAULT_DEBOUNCE_MS, ValueSource::Default),
            request_timeout_secs: Resolved::new(DEFAULT_REQUEST_TIMEOUT_SECS, ValueSource::Default),
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            data_file: None,
        }
    }
}

impl ResolvedConfig {
    pub fn insight_endpoint(&self) -> Option<&str> {
        self.insight_endpoint.as_ref().map(|r| r.value.as_str())
    }

    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_ref().map(|r| r.value.as_str())
    }

    /// Token with the middle hidden, for display.
    pub fn masked_token(&self) -> Option<String> {
        self.api_token().map(mask_secret)
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    pub fn data_file(&self) -> Option<&str> {
        self.data_file.as_ref().map(|r| r.value.as_str())
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms.value)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.value)
    }
}

/// Resolve configuration from files, process environment and CLI flags.
pub fn resolve_config(paths: &ConfigPaths, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    resolve_config_with_env(paths, overrides, |name| std::env::var(name).ok())
}

/// Resolve configuration with an explicit environment lookup.
pub fn resolve_config_with_env(
    paths: &ConfigPaths,
    overrides: &ConfigOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let system = match &paths.system {
        Some(path) => SextantConfig::load(path)?,
        None => SextantConfig::default(),
    };
    let project = match &paths.project {
        Some(path) => SextantConfig::load(path)?,
        None => SextantConfig::default(),
    };
    let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    let mut result = ResolvedConfig::default();

    result.insight_endpoint = pick(
        overrides.insight_endpoint.clone(),
        env(INSIGHT_ENDPOINT_ENV).map(|v| (v, INSIGHT_ENDPOINT_ENV)),
        project.insight_endpoint.clone(),
        system.insight_endpoint.clone(),
    );
    result.api_token = pick(
        None,
        env(API_TOKEN_ENV).map(|v| (v, API_TOKEN_ENV)),
        project.api_token.clone(),
        system.api_token.clone(),
    );
    result.data_file = pick(
        overrides.data_file.clone(),
        env(DATA_ENV).map(|v| (v, DATA_ENV)),
        project.data_file.clone(),
        system.data_file.clone(),
    );
    if let Some(ms) = pick(overrides.debounce_ms, None, project.debounce_ms, system.debounce_ms) {
        result.debounce_ms = ms;
    }
    if let Some(secs) = pick(None, None, project.request_timeout_secs, system.request_timeout_secs) {
        result.request_timeout_secs = secs;
    }
    if let Some(format) = pick(overrides.output_format, None, project.output_format, system.output_format) {
        result.output_format = format;
    }

    validate_debounce_ms(result.debounce_ms.value).map_err(Error::InvalidConfig)?;
    validate_timeout_secs(result.request_timeout_secs.value).map_err(Error::InvalidConfig)?;

    Ok(result)
}

fn pick<T>(
    cli: Option<T>,
    env: Option<(T, &str)>,
    project: Option<T>,
    system: Option<T>,
) -> Option<Resolved<T>> {
    if let Some(value) = cli {
        return Some(Resolved::new(value, ValueSource::CliFlag));
    }
    if let Some((value, name)) = env {
        return Some(Resolved::new(value, ValueSource::EnvVar(name.to_string())));
    }
    if let Some(value) = project {
        return Some(Resolved::new(value, ValueSource::Project));
    }
    system.map(|value| Resolved::new(value, ValueSource::System))
}
