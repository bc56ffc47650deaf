//! Configuration loading
//!
//! Settings come from a single TOML bootstrap file. The file is located by
//! priority:
//! 1. Command-line `--config` path
//! 2. `CROWDCAST_CONFIG` environment variable
//! 3. `<config_dir>/crowdcast/config.toml` when it exists
//! 4. Compiled defaults
//!
//! A configured path that is missing or unreadable is not fatal: a warning is
//! logged and defaults are used. A file that exists but does not parse or
//! validate is a `Config` error.

use crate::cdf::DEFAULT_CDF_LENGTH;
use crate::clip::ClipLimits;
use crate::error::{Error, Result};
use crate::submission::DEFAULT_SAMPLES_FOR_FIT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "CROWDCAST_CONFIG";

/// Question API root
pub const DEFAULT_QUESTIONS_URL: &str = "https://www.metaculus.com/api2";

/// GraphQL endpoint of the CDF platform
pub const DEFAULT_CDF_ENDPOINT: &str = "https://prediction-backend.herokuapp.com/graphql";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub api: ApiConfig,
    pub sampling: SamplingConfig,
    /// Overrides for the submission clipping limits
    pub clipping: ClipLimits,
    pub logging: LoggingConfig,
}

/// Remote endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub questions_url: String,
    pub cdf_endpoint: String,
    pub timeout_secs: u64,
    /// Needed for player-status listing filters
    pub user_id: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            questions_url: DEFAULT_QUESTIONS_URL.to_string(),
            cdf_endpoint: DEFAULT_CDF_ENDPOINT.to_string(),
            timeout_secs: 30,
            user_id: None,
        }
    }
}

/// Sample counts and RNG seeding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub samples_for_fit: usize,
    pub community_samples: usize,
    pub cdf_length: usize,
    /// Fixed seed for reproducible runs; entropy when unset
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples_for_fit: DEFAULT_SAMPLES_FOR_FIT,
            community_samples: 1000,
            cdf_length: DEFAULT_CDF_LENGTH,
            seed: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or an EnvFilter directive
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == 0 {
            return Err(Error::Config("api.timeout_secs must be positive".to_string()));
        }
        if self.sampling.samples_for_fit == 0 {
            return Err(Error::Config("sampling.samples_for_fit must be positive".to_string()));
        }
        if self.sampling.cdf_length < 2 {
            return Err(Error::Config(format!(
                "sampling.cdf_length must be at least 2, got {}",
                self.sampling.cdf_length
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::Config("logging.level must not be empty".to_string()));
        }
        self.clipping.validate()
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserConfigDir(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p)
            | ConfigSource::Environment(p)
            | ConfigSource::UserConfigDir(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

/// `<config_dir>/crowdcast/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("crowdcast").join("config.toml"))
}

/// Locates and loads the config file by priority
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
    env_var: String,
    user_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self {
            cli_path,
            env_var: CONFIG_ENV_VAR.to_string(),
            user_path: default_config_path(),
        }
    }

    /// Read the config path from a different environment variable
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Override the per-user config location
    pub fn with_user_path(mut self, path: Option<PathBuf>) -> Self {
        self.user_path = path;
        self
    }

    /// Highest-priority source that names a file
    pub fn source(&self) -> ConfigSource {
        if let Some(path) = &self.cli_path {
            return ConfigSource::CommandLine(path.clone());
        }
        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return ConfigSource::Environment(PathBuf::from(path));
            }
        }
        match &self.user_path {
            Some(path) if path.exists() => ConfigSource::UserConfigDir(path.clone()),
            _ => ConfigSource::Defaults,
        }
    }

    /// Load the effective configuration
    pub fn resolve(&self) -> Result<(TomlConfig, ConfigSource)> {
        let source = self.source();
        let path = match source.path() {
            Some(path) => path.to_path_buf(),
            None => {
                info!("No config file found, using defaults");
                return Ok((TomlConfig::default(), source));
            }
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let config = TomlConfig::from_toml_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                info!("Loaded config from {}", path.display());
                Ok((config, source))
            }
            Err(e) => {
                warn!(
                    "Config file {} could not be read ({}), using defaults",
                    path.display(),
                    e
                );
                Ok((TomlConfig::default(), ConfigSource::Defaults))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.api.questions_url, DEFAULT_QUESTIONS_URL);
        assert_eq!(config.sampling.samples_for_fit, 5000);
        assert_eq!(config.sampling.community_samples, 1000);
        assert_eq!(config.sampling.cdf_length, 100);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.clipping, ClipLimits::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [sampling]
            seed = 42

            [clipping]
            max_open_high = 0.95
            "#,
        )
        .unwrap();
        assert_eq!(config.sampling.seed, Some(42));
        assert_eq!(config.sampling.samples_for_fit, 5000);
        assert_eq!(config.clipping.max_open_high, 0.95);
        assert_eq!(config.clipping.max_loc, 3.0);
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TomlConfig::from_toml_str("[sampling]\ncdf_length = 1").is_err());
        assert!(TomlConfig::from_toml_str("[api]\ntimeout_secs = 0").is_err());
        assert!(TomlConfig::from_toml_str("[clipping]\nmin_scale = -1.0").is_err());
        assert!(matches!(
            TomlConfig::from_toml_str("[sampling\nseed = 1"),
            Err(Error::Config(_))
        ));
    }
}
