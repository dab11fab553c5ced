//! Configuration management for the rscug server.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use rscug_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("rscug.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use rscug_domain::{CheckCacheConfig, CugConfig, ResolverConfig};
use rscug_storage::path;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Closed user group settings
    #[serde(default)]
    pub cug: CugSettings,

    /// Read decision cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Access control settings
    #[serde(default)]
    pub acl: AclSettings,

    /// Principal directory settings
    #[serde(default)]
    pub directory: DirectorySettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Closed user group settings.
///
/// Scalar values can be overridden via environment variables with the
/// `RSCUG_` prefix and `__` as the nested key separator:
///
/// - `RSCUG_CUG__ENABLED=false` - Disable CUG evaluation
///
/// # Example YAML Configuration
///
/// ```yaml
/// cug:
///   enabled: true
///   supported_paths: ["/content"]
///   excluded_principals: ["administrators"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CugSettings {
    /// Evaluate CUG policies on reads.
    ///
    /// The nested index is maintained either way.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Subtrees in which policies may be created and are evaluated.
    #[serde(default = "default_supported_paths")]
    pub supported_paths: Vec<String>,

    /// Principals that bypass CUG evaluation.
    #[serde(default)]
    pub excluded_principals: Vec<String>,
}

impl Default for CugSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            supported_paths: default_supported_paths(),
            excluded_principals: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_supported_paths() -> Vec<String> {
    vec!["/content".to_string()]
}

/// Read decision cache settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    /// Enable the decision cache
    #[serde(default)]
    pub enabled: bool,

    /// Maximum number of cached decisions
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,

    /// Time to live of a cached decision in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_capacity: default_max_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_max_capacity() -> u64 {
    100_000
}

fn default_ttl_secs() -> u64 {
    10
}

/// Access control settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AclSettings {
    /// Principals allowed to read everything regardless of ACLs
    #[serde(default)]
    pub admin_principals: Vec<String>,
}

/// Principal directory settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DirectorySettings {
    /// Maximum group nesting depth expanded during principal resolution
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> u32 {
    25
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `RSCUG_` and use `__` as separator.
    /// For example:
    /// - `RSCUG_CACHE__ENABLED=true` overrides `cache.enabled`
    /// - `RSCUG_LOGGING__LEVEL=debug` overrides `logging.level`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            // RSCUG_CACHE__TTL_SECS -> cache.ttl_secs
            .add_source(
                Environment::with_prefix("RSCUG")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    ///
    /// Uses default values and allows overrides via RSCUG_ prefixed env vars.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(
                Environment::with_prefix("RSCUG")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        for supported in &self.cug.supported_paths {
            if path::validate_path(supported).is_err() {
                return Err(ConfigLoadError::Invalid {
                    message: format!(
                        "cug.supported_paths must contain absolute paths, got: {supported}"
                    ),
                });
            }
        }

        if self
            .cug
            .excluded_principals
            .iter()
            .chain(&self.acl.admin_principals)
            .any(|p| p.trim().is_empty())
        {
            return Err(ConfigLoadError::Invalid {
                message: "principal names in cug.excluded_principals and acl.admin_principals cannot be empty".to_string(),
            });
        }

        if self.cache.enabled && (self.cache.max_capacity == 0 || self.cache.ttl_secs == 0) {
            return Err(ConfigLoadError::Invalid {
                message: "cache.max_capacity and cache.ttl_secs must be greater than 0 when the cache is enabled".to_string(),
            });
        }

        if self.directory.max_depth == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "directory.max_depth must be greater than 0".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }

    /// CUG configuration for the domain layer.
    pub fn cug_config(&self) -> CugConfig {
        self.cug
            .excluded_principals
            .iter()
            .fold(
                CugConfig::default()
                    .with_enabled(self.cug.enabled)
                    .with_supported_paths(self.cug.supported_paths.iter().cloned()),
                |config, principal| config.with_excluded_principal(principal.clone()),
            )
    }

    pub fn cache_config(&self) -> CheckCacheConfig {
        CheckCacheConfig::default()
            .with_enabled(self.cache.enabled)
            .with_max_capacity(self.cache.max_capacity)
            .with_ttl(Duration::from_secs(self.cache.ttl_secs))
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default().with_max_depth(self.directory.max_depth)
    }
}
