//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! The client is configured once at construction with the GitHub App
//! identity it acts as. The resulting [`AppConfig`] is immutable.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values (`api_base`)
//! 2. Config file
//! 3. `HUBCOMMIT_*` environment variables
//!
//! # Config Locations
//!
//! Searched in order when no explicit path is given:
//! 1. `$HUBCOMMIT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/hubcommit/config.toml`
//! 3. `~/.hubcommit/config.toml`
//!
//! A missing file is not an error as long as the environment supplies every
//! required value.
//!
//! # Example
//!
//! ```no_run
//! use hubcommit::core::config::AppConfig;
//!
//! let config = AppConfig::load(None).unwrap();
//! println!("acting as app {} on {}", config.app_id, config.owner);
//! ```

pub mod schema;

pub use schema::ConfigFile;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default GitHub REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG: &str = "HUBCOMMIT_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("missing required config value '{0}'")]
    Missing(&'static str),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// A PEM-encoded private key.
///
/// Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }

    pub fn as_pem(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Client identification string, sent as the User-Agent.
    pub service_name: String,
    /// GitHub App id (JWT issuer).
    pub app_id: u64,
    /// Installation the access token is scoped to.
    pub installation_id: u64,
    /// Account that owns the repositories this client operates on.
    pub owner: String,
    /// App signing key.
    pub private_key: PrivateKey,
    /// REST API base URL.
    pub api_base: String,
}

impl AppConfig {
    /// Load configuration from `path` (or the default locations) and the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed,
    /// or if the merged result is incomplete or invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => Self::read_file(path)?,
            None => match Self::locate() {
                Some(found) => Self::read_file(&found)?,
                None => ConfigFile::default(),
            },
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge an environment lookup into `file` and validate the result.
    pub fn resolve<F>(mut file: ConfigFile, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some((name, value)) = file.apply_env(lookup).into_iter().next() {
            return Err(ConfigError::InvalidValue(format!(
                "{name}='{value}' is not a valid integer"
            )));
        }

        let private_key = match (file.private_key, file.private_key_path) {
            (Some(pem), _) => PrivateKey::new(pem),
            (None, Some(path)) => {
                let pem = fs::read_to_string(&path)
                    .map_err(|source| ConfigError::ReadError { path, source })?;
                PrivateKey::new(pem)
            }
            (None, None) => return Err(ConfigError::Missing("private_key")),
        };

        let config = Self {
            service_name: file.service_name.ok_or(ConfigError::Missing("service_name"))?,
            app_id: file.app_id.ok_or(ConfigError::Missing("app_id"))?,
            installation_id: file
                .installation_id
                .ok_or(ConfigError::Missing("installation_id"))?,
            owner: file.owner.ok_or(ConfigError::Missing("owner"))?,
            private_key,
            api_base: file
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "service_name cannot be empty".into(),
            ));
        }
        if self.owner.trim().is_empty() || self.owner.contains('/') {
            return Err(ConfigError::InvalidValue(format!(
                "invalid owner '{}'",
                self.owner
            )));
        }
        if self.app_id == 0 || self.installation_id == 0 {
            return Err(ConfigError::InvalidValue(
                "app_id and installation_id must be non-zero".into(),
            ));
        }
        if !self.private_key.as_pem().contains("PRIVATE KEY") {
            return Err(ConfigError::InvalidValue(
                "private_key is not a PEM private key".into(),
            ));
        }
        if !(self.api_base.starts_with("https://") || self.api_base.starts_with("http://")) {
            return Err(ConfigError::InvalidValue(format!(
                "api_base '{}' must be an http(s) URL",
                self.api_base
            )));
        }
        Ok(())
    }

    /// Find the config file in the default locations.
    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("hubcommit/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".hubcommit/config.toml");
        path.exists().then_some(path)
    }

    /// Read and parse a config file.
    pub fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        debug!(path = %path.display(), "loading config file");
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
