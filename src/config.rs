use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// =============================================================================
// Network-related constants
// =============================================================================

/// Timeout for a single HTTP request in milliseconds (30 seconds)
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Total attempts for a request that fails with a retryable error
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubled for each further retry (500ms)
pub const RETRY_BASE_DELAY_MS: u64 = 500;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Updater configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdaterConfig {
    /// URL of the published version descriptor
    pub online_version_url: String,
    /// File holding the installed version record
    pub current_version_path: PathBuf,
    /// Directory with one subdirectory per installed library
    pub destination_path: PathBuf,
    /// Key used to pick the artifact from per-platform download references
    pub platform: String,
    /// Proxy URL for all HTTP(S) requests
    pub proxy: Option<String>,
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Request timeout in milliseconds
    pub fetch_timeout_ms: u64,
    /// Total attempts per request
    pub retry_attempts: u32,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            online_version_url: String::new(),
            current_version_path: data_dir.join("currentVersion.version"),
            destination_path: data_dir.join("libraries"),
            platform: std::env::consts::OS.to_string(),
            proxy: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

impl UpdaterConfig {
    /// Load configuration from a JSON file, falling back to defaults if the file
    /// does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set one value by its configuration key
    ///
    /// Keys are the camelCase names used in the configuration file. Unknown keys
    /// are rejected rather than ignored.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "onlineVersionUrl" => self.online_version_url = value.to_string(),
            "currentVersionPath" => self.current_version_path = PathBuf::from(value),
            "destinationPath" => self.destination_path = PathBuf::from(value),
            "platform" => self.platform = value.to_string(),
            "proxy" => self.proxy = (!value.is_empty()).then(|| value.to_string()),
            "logLevel" => {
                value
                    .parse::<tracing::Level>()
                    .map_err(|e| invalid_value(key, e))?;
                self.log_level = value.to_ascii_lowercase();
            }
            "fetchTimeoutMs" => {
                self.fetch_timeout_ms = value.parse().map_err(|e| invalid_value(key, e))?;
            }
            "retryAttempts" => {
                let attempts: u32 = value.parse().map_err(|e| invalid_value(key, e))?;
                if attempts == 0 {
                    return Err(invalid_value(key, "must be at least 1"));
                }
                self.retry_attempts = attempts;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Apply several values at once; nothing is changed if any of them is rejected
    pub fn apply<'a, I>(&mut self, values: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut updated = self.clone();
        for (key, value) in values {
            updated.set_value(key, value)?;
        }
        *self = updated;
        Ok(())
    }
}

fn invalid_value(key: &str, message: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

const APP_DIR: &str = "lib-updater";

/// Root for everything lib-updater keeps by default: configuration, version
/// record, libraries and log
///
/// An empty `XDG_DATA_HOME` counts as unset.
pub fn data_dir() -> PathBuf {
    resolve_data_dir(std::env::var_os("XDG_DATA_HOME"), dirs::home_dir())
}

pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

pub fn log_path() -> PathBuf {
    data_dir().join("lib-updater.log")
}

fn resolve_data_dir(xdg_data_home: Option<OsString>, home: Option<PathBuf>) -> PathBuf {
    let base = match (xdg_data_home, home) {
        (Some(xdg), _) if !xdg.is_empty() => PathBuf::from(xdg),
        (_, Some(home)) => home.join(".local").join("share"),
        _ => PathBuf::from("."),
    };
    base.join(APP_DIR)
}
