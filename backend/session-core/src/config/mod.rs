pub mod flags;

pub use flags::PairingFlags;

use crate::error::config::ConfigError;
use crate::{BRIDGE_BINARY, BRIDGE_SERVER_PORT};

use common::ErrorLocation;

use std::io::ErrorKind;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;
const APP_DIR_NAME: &str = "devbridge";
const OUTPUT_LOG_FILE_NAME: &str = "output.log";

// ============================================
// CONFIG STRUCTS
// ============================================

/// Bounded exponential backoff between automatic restarts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestartPolicy {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Consecutive failed restarts before the supervisor gives up.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_restarts: default_max_restarts(),
        }
    }
}

impl RestartPolicy {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_bridge_binary")]
    pub bridge_binary: String,

    #[serde(default = "default_server_port")]
    pub server_port: u16,

    #[serde(default = "default_output_log_path")]
    pub output_log_path: PathBuf,

    /// Bytes of output kept in the tail snapshot.
    #[serde(default = "default_tail_bytes")]
    pub tail_bytes: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub restart: RestartPolicy,

    /// Packages never shown in package or process listings.
    #[serde(default = "default_suppressed_packages")]
    pub suppressed_packages: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            bridge_binary: default_bridge_binary(),
            server_port: default_server_port(),
            output_log_path: default_output_log_path(),
            tail_bytes: default_tail_bytes(),
            poll_interval_ms: default_poll_interval_ms(),
            restart: RestartPolicy::default(),
            suppressed_packages: default_suppressed_packages(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_bridge_binary() -> String {
    BRIDGE_BINARY.to_string()
}
fn default_server_port() -> u16 {
    BRIDGE_SERVER_PORT
}
fn default_output_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join(OUTPUT_LOG_FILE_NAME)
}
fn default_tail_bytes() -> usize {
    16 * 1024
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_initial_interval_ms() -> u64 {
    200
}
fn default_max_interval_ms() -> u64 {
    10_000
}
fn default_max_restarts() -> u32 {
    10
}
fn default_suppressed_packages() -> Vec<String> {
    [
        "com.qti.phone",
        "com.vivo.biometrics",
        "vendor.qti.hardware.qseecom@1.0-service",
        "com.vivo.sps:rms",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ============================================
// IMPLEMENTATION
// ============================================

/// Default config directory: `{platform config dir}/devbridge`.
#[track_caller]
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| ConfigError::NoConfigDirectory {
            location: ErrorLocation::from(Location::caller()),
        })
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Load config from {config_dir}/config.json.
    ///
    /// Returns defaults if the file is missing; errors if it exists but is
    /// unreadable, corrupted, or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        let Some(config) = read_json_file::<SessionConfig>(&config_path)? else {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        };

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json using temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        write_json_atomic(config_dir, CONFIG_FILE_NAME, self)?;
        info!(
            "Config saved to {}",
            config_dir.join(CONFIG_FILE_NAME).display()
        );
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(invalid_setting(format!(
                "version {} is not supported (expected 1-{CONFIG_VERSION})",
                self.version
            )));
        }
        if self.bridge_binary.trim().is_empty() {
            return Err(invalid_setting("bridge_binary cannot be empty"));
        }
        if self.tail_bytes == 0 {
            return Err(invalid_setting("tail_bytes must be greater than zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid_setting("poll_interval_ms must be greater than zero"));
        }

        let restart = &self.restart;
        if restart.max_interval_ms < restart.initial_interval_ms {
            return Err(invalid_setting(format!(
                "restart.max_interval_ms ({}) is below restart.initial_interval_ms ({})",
                restart.max_interval_ms, restart.initial_interval_ms
            )));
        }

        Ok(())
    }
}

#[track_caller]
fn invalid_setting(reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidSetting {
        reason: reason.into(),
        location: ErrorLocation::from(Location::caller()),
    }
}

/// Parse `path` as JSON, or `None` if there is no such file.
pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            return Err(ConfigError::Unreadable {
                path: path.to_path_buf(),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            });
        }
    };

    serde_json::from_str(&contents).map(Some).map_err(|e| {
        warn!("{} is corrupted: {e}", path.display());
        ConfigError::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    })
}

/// Serialize `value` as pretty JSON into `{dir}/{file_name}` atomically.
pub(crate) fn write_json_atomic<T: Serialize>(
    dir: &Path,
    file_name: &str,
    value: &T,
) -> Result<(), ConfigError> {
    let unwritable = |path: &Path, source: std::io::Error| ConfigError::Unwritable {
        path: path.to_path_buf(),
        location: ErrorLocation::from(Location::caller()),
        source,
    };

    std::fs::create_dir_all(dir).map_err(|e| unwritable(dir, e))?;

    let json = serde_json::to_string_pretty(value).map_err(|e| ConfigError::Encoding {
        reason: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let path = dir.join(file_name);
    let staging = dir.join(format!("{file_name}.tmp"));
    std::fs::write(&staging, json).map_err(|e| unwritable(&staging, e))?;
    // rename(2) replaces the target atomically on POSIX
    std::fs::rename(&staging, &path).map_err(|e| unwritable(&path, e))?;

    Ok(())
}
