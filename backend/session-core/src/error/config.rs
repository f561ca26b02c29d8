use std::path::PathBuf;

use common::ErrorLocation;
use thiserror::Error;

/// Failures loading or persisting `config.json` and `flags.json`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config File Unreadable: {path}: {source} {location}")]
    Unreadable {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not valid JSON for its schema.
    #[error("Config File Corrupted: {path}: {reason} {location}")]
    Corrupted {
        path: PathBuf,
        reason: String,
        location: ErrorLocation,
    },

    #[error("Config File Unwritable: {path}: {source} {location}")]
    Unwritable {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error("No Platform Config Directory: {location}")]
    NoConfigDirectory { location: ErrorLocation },

    #[error("Config Encoding Error: {reason} {location}")]
    Encoding {
        reason: String,
        location: ErrorLocation,
    },

    /// A field holds a value the session cannot run with.
    #[error("Invalid Setting: {reason} {location}")]
    InvalidSetting {
        reason: String,
        location: ErrorLocation,
    },
}
