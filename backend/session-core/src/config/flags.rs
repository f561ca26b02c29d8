//! Small boolean flag store recording pairing and verification status.

use crate::config::{read_json_file, write_json_atomic};
use crate::error::config::ConfigError;

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

const FLAGS_FILE_NAME: &str = "flags.json";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
struct FlagValues {
    #[serde(default)]
    paired: bool,
    #[serde(default)]
    verified: bool,
}

/// Flags persisted as `{dir}/flags.json`. Every setter writes through.
#[derive(Debug, Clone)]
pub struct PairingFlags {
    dir: PathBuf,
    values: FlagValues,
}

impl PairingFlags {
    /// Load flags, starting from all-false when the file does not exist.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(FLAGS_FILE_NAME);

        let values = read_json_file::<FlagValues>(&path)?.unwrap_or_else(|| {
            debug!("No flags file at {}, starting unpaired", path.display());
            FlagValues::default()
        });

        Ok(Self {
            dir: dir.to_path_buf(),
            values,
        })
    }

    pub fn is_paired(&self) -> bool {
        self.values.paired
    }

    /// Whether the user should be walked through pairing.
    pub fn needs_to_pair(&self) -> bool {
        !self.values.paired
    }

    pub fn mark_paired(&mut self, paired: bool) -> Result<(), ConfigError> {
        self.values.paired = paired;
        self.persist()
    }

    pub fn is_verified(&self) -> bool {
        self.values.verified
    }

    pub fn mark_verified(&mut self, verified: bool) -> Result<(), ConfigError> {
        self.values.verified = verified;
        self.persist()
    }

    fn persist(&self) -> Result<(), ConfigError> {
        write_json_atomic(&self.dir, FLAGS_FILE_NAME, &self.values)
    }
}
