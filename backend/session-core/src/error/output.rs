use common::ErrorLocation;

use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum OutputError {
    /// The log resource could not be opened or read. Callers treat this as "no output yet".
    #[error("Output Read Failure: {path}: {source} {location}")]
    OutputReadFailure {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error("Output Write Failure: {path}: {source} {location}")]
    OutputWriteFailure {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },
}
