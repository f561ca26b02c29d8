use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PackageError {
    /// One package line could not be resolved. The line is dropped, the parse continues.
    #[error("Package Resolution Failure: {package}: {message} {location}")]
    PackageResolutionFailure {
        package: String,
        message: String,
        location: ErrorLocation,
    },
}
