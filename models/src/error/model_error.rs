use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Rejections raised while assembling model values.
#[derive(Debug, ThisError)]
pub enum ModelError {
    /// A discovered server record is incomplete or self-contradictory.
    #[error("Invalid Server Info: {message} {location}")]
    InvalidServerInfo {
        message: String,
        location: ErrorLocation,
    },
}
