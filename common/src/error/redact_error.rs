use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Refusals raised by redacting wrappers.
#[derive(Debug, ThisError)]
pub enum RedactError {
    /// Key material was handed to a serializer.
    #[error("Serialization Refused: {message} {location}")]
    SerializationRefused {
        message: String,
        location: ErrorLocation,
    },
}
