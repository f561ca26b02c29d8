use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum DiscoveryError {
    /// The socket table could not be read.
    #[error("Network Query Error: {message} {location}")]
    NetworkQuery {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The listener was found but its process record was unusable.
    #[error("Listener Record Error: {message} {location}")]
    ListenerRecord {
        message: String,
        location: ErrorLocation,
        #[source]
        source: models::ModelError,
    },
}

impl From<models::ModelError> for DiscoveryError {
    #[track_caller]
    fn from(err: models::ModelError) -> Self {
        DiscoveryError::ListenerRecord {
            message: String::from("Discovered listener did not form a valid server record"),
            location: ErrorLocation::from(std::panic::Location::caller()),
            source: err,
        }
    }
}
