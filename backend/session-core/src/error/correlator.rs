use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CorrelatorError {
    /// The session is not `Ready`; the command was not dispatched.
    #[error("Session Unavailable Error: {message} {location}")]
    SessionUnavailable {
        message: String,
        location: ErrorLocation,
    },

    /// A device-scoped command was requested before any device was selected.
    #[error("No Device Selected Error: {message} {location}")]
    NoDeviceSelected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Actor Stopped Error: {message} {location}")]
    ActorStopped {
        message: String,
        location: ErrorLocation,
    },

    #[error("Dispatch Error: {message} {location}")]
    Dispatch {
        message: String,
        location: ErrorLocation,
        #[source]
        source: crate::error::driver::DriverError,
    },
}
