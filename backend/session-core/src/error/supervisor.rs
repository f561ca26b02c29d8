use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SupervisorError {
    /// The bridge driver could not be started. Reported once, not retried.
    #[error("Server Start Failure: {message} {location}")]
    ServerStartFailure {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Option<crate::error::driver::DriverError>,
    },
}
