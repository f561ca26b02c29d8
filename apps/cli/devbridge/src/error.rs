use common::ErrorLocation;

use session_core::error::CoreError;

use std::panic::Location;

use thiserror::Error;

/// Errors surfaced by the devbridge binary.
#[derive(Debug, Error)]
pub enum DevbridgeError {
    /// Error from this binary (paths, logger, stdin)
    #[error("Devbridge Error: {message} {location}")]
    Devbridge {
        message: String,
        location: ErrorLocation,
    },

    /// Error from the session engine
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
        #[source]
        source: CoreError,
    },
}

impl DevbridgeError {
    #[track_caller]
    pub fn devbridge(message: impl Into<String>) -> Self {
        Self::Devbridge {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Wrap a session-engine error with what we were doing when it happened.
    #[track_caller]
    pub fn core(context: &str, source: impl Into<CoreError>) -> Self {
        let source = source.into();
        Self::Core {
            message: format!("{context}: {source}"),
            location: ErrorLocation::from(Location::caller()),
            source,
        }
    }
}
