use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CertificateError {
    /// The signing primitive is unavailable or the key pair does not fit the algorithm.
    #[error("Crypto Failure: {message} {location}")]
    CryptoFailure {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}
