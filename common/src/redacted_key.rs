//! Private key material that never shows up in logs or debug output.

use crate::{ErrorLocation, RedactError};

use std::fmt;
use std::panic::Location;

use serde::ser::Error;
use zeroize::Zeroize;

/// PEM-encoded private key, zeroed on drop.
#[derive(Clone)]
pub struct RedactedPrivateKey {
    pem: String,
}

impl RedactedPrivateKey {
    pub fn new(pem: String) -> Self {
        Self { pem }
    }

    /// The PEM text.
    ///
    /// # Security Note
    /// Only call this when the key is about to be written to a trusted sink
    /// (a TLS config, a key file with restricted permissions).
    #[inline]
    pub fn expose_pem(&self) -> &str {
        &self.pem
    }

    /// PEM length in bytes (safe to log).
    #[inline]
    pub fn len(&self) -> usize {
        self.pem.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pem.is_empty()
    }
}

impl fmt::Debug for RedactedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedPrivateKey([REDACTED])")
    }
}

impl fmt::Display for RedactedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED PRIVATE KEY]")
    }
}

impl Drop for RedactedPrivateKey {
    fn drop(&mut self) {
        self.pem.zeroize();
    }
}

impl serde::Serialize for RedactedPrivateKey {
    #[track_caller]
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::SerializationRefused {
            message: String::from(
                "private key material is never serialized; write expose_pem() to a trusted sink instead",
            ),
            location: ErrorLocation::from(Location::caller()),
        }))
    }
}
