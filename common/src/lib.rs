//! Shared building blocks for the devbridge workspace.
//!
//! Holds the pieces every other crate leans on: source-location tracking for
//! errors and a redacting wrapper for private key material.
//!
//! ## Architecture
//!
//! - **common** (this crate): error location, redaction
//! - **models**: pure data passed between layers
//! - **session-core**: the session engine operating on models
//! - **devbridge**: binary wiring everything together

pub mod error;
pub mod redacted_key;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_key::RedactedPrivateKey;

#[cfg(test)]
mod tests;
