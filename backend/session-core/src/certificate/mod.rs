//! Self-signed identity for the pairing channel.
//!
//! [`CertificateIssuer::issue`] is a pure transformation: subject + key pair in,
//! signed v3 certificate out. Serial number and signature bytes are the only
//! fields that differ between two issuances for the same input.

use crate::error::certificate::CertificateError;

use common::{ErrorLocation, RedactedPrivateKey};

use std::panic::Location;
use std::time::SystemTime;

use log::{debug, info};
use rand::RngCore;
use rand::rngs::OsRng;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PKCS_RSA_SHA256, SerialNumber};
use time::{Duration as TimeDuration, OffsetDateTime};

/// Days between `valid_from` and `valid_to`.
pub const VALIDITY_DAYS: i64 = 365;

/// 1 prefix byte (6 random bits) + 8 fully random bytes.
const SERIAL_NUMBER_BYTES: usize = 9;

/// Distinguished name used as both subject and issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPrincipal {
    pub common_name: String,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
}

impl SubjectPrincipal {
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            organization: None,
            organizational_unit: None,
        }
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_organizational_unit(mut self, unit: impl Into<String>) -> Self {
        self.organizational_unit = Some(unit.into());
        self
    }

    fn to_distinguished_name(&self) -> DistinguishedName {
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, self.common_name.as_str());
        if let Some(org) = &self.organization {
            name.push(DnType::OrganizationName, org.as_str());
        }
        if let Some(unit) = &self.organizational_unit {
            name.push(DnType::OrganizationalUnitName, unit.as_str());
        }
        name
    }
}

/// A signed certificate plus the fields it was built from.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub pem: String,
    pub der: Vec<u8>,
    pub subject: SubjectPrincipal,
    pub valid_from: SystemTime,
    pub valid_to: SystemTime,
    pub serial_number: Vec<u8>,
}

/// Certificate and matching private key, kept in memory only.
#[derive(Debug, Clone)]
pub struct Identity {
    pub certificate: IssuedCertificate,
    pub private_key: RedactedPrivateKey,
}

impl Identity {
    /// Generate a fresh RSA key pair and self-sign a certificate for `subject`.
    pub fn generate(subject: &SubjectPrincipal) -> Result<Self, CertificateError> {
        let key_pair = generate_key_pair()?;
        let certificate = CertificateIssuer::new().issue(subject, &key_pair)?;

        Ok(Self {
            certificate,
            private_key: RedactedPrivateKey::new(key_pair.serialize_pem()),
        })
    }
}

/// Generate an RSA-2048 key pair suitable for [`CertificateIssuer::issue`].
#[track_caller]
pub fn generate_key_pair() -> Result<KeyPair, CertificateError> {
    KeyPair::generate_for(&PKCS_RSA_SHA256).map_err(|e| CertificateError::CryptoFailure {
        message: format!("RSA key generation unavailable: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Some(Box::new(e)),
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CertificateIssuer;

impl CertificateIssuer {
    pub fn new() -> Self {
        Self
    }

    /// Self-sign a v3 certificate for `subject` with `key_pair`.
    ///
    /// Validity is `[now, now + 365 days]`; subject and issuer are identical;
    /// the signature is SHA-256 with RSA.
    ///
    /// # Errors
    ///
    /// [`CertificateError::CryptoFailure`] if `key_pair` is not an RSA/SHA-256
    /// key, the random source fails, or signing fails.
    #[track_caller]
    pub fn issue(
        &self,
        subject: &SubjectPrincipal,
        key_pair: &KeyPair,
    ) -> Result<IssuedCertificate, CertificateError> {
        if key_pair.algorithm() != &PKCS_RSA_SHA256 {
            return Err(CertificateError::CryptoFailure {
                message: format!(
                    "Key pair algorithm {:?} cannot sign SHA256withRSA",
                    key_pair.algorithm()
                ),
                location: ErrorLocation::from(Location::caller()),
                source: None,
            });
        }

        let serial_number = random_serial_number()?;
        let valid_from = OffsetDateTime::now_utc();
        let valid_to = valid_from + TimeDuration::days(VALIDITY_DAYS);

        let mut params = CertificateParams::default();
        params.distinguished_name = subject.to_distinguished_name();
        params.serial_number = Some(SerialNumber::from(serial_number.clone()));
        params.not_before = valid_from;
        params.not_after = valid_to;

        let certificate =
            params
                .self_signed(key_pair)
                .map_err(|e| CertificateError::CryptoFailure {
                    message: format!("Failed to sign certificate: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                    source: Some(Box::new(e)),
                })?;

        debug!(
            "Issued certificate for CN={} valid until {valid_to}",
            subject.common_name
        );
        info!("Self-signed identity issued for {}", subject.common_name);

        Ok(IssuedCertificate {
            pem: certificate.pem(),
            der: certificate.der().to_vec(),
            subject: subject.clone(),
            valid_from: valid_from.into(),
            valid_to: valid_to.into(),
            serial_number,
        })
    }
}

/// Positive, non-zero-leading serial with at least 64 random bits.
#[track_caller]
pub(crate) fn random_serial_number() -> Result<Vec<u8>, CertificateError> {
    let mut bytes = vec![0u8; SERIAL_NUMBER_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CertificateError::CryptoFailure {
            message: format!("Secure random source unavailable: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Some(Box::new(e)),
        })?;

    bytes[0] = (bytes[0] & 0x7f) | 0x01;
    Ok(bytes)
}
