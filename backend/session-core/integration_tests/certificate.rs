use session_core::certificate::{
    CertificateIssuer, Identity, SubjectPrincipal, generate_key_pair,
};
use session_core::error::certificate::CertificateError;

use std::time::{SystemTime, UNIX_EPOCH};

use rcgen::{KeyPair, PKCS_ECDSA_P256_SHA256};
use x509_parser::prelude::{X509Certificate, X509Version, parse_x509_certificate};

const SHA256_WITH_RSA_OID: &str = "1.2.840.113549.1.1.11";
const SECONDS_PER_YEAR_OF_VALIDITY: i64 = 365 * 24 * 60 * 60;

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before 1970")
        .as_secs() as i64
}

fn common_name<'a>(cert: &'a X509Certificate<'_>) -> Option<&'a str> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
}

/// **VALUE**: Validates every deterministic field of an issued certificate.
///
/// **WHY THIS MATTERS**: The pairing peer checks version, validity, self-signature, and the
/// signature algorithm before trusting the channel. Any one of them off and pairing fails with
/// no hint why.
///
/// **BUG THIS CATCHES**: Would catch a v1 certificate, an issuer that differs from the subject,
/// a validity window other than 365 days, or signing with a non-RSA algorithm.
#[test]
fn given_rsa_key_pair_when_issuing_then_certificate_is_self_signed_v3_for_365_days() {
    // GIVEN: A subject and a fresh RSA key pair
    let subject = SubjectPrincipal::new("devbridge pairing").with_organization("devbridge");
    let key_pair = generate_key_pair().expect("RSA key generation should be available");
    let before_issue = unix_now();

    // WHEN: Issuing a certificate
    let issued = CertificateIssuer::new()
        .issue(&subject, &key_pair)
        .expect("Issuing with an RSA key should succeed");
    let after_issue = unix_now();

    // THEN: The DER parses as a v3 certificate
    let (_, cert) = parse_x509_certificate(&issued.der).expect("Issued DER should parse");
    assert_eq!(cert.version(), X509Version::V3);

    // AND: Subject and issuer are the same principal
    assert_eq!(cert.subject().as_raw(), cert.issuer().as_raw());
    assert_eq!(common_name(&cert), Some("devbridge pairing"));

    // AND: The validity window is [now, now + 365 days]
    let not_before = cert.validity().not_before.timestamp();
    let not_after = cert.validity().not_after.timestamp();
    assert!(not_before <= after_issue, "notBefore must not be in the future");
    assert!(not_before >= before_issue - 1, "notBefore must be the issue time");
    assert!(unix_now() <= not_after);
    assert!(
        (not_after - not_before - SECONDS_PER_YEAR_OF_VALIDITY).abs() <= 1,
        "Validity must be 365 days, got {} seconds",
        not_after - not_before
    );

    // AND: Signed with SHA-256 with RSA
    assert_eq!(
        cert.signature_algorithm.algorithm.to_id_string(),
        SHA256_WITH_RSA_OID
    );

    // AND: The serial in the certificate is the one reported back
    assert_eq!(cert.raw_serial(), issued.serial_number.as_slice());
    assert!(issued.pem.starts_with("-----BEGIN CERTIFICATE-----"));
}

/// **VALUE**: Verifies a key pair unfit for SHA-256 with RSA fails with `CryptoFailure`.
///
/// **WHY THIS MATTERS**: Pairing requires an RSA identity. Quietly signing with another
/// algorithm produces a certificate the peer rejects much later and far from the cause.
///
/// **BUG THIS CATCHES**: Would catch the algorithm check being dropped, letting rcgen sign with
/// whatever the key supports.
#[test]
fn given_ecdsa_key_pair_when_issuing_then_fails_with_crypto_failure() {
    // GIVEN: An ECDSA key pair
    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
    let subject = SubjectPrincipal::new("devbridge pairing");

    // WHEN: Issuing with it
    let result = CertificateIssuer::new().issue(&subject, &key_pair);

    // THEN: CryptoFailure, no certificate
    assert!(
        matches!(result, Err(CertificateError::CryptoFailure { .. })),
        "Expected CryptoFailure, got {:?}",
        result.map(|c| c.pem)
    );
}

#[test]
fn given_two_issues_when_comparing_serials_then_they_differ() {
    // GIVEN: One key pair used twice
    let key_pair = generate_key_pair().unwrap();
    let subject = SubjectPrincipal::new("devbridge pairing");
    let issuer = CertificateIssuer::new();

    // WHEN: Issuing two certificates
    let first = issuer.issue(&subject, &key_pair).unwrap();
    let second = issuer.issue(&subject, &key_pair).unwrap();

    // THEN: Structure matches but serials are random
    assert_eq!(first.subject, second.subject);
    assert_ne!(first.serial_number, second.serial_number);
}

/// **VALUE**: Verifies the generated identity keeps its private key out of logs.
///
/// **BUG THIS CATCHES**: Would catch a derived `Debug` on the key wrapper printing the PEM.
#[test]
fn given_generated_identity_when_debug_printed_then_private_key_is_redacted() {
    // GIVEN: A generated identity
    let identity = Identity::generate(&SubjectPrincipal::new("devbridge pairing")).unwrap();

    // WHEN: Formatting it for a log line
    let printed = format!("{identity:?}");

    // THEN: The key material is present but not printed
    assert!(identity.private_key.expose_pem().contains("PRIVATE KEY"));
    assert!(!printed.contains("PRIVATE KEY"), "Private key leaked: {printed}");
}
