use devbridge::cli::issue_certificate;

use session_core::certificate::SubjectPrincipal;

/// **VALUE**: Verifies the issue-cert path yields a PEM certificate.
///
/// **WHY THIS MATTERS**: Pairing requires exporting the certificate to the device.
///
/// **BUG THIS CATCHES**: Would catch the key being printed instead of the certificate.
#[tokio::test]
async fn given_subject_when_issuing_certificate_then_pem_certificate() {
    // GIVEN
    let subject = SubjectPrincipal::new("workstation").with_organization("Example");

    // WHEN
    let pem = issue_certificate(subject)
        .await
        .expect("Certificate should be issued");

    // THEN
    assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
    assert!(pem.trim_end().ends_with("-----END CERTIFICATE-----"));
    assert!(!pem.contains("PRIVATE KEY"));
}
