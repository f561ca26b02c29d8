use crate::cli::{Cli, Command};

use std::path::PathBuf;

use clap::Parser;

/// **VALUE**: Verifies the shell subcommand with global options.
///
/// **WHY THIS MATTERS**: Config and log locations must be overridable for sandboxed runs.
///
/// **BUG THIS CATCHES**: Would catch options not being marked global.
#[test]
fn given_shell_args_when_parsed_then_options_populated() {
    // GIVEN/WHEN: Options after the subcommand
    let cli = Cli::try_parse_from([
        "devbridge",
        "shell",
        "--config-dir",
        "/tmp/cfg",
        "--log-dir",
        "/tmp/logs",
        "-v",
    ])
    .expect("Arguments should parse");

    // THEN
    assert_eq!(cli.command, Command::Shell);
    assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/cfg")));
    assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/logs")));
    assert!(cli.verbose);
}

/// **VALUE**: Verifies issue-cert requires a subject.
///
/// **WHY THIS MATTERS**: A certificate without a common name is useless for pairing.
///
/// **BUG THIS CATCHES**: Would catch the subject becoming optional.
#[test]
fn given_issue_cert_when_parsed_then_subject_required() {
    // GIVEN/WHEN: No subject
    let missing = Cli::try_parse_from(["devbridge", "issue-cert"]);

    // THEN: Rejected
    assert!(missing.is_err());

    // AND: With subject and organization it parses
    let cli = Cli::try_parse_from([
        "devbridge",
        "issue-cert",
        "--subject",
        "workstation",
        "--organization",
        "Example",
    ])
    .expect("Arguments should parse");
    assert_eq!(
        cli.command,
        Command::IssueCert {
            subject: String::from("workstation"),
            organization: Some(String::from("Example")),
        }
    );
    assert!(!cli.verbose);
    assert_eq!(cli.config_dir, None);
}
