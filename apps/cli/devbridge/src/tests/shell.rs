use crate::shell::{ShellInput, unseen_suffix};

use session_core::output::TailSnapshot;

fn snapshot(epoch: u64, text: &str) -> TailSnapshot {
    TailSnapshot {
        epoch,
        text: text.to_string(),
    }
}

/// **VALUE**: Verifies each shell keyword routes to its facade operation.
///
/// **WHY THIS MATTERS**: Tagged commands are the only ones whose output gets parsed. A keyword
/// that falls through to raw input silently loses its structured result.
///
/// **BUG THIS CATCHES**: Would catch a keyword typo or reordered match arms.
#[test]
fn given_keywords_when_parsed_then_route_to_tagged_operations() {
    // GIVEN/WHEN/THEN: Each keyword maps to its variant
    assert_eq!(ShellInput::parse_line("devices"), ShellInput::Devices);
    assert_eq!(ShellInput::parse_line("  ps  "), ShellInput::Processes);
    assert_eq!(ShellInput::parse_line("pm"), ShellInput::Packages);
    assert_eq!(ShellInput::parse_line("server"), ShellInput::Server);
    assert_eq!(
        ShellInput::parse_line("kill com.example.app"),
        ShellInput::Kill(String::from("com.example.app"))
    );
    assert_eq!(ShellInput::parse_line("clear"), ShellInput::Clear);
    assert_eq!(ShellInput::parse_line("exit"), ShellInput::Exit);
    assert_eq!(ShellInput::parse_line("quit"), ShellInput::Exit);
    assert_eq!(ShellInput::parse_line("   "), ShellInput::Empty);
}

/// **VALUE**: Verifies `adb` lines go to the external client without the leading word.
///
/// **WHY THIS MATTERS**: The driver prepends the client binary itself. Passing `adb` through
/// would run `adb adb ...`.
///
/// **BUG THIS CATCHES**: Would catch forgetting to strip the prefix.
#[test]
fn given_adb_line_when_parsed_then_external_argv_without_prefix() {
    // GIVEN: An external client line
    let line = "adb -s emulator-5554 shell getprop";

    // WHEN: Parsing it
    let input = ShellInput::parse_line(line);

    // THEN: argv starts after the binary name
    assert_eq!(
        input,
        ShellInput::External(vec![
            String::from("-s"),
            String::from("emulator-5554"),
            String::from("shell"),
            String::from("getprop"),
        ])
    );

    // AND: A bare `adb` is a usage error, not an empty command
    assert!(matches!(ShellInput::parse_line("adb"), ShellInput::Usage(_)));
}

/// **VALUE**: Verifies malformed keyword lines produce usage hints instead of raw input.
///
/// **WHY THIS MATTERS**: `kill` with no package would otherwise be typed into the device shell.
///
/// **BUG THIS CATCHES**: Would catch arity checks being dropped.
#[test]
fn given_keyword_with_wrong_arity_when_parsed_then_usage() {
    // GIVEN/WHEN/THEN
    assert!(matches!(ShellInput::parse_line("kill"), ShellInput::Usage(_)));
    assert!(matches!(ShellInput::parse_line("kill a b"), ShellInput::Usage(_)));
    assert!(matches!(ShellInput::parse_line("select a b"), ShellInput::Usage(_)));
    assert_eq!(ShellInput::parse_line("select"), ShellInput::Select(None));
    assert_eq!(
        ShellInput::parse_line("select emulator-5554"),
        ShellInput::Select(Some(String::from("emulator-5554")))
    );
}

/// **VALUE**: Verifies `apps` collects its filter and the `--all` switch.
///
/// **WHY THIS MATTERS**: System apps are hidden unless asked for.
///
/// **BUG THIS CATCHES**: Would catch `--all` leaking into the name filter.
#[test]
fn given_apps_line_when_parsed_then_filter_and_system_switch() {
    // GIVEN/WHEN/THEN: Default hides system apps
    assert_eq!(
        ShellInput::parse_line("apps"),
        ShellInput::Apps {
            filter: String::new(),
            hide_system: true
        }
    );

    // AND: --all is removed from the filter
    assert_eq!(
        ShellInput::parse_line("apps --all maps"),
        ShellInput::Apps {
            filter: String::from("maps"),
            hide_system: false
        }
    );
}

/// **VALUE**: Verifies anything unrecognised goes to the interactive shell untouched.
///
/// **WHY THIS MATTERS**: The shell is a passthrough for arbitrary device commands.
///
/// **BUG THIS CATCHES**: Would catch keywords matched by prefix (`psx` as `ps`).
#[test]
fn given_unknown_line_when_parsed_then_raw_trimmed_text() {
    // GIVEN/WHEN/THEN
    assert_eq!(
        ShellInput::parse_line("  ls -la /sdcard "),
        ShellInput::Raw(String::from("ls -la /sdcard"))
    );
    assert_eq!(
        ShellInput::parse_line("psx"),
        ShellInput::Raw(String::from("psx"))
    );
    assert_eq!(
        ShellInput::parse_line("ps -A"),
        ShellInput::Raw(String::from("ps -A"))
    );
}

/// **VALUE**: Verifies only the unseen part of a growing tail is printed.
///
/// **WHY THIS MATTERS**: The tail is republished whole on every change. Printing it whole would
/// repeat everything on each poll.
///
/// **BUG THIS CATCHES**: Would catch printing duplicates, or losing text after a clear.
#[test]
fn given_tail_snapshots_when_diffed_then_only_new_text() {
    // GIVEN: A tail that grew within one epoch
    let before = snapshot(0, "line one\n");
    let after = snapshot(0, "line one\nline two\n");

    // WHEN/THEN: Only the appended line is new
    assert_eq!(unseen_suffix(&before, &after), "line two\n");

    // AND: After a clear the whole text is new even if it happens to share a prefix
    let cleared = snapshot(1, "line one\nagain\n");
    assert_eq!(unseen_suffix(&after, &cleared), "line one\nagain\n");

    // AND: A tail window that slid past the previous text is printed whole
    let slid = snapshot(0, "two\nthree\n");
    assert_eq!(unseen_suffix(&after, &slid), "two\nthree\n");
}
