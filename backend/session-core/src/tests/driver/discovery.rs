// Unit tests for discovery module private helpers
// Integration tests for the public API are in integration_tests/driver/discovery.rs

use crate::driver::discovery::{format_command, with_process};

/// **VALUE**: Tests that `format_command()` produces a usable command line for a live process.
///
/// **WHY THIS MATTERS**: The command line is what identifies a discovered bridge server in logs
/// and in `BridgeServerInfo`. An empty string would fail builder validation and abort discovery.
///
/// **BUG THIS CATCHES**: Would catch a fallback that returns an empty string when the process
/// has arguments but no resolvable executable name.
#[test]
fn given_valid_process_when_format_command_called_then_returns_command_string() {
    // GIVEN: A valid process (our own PID)
    let our_pid = std::process::id();

    // WHEN: Formatting its command line
    let result = with_process(our_pid, |p| format_command(p));

    // THEN: Should return a non-empty command string
    let cmd = result.expect("Should find our own process");
    assert!(!cmd.is_empty(), "Command string should not be empty");
}

/// **VALUE**: Tests that `with_process()` returns None for PIDs that do not exist.
///
/// **WHY THIS MATTERS**: The listening process can exit between the socket scan and the process
/// lookup. Discovery must treat that as "nothing found".
///
/// **BUG THIS CATCHES**: Would catch a panic or a stale cached entry for a vanished PID.
#[test]
fn given_nonexistent_pid_when_with_process_called_then_returns_none() {
    // GIVEN: A PID that doesn't exist
    let fake_pid = u32::MAX;

    // WHEN: Looking it up
    let result = with_process(fake_pid, |_| true);

    // THEN: Should return None
    assert!(result.is_none(), "Should return None for non-existent process");
}

/// **VALUE**: Tests that `with_process()` hands the matching process to the closure.
///
/// **WHY THIS MATTERS**: Discovery reads name and command through this closure. Running it on
/// the wrong process would attribute the bridge port to an unrelated program.
///
/// **BUG THIS CATCHES**: Would catch a refresh of the wrong PID set or a skipped closure.
#[test]
fn given_valid_pid_when_with_process_called_then_executes_closure() {
    // GIVEN: Our own PID
    let our_pid = std::process::id();

    // WHEN: Reading the PID back through the closure
    let result = with_process(our_pid, |p| p.pid().as_u32());

    // THEN: Should be the same PID
    assert_eq!(result, Some(our_pid), "Closure should see the requested process");
}
