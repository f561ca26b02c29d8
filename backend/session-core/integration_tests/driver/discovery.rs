use session_core::driver::discovery::{TERM_GRACE, discover, stop_pid};

use std::net::TcpListener;
#[cfg(unix)]
use std::process::Command;
#[cfg(unix)]
use std::time::Instant;

// ============================================================================
// Public API tests for bridge server discovery
// ============================================================================

/// **VALUE**: Verifies that `stop_pid()` returns false for a PID that does not exist.
///
/// **WHY THIS MATTERS**: The discovered server can exit before we try to stop it.
///
/// **BUG THIS CATCHES**: Would catch a panic or a `true` for a process that was never there.
#[test]
fn given_nonexistent_pid_when_stop_pid_called_then_returns_false() {
    // GIVEN: A PID that doesn't exist
    let fake_pid = u32::MAX;

    // WHEN: Attempting to stop it
    let result = stop_pid(fake_pid);

    // THEN: false
    assert!(!result, "Should return false for non-existent process");
}

/// **VALUE**: Refuses to signal PID 1 under any circumstances.
///
/// **WHY THIS MATTERS**: Tests and containers often run as root, where signalling PID 1 takes
/// down the whole container.
///
/// **BUG THIS CATCHES**: Would catch removal of the PID guard.
#[test]
fn given_pid_1_when_stop_pid_called_then_refuses_and_returns_false() {
    // GIVEN/WHEN: Stopping PID 1 and PID 0
    // THEN: Both are refused
    assert!(!stop_pid(1), "Should never stop PID 1");
    assert!(!stop_pid(0), "Should never stop PID 0");
}

/// **VALUE**: Refuses to stop the calling process.
///
/// **WHY THIS MATTERS**: A listener in our own process can be found on the bridge port. Stopping
/// it would end the session host instead of a bridge server.
///
/// **BUG THIS CATCHES**: Would catch removal of the own-PID guard.
#[test]
fn given_own_pid_when_stop_pid_called_then_refuses_and_returns_false() {
    // GIVEN: This process
    let our_pid = std::process::id();

    // WHEN: Stopping it
    let result = stop_pid(our_pid);

    // THEN: Refused
    assert!(!result, "Should never stop the calling process");
}

/// **VALUE**: Verifies a server that honours SIGTERM is stopped within the grace period.
///
/// **WHY THIS MATTERS**: A bridge server we started must not outlive the session. A stopped
/// process that lingers as a zombie until reaped must count as gone.
///
/// **BUG THIS CATCHES**: Would catch an exit check that treats zombies as running and escalates
/// to SIGKILL, or a missing wait that reports `true` before the process exits.
#[cfg(unix)]
#[test]
fn given_running_child_when_stop_pid_called_then_stopped_within_grace() {
    // GIVEN: A long-running child process
    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    let started = Instant::now();

    // WHEN: Stopping it
    let stopped = stop_pid(child.id());

    // THEN: Gone after SIGTERM, well before the grace period runs out
    assert!(stopped, "Child should have been stopped");
    assert!(started.elapsed() < TERM_GRACE, "SIGTERM should have been enough");
    let status = child.wait().unwrap();
    assert!(!status.success(), "Child should have died from a signal");
}

/// **VALUE**: Verifies discovery on an unused port does not error.
///
/// **WHY THIS MATTERS**: No running server is the normal first-launch case.
///
/// **BUG THIS CATCHES**: Would catch an empty socket match being turned into an error.
#[test]
fn given_port_with_no_listener_when_discover_called_then_returns_ok() {
    // GIVEN: A port we bound and released, so almost certainly free
    let port = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|addr| addr.port())
        .unwrap();

    // WHEN: Discovering on it
    let result = discover(port);

    // THEN: Ok (None, unless another process grabbed the port in between)
    assert!(result.is_ok(), "Should not error when no server found");
}

/// **VALUE**: Verifies discovery identifies the process behind a listening socket.
///
/// **WHY THIS MATTERS**: This is how an already-running bridge server is recognized instead of
/// being fought over with a second one.
///
/// **BUG THIS CATCHES**: Would catch matching on the remote port, or reporting a found server
/// as owned.
///
/// **ENVIRONMENT-DEPENDENT**: Socket-to-PID mapping can be unavailable in restricted sandboxes.
/// In that case discovery returns `Ok(None)` or an error, and the test only checks it did not
/// misattribute the socket.
#[test]
fn given_our_own_listener_when_discover_called_then_reports_this_process() {
    // GIVEN: A socket listening in this process
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    // WHEN: Discovering on its port
    let result = discover(port);

    // THEN: If found, it is us and not owned
    if let Ok(Some(info)) = result {
        assert_eq!(info.pid, std::process::id());
        assert_eq!(info.port, port);
        assert_eq!(info.socket, format!("tcp:{port}"));
        assert!(!info.owned, "A discovered server is never owned");
    }
}
