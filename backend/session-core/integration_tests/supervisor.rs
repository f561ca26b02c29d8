use crate::helpers::{
    FakeDriver, eventually, fast_restart_policy, next_transition, wait_for_state,
};

use session_core::error::supervisor::SupervisorError;
use session_core::output::OutputChannel;
use session_core::supervisor::ServerSupervisor;

use models::SessionState;

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

fn supervisor_with_fake(dir: &TempDir, max_restarts: u32) -> (ServerSupervisor, Arc<FakeDriver>, Arc<OutputChannel>) {
    let output = Arc::new(OutputChannel::new(dir.path().join("output.log")));
    let driver = Arc::new(FakeDriver::new(Arc::clone(&output)));
    let supervisor = ServerSupervisor::new(
        driver.clone(),
        Arc::clone(&output),
        fast_restart_policy(max_restarts),
    );
    (supervisor, driver, output)
}

// ============================================================================
// initialize()
// ============================================================================

/// **VALUE**: Verifies a failed start is reported once and never retried.
///
/// **WHY THIS MATTERS**: A missing or broken bridge binary is a user-visible problem. Retrying it
/// in a loop burns CPU and buries the one error message the user needs.
///
/// **BUG THIS CATCHES**: Would catch the death watch being started on a failed initialize, or
/// the state being left at `Starting`.
#[tokio::test]
async fn given_driver_that_fails_to_start_when_initialize_then_reports_failure_without_retry() {
    // GIVEN: A driver whose first start fails
    let dir = TempDir::new().unwrap();
    let (supervisor, driver, _output) = supervisor_with_fake(&dir, 3);
    driver.script_starts(&[false]);

    // WHEN: Initializing
    let result = supervisor.initialize().await;

    // THEN: Failure is reported and the session is back to Uninitialized
    assert!(
        matches!(result, Err(SupervisorError::ServerStartFailure { .. })),
        "Expected ServerStartFailure, got {result:?}"
    );
    assert_eq!(supervisor.state(), SessionState::Uninitialized);

    // AND: Nothing retries in the background
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(driver.starts(), 1, "A failed initialize must not retry");
}

#[tokio::test]
async fn given_ready_session_when_initialize_called_again_then_no_second_start() {
    // GIVEN: A ready session
    let dir = TempDir::new().unwrap();
    let (supervisor, driver, _output) = supervisor_with_fake(&dir, 3);
    supervisor.initialize().await.unwrap();

    // WHEN: Initializing again
    supervisor.initialize().await.unwrap();

    // THEN: The driver was started once
    assert_eq!(driver.starts(), 1);
    assert_eq!(supervisor.state(), SessionState::Ready);
}

// ============================================================================
// death watch
// ============================================================================

/// **VALUE**: Verifies the full death-and-restart cycle and its output markers.
///
/// **WHY THIS MATTERS**: The session must always be available. Presentation shows these
/// transitions, and the markers tell the user in the output why their session blinked.
///
/// **BUG THIS CATCHES**: Would catch a restart that skips `Starting`, a death that never
/// reaches `Dead`, or a death watch that polls instead of waking on termination.
#[tokio::test]
async fn given_ready_session_when_session_dies_then_transitions_dead_starting_ready() {
    // GIVEN: A subscriber watching from before initialize
    let dir = TempDir::new().unwrap();
    let (supervisor, driver, output) = supervisor_with_fake(&dir, 3);
    let mut transitions = supervisor.subscribe_transitions();

    supervisor.initialize().await.unwrap();
    assert_eq!(next_transition(&mut transitions).await, SessionState::Starting);
    assert_eq!(next_transition(&mut transitions).await, SessionState::Ready);

    // WHEN: The session dies
    driver.kill_session();

    // THEN: Ready -> Dead -> Starting -> Ready
    assert_eq!(next_transition(&mut transitions).await, SessionState::Dead);
    assert_eq!(next_transition(&mut transitions).await, SessionState::Starting);
    assert_eq!(next_transition(&mut transitions).await, SessionState::Ready);
    assert_eq!(driver.starts(), 2);

    // AND: Both markers were written to the output
    let text = output.tail_text(4096).await.unwrap();
    assert!(text.contains("* session started"), "Missing start marker in {text:?}");
    assert!(
        text.contains("* session died, restarting"),
        "Missing death marker in {text:?}"
    );
}

#[tokio::test]
async fn given_failing_restart_when_session_dies_then_retries_until_ready() {
    // GIVEN: A session whose first restart fails and second succeeds
    let dir = TempDir::new().unwrap();
    let (supervisor, driver, _output) = supervisor_with_fake(&dir, 3);
    driver.script_starts(&[true, false, true]);
    let mut transitions = supervisor.subscribe_transitions();
    supervisor.initialize().await.unwrap();
    next_transition(&mut transitions).await;
    next_transition(&mut transitions).await;

    // WHEN: The session dies
    driver.kill_session();

    // THEN: Dead, a failed attempt back to Dead, then a successful one
    let observed = [
        next_transition(&mut transitions).await,
        next_transition(&mut transitions).await,
        next_transition(&mut transitions).await,
        next_transition(&mut transitions).await,
        next_transition(&mut transitions).await,
    ];
    assert_eq!(
        observed,
        [
            SessionState::Dead,
            SessionState::Starting,
            SessionState::Dead,
            SessionState::Starting,
            SessionState::Ready,
        ]
    );
    assert_eq!(driver.starts(), 3);
}

/// **VALUE**: Verifies the restart budget stops a restart storm.
///
/// **WHY THIS MATTERS**: A driver that dies right after every start would otherwise be
/// restarted forever, spinning the CPU and flooding the output with markers.
///
/// **BUG THIS CATCHES**: Would catch the attempt counter being reset by every successful start
/// instead of only by a session that stayed up.
#[tokio::test]
async fn given_driver_that_dies_immediately_when_watched_then_gives_up_after_budget() {
    // GIVEN: A budget of 3 restarts and sessions that end at once
    let dir = TempDir::new().unwrap();
    let (supervisor, driver, output) = supervisor_with_fake(&dir, 3);
    driver.die_immediately();

    // WHEN: Initializing
    supervisor.initialize().await.unwrap();

    // THEN: One initial start plus three restarts, then nothing more
    let counted = Arc::clone(&driver);
    eventually(|| counted.starts() == 4, "four starts").await;
    let mut state = supervisor.watch_state();
    wait_for_state(&mut state, SessionState::Dead).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(driver.starts(), 4, "Supervisor must stop restarting after the budget");
    assert_eq!(supervisor.state(), SessionState::Dead);

    let text = output.tail_text(8192).await.unwrap();
    assert!(text.contains("giving up"), "Missing give-up marker in {text:?}");
}

/// **VALUE**: Verifies teardown stops the death watch and releases the session.
///
/// **WHY THIS MATTERS**: After shutdown the bridge connection is released on purpose. A death
/// watch still running would see that as a crash and start a new session.
///
/// **BUG THIS CATCHES**: Would catch `shutdown()` not cancelling the watch before stopping the
/// driver.
#[tokio::test]
async fn given_ready_session_when_shutdown_then_session_released_and_not_restarted() {
    // GIVEN: A ready session
    let dir = TempDir::new().unwrap();
    let (supervisor, driver, _output) = supervisor_with_fake(&dir, 3);
    supervisor.initialize().await.unwrap();

    // WHEN: Shutting down and then ending the session
    supervisor.shutdown().await;
    driver.kill_session();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // THEN: The driver was stopped once and never restarted
    assert_eq!(driver.stops(), 1);
    assert_eq!(driver.starts(), 1);
    assert_eq!(supervisor.state(), SessionState::Uninitialized);
}

// ============================================================================
// Server ownership
// ============================================================================

/// **VALUE**: Verifies a server already on the port is adopted and survives shutdown.
///
/// **WHY THIS MATTERS**: The user may have a bridge server running for other tools. Stopping it
/// when our session ends would break those tools.
///
/// **BUG THIS CATCHES**: Would catch a pre-existing server being recorded as ours, or shutdown
/// stopping a server it did not start.
///
/// **ENVIRONMENT-DEPENDENT**: Socket-to-PID mapping can be unavailable in restricted sandboxes.
/// Then nothing is recorded and the test only checks the listener is left alone.
#[tokio::test]
async fn given_server_already_listening_when_initialized_then_adopted_and_left_running() {
    // GIVEN: A listener on the bridge port before the first start
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let dir = TempDir::new().unwrap();
    let (supervisor, _driver, _output) = supervisor_with_fake(&dir, 3);
    let supervisor = supervisor.with_discovery(port);

    // WHEN: Initializing
    supervisor.initialize().await.unwrap();

    // THEN: If it was found, it is recorded as adopted
    if let Some(server) = supervisor.bridge_server().await {
        assert_eq!(server.pid, std::process::id());
        assert_eq!(server.port, port);
        assert!(!server.owned, "A server running before our start is not ours");
    }

    // AND: Shutdown forgets it and leaves it listening
    supervisor.shutdown().await;
    assert!(supervisor.bridge_server().await.is_none());
    assert!(
        TcpStream::connect(("127.0.0.1", port)).is_ok(),
        "Adopted server must still accept connections"
    );
}

/// **VALUE**: Verifies nothing is recorded or stopped when discovery is off.
///
/// **WHY THIS MATTERS**: Drivers without a local server port (like the fake one) must not make
/// the supervisor scan sockets or signal processes.
///
/// **BUG THIS CATCHES**: Would catch discovery running with no port configured.
#[tokio::test]
async fn given_discovery_disabled_when_initialized_then_no_server_recorded() {
    // GIVEN: A supervisor without discovery
    let dir = TempDir::new().unwrap();
    let (supervisor, _driver, _output) = supervisor_with_fake(&dir, 3);

    // WHEN: Initializing
    supervisor.initialize().await.unwrap();

    // THEN: No server is recorded
    assert!(supervisor.bridge_server().await.is_none());
    supervisor.shutdown().await;
}
