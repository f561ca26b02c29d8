use crate::helpers::{
    FakeDriver, WAIT_TIMEOUT, eventually, next_transition, test_config, wait_for_state,
};

use session_core::certificate::SubjectPrincipal;
use session_core::config::{PairingFlags, SessionConfig};
use session_core::correlator::{NameOnlyResolver, RequestHandle, RequestOutcome, commands};
use session_core::error::correlator::CorrelatorError;
use session_core::output::OutputChannel;
use session_core::session::SessionFacade;

use models::{AppDescriptor, CommandTag, ParsedResult, ProcessEntry, SessionState};

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::time::timeout;

const DEVICE_LISTING: &str = "List of devices attached\nABCD1234\tdevice\nEFGH5678\toffline\n";

struct Harness {
    dir: TempDir,
    facade: Arc<SessionFacade>,
    driver: Arc<FakeDriver>,
}

fn harness_with(configure: impl FnOnce(&mut SessionConfig)) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    configure(&mut config);

    let output = Arc::new(OutputChannel::new(config.output_log_path.clone()));
    let driver = Arc::new(FakeDriver::new(Arc::clone(&output)));
    let facade = SessionFacade::new(
        &config,
        output,
        driver.clone(),
        Arc::new(NameOnlyResolver),
        dir.path(),
    )
    .unwrap();

    Harness {
        dir,
        facade: Arc::new(facade),
        driver,
    }
}

fn harness() -> Harness {
    harness_with(|_| {})
}

async fn ready_harness() -> Harness {
    let h = harness();
    h.facade.initialize().await.unwrap();
    h
}

/// Long enough for several tail polls at the test interval.
const SETTLE: Duration = Duration::from_millis(150);

/// Assert `outcome` has not resolved after the tail had time to be re-parsed.
async fn assert_still_pending<F>(outcome: &mut std::pin::Pin<Box<F>>)
where
    F: Future<Output = Result<RequestOutcome, CorrelatorError>>,
{
    let early = timeout(SETTLE, outcome.as_mut()).await;
    assert!(early.is_err(), "Request resolved from foreign output: {early:?}");
}

async fn wait_for_output(facade: &Arc<SessionFacade>, needle: &str) {
    let facade = Arc::clone(facade);
    let needle = needle.to_string();
    eventually(
        move || facade.current_output().contains(&needle),
        "output to reach the tail",
    )
    .await;
}

async fn outcome_of(handle: RequestHandle) -> RequestOutcome {
    timeout(WAIT_TIMEOUT, handle.outcome())
        .await
        .expect("Timed out waiting for request outcome")
        .expect("Correlator stopped")
}

// ============================================================================
// Rejection while not Ready
// ============================================================================

/// **VALUE**: Verifies commands before initialize are rejected, not dropped.
///
/// **WHY THIS MATTERS**: A command accepted with no session behind it never produces output,
/// and the caller waits forever for a response that cannot come.
///
/// **BUG THIS CATCHES**: Would catch the session-state check being skipped on either the tagged
/// or the untagged path.
#[tokio::test]
async fn given_uninitialized_session_when_submitting_then_rejected_with_session_unavailable() {
    // GIVEN: A facade that was never initialized
    let h = harness();

    // WHEN: Submitting tagged and untagged commands
    let tagged = h.facade.refresh_devices().await;
    let untagged = h.facade.submit(vec![String::from("devices")], true).await;

    // THEN: Both are rejected and nothing reached the driver
    assert!(matches!(tagged, Err(CorrelatorError::SessionUnavailable { .. })));
    assert!(matches!(untagged, Err(CorrelatorError::SessionUnavailable { .. })));
    assert!(h.driver.executed().is_empty());
}

/// **VALUE**: Verifies a command submitted while the session is Dead is rejected deterministically.
///
/// **WHY THIS MATTERS**: Between a death and the next Ready the driver has no session. The
/// caller must learn that right away so it can retry once the session is back.
///
/// **BUG THIS CATCHES**: Would catch a submission during `Dead` being dispatched into the void
/// with a handle that never resolves.
#[tokio::test]
async fn given_dead_session_when_submitting_then_rejected_with_session_unavailable() {
    // GIVEN: A session with no restart budget that has died
    let h = harness_with(|config| config.restart.max_restarts = 0);
    h.facade.initialize().await.unwrap();
    let mut state = h.facade.subscribe_state();
    h.driver.kill_session();
    wait_for_state(&mut state, SessionState::Dead).await;

    // WHEN: Submitting a tagged command
    let result = h.facade.refresh_devices().await;

    // THEN: Rejected, not dispatched
    assert!(
        matches!(result, Err(CorrelatorError::SessionUnavailable { .. })),
        "Expected SessionUnavailable, got {result:?}"
    );
    assert!(h.driver.executed().is_empty());
}

// ============================================================================
// Correlation
// ============================================================================

/// **VALUE**: Documents last-writer-wins: back-to-back submissions leave only the second pending.
///
/// **WHY THIS MATTERS**: There is one pending slot. The first submitter must be told it lost the
/// slot, otherwise it waits forever for output that will be parsed under another tag.
///
/// **BUG THIS CATCHES**: Would catch two pending commands coexisting, or the first handle being
/// left unresolved.
#[tokio::test]
async fn given_two_back_to_back_submissions_when_neither_answered_then_only_second_is_pending() {
    // GIVEN: A ready session whose driver never answers
    let h = ready_harness().await;

    // WHEN: Submitting two commands without waiting
    let first = h.facade.refresh_devices().await.unwrap();
    let second = h.facade.refresh_devices().await.unwrap();
    let second_id = second.id;

    // THEN: Exactly the second is pending
    let pending = h.facade.snapshot().await.pending.expect("One command should be pending");
    assert_eq!(pending.id, second_id);
    assert_eq!(pending.tag, CommandTag::Devices);

    // AND: The first learns it was superseded by the second
    assert_eq!(
        outcome_of(first).await,
        RequestOutcome::Superseded { by: second_id }
    );
    assert_eq!(h.driver.executed().len(), 2);
}

/// **VALUE**: End-to-end device listing: dispatch, tail poll, parse, auto-select, clear.
///
/// **WHY THIS MATTERS**: Every device-scoped command needs a selected device. Auto-selecting
/// the first online device is what makes the tool usable with one phone plugged in.
///
/// **BUG THIS CATCHES**: Would catch offline devices being selected, the pending slot not being
/// cleared after completion, or the output not being cleared for the next command.
#[tokio::test]
async fn given_device_listing_when_refreshing_then_first_online_device_is_selected() {
    // GIVEN: A ready session answering the devices command
    let h = ready_harness().await;
    h.driver.respond_to("devices", DEVICE_LISTING);

    // WHEN: Refreshing devices and waiting for the result
    let handle = h.facade.refresh_devices().await.unwrap();
    let outcome = outcome_of(handle).await;

    // THEN: Only the online device is listed and it is selected
    assert_eq!(
        outcome,
        RequestOutcome::Completed(ParsedResult::DeviceList(vec![String::from("ABCD1234")]))
    );
    let snapshot = h.facade.snapshot().await;
    assert_eq!(snapshot.selected_device.as_deref(), Some("ABCD1234"));
    assert_eq!(snapshot.devices, vec!["ABCD1234"]);
    assert!(snapshot.pending.is_none(), "Completed command must leave the slot");

    // AND: The output was cleared after the pass
    let facade = Arc::clone(&h.facade);
    eventually(move || facade.current_output().is_empty(), "output cleared").await;
}

#[tokio::test]
async fn given_explicit_selection_when_devices_listed_then_selection_is_kept() {
    // GIVEN: A ready session with a device chosen by the user
    let h = ready_harness().await;
    h.driver.respond_to("devices", DEVICE_LISTING);
    h.facade
        .select_device(Some(String::from("R58M")))
        .await
        .unwrap();

    // WHEN: Refreshing devices
    let handle = h.facade.refresh_devices().await.unwrap();
    outcome_of(handle).await;

    // THEN: The user's choice is not replaced
    assert_eq!(
        h.facade.snapshot().await.selected_device.as_deref(),
        Some("R58M")
    );
}

#[tokio::test]
async fn given_no_selected_device_when_loading_processes_then_no_device_selected() {
    // GIVEN: A ready session with no device selected
    let h = ready_harness().await;

    // WHEN: Loading processes
    let result = h.facade.load_processes().await;

    // THEN: Rejected before dispatch
    assert!(matches!(result, Err(CorrelatorError::NoDeviceSelected { .. })));
    assert!(h.driver.executed().is_empty());
}

/// **VALUE**: Verifies a kill acknowledgement triggers a fresh process listing.
///
/// **WHY THIS MATTERS**: After a force-stop the process list on screen is stale. Users expect
/// the killed app to disappear without pressing refresh.
///
/// **BUG THIS CATCHES**: Would catch the follow-up being skipped, or issued before the kill's
/// pending slot is released (which would supersede the kill itself).
#[tokio::test]
async fn given_selected_device_when_kill_acknowledged_then_process_refresh_follows() {
    // GIVEN: A ready session with a selected device
    let h = ready_harness().await;
    h.driver.respond_to("force-stop", "");
    h.driver.respond_to("ps -A", "com.example.app 4242\ncom.android.chrome 1001\n");
    h.facade
        .select_device(Some(String::from("ABCD1234")))
        .await
        .unwrap();

    // WHEN: Killing an app
    let handle = h.facade.kill_app("com.example.app").await.unwrap();

    // THEN: The kill is acknowledged with the command echo
    match outcome_of(handle).await {
        RequestOutcome::Completed(ParsedResult::KillAck(ack)) => {
            assert!(ack.contains("force-stop com.example.app"), "Unexpected ack {ack:?}");
        }
        other => panic!("Expected a kill acknowledgement, got {other:?}"),
    }

    // AND: A process listing for the same device follows and is parsed
    let facade = Arc::clone(&h.facade);
    let expected = vec![
        ProcessEntry {
            name: String::from("com.example.app"),
            pid: Some(4242),
            row: String::from("com.example.app 4242"),
        },
        ProcessEntry {
            name: String::from("com.android.chrome"),
            pid: Some(1001),
            row: String::from("com.android.chrome 1001"),
        },
    ];
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while facade.snapshot().await.processes != expected {
        assert!(tokio::time::Instant::now() < deadline, "Process refresh never completed");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let executed = h.driver.executed();
    let (ps_argv, external) = executed.last().unwrap();
    assert_eq!(&ps_argv[..4], &["-s", "ABCD1234", "shell", "ps"]);
    assert!(*external, "Tagged commands go through the external client");
}

#[tokio::test]
async fn given_package_listing_when_loading_packages_then_suppressed_packages_dropped() {
    // GIVEN: A ready session whose device lists one normal and one suppressed package
    let h = ready_harness().await;
    h.driver.respond_to(
        "pm list packages",
        "package:com.example.app\npackage:com.qti.phone\n",
    );
    h.facade
        .select_device(Some(String::from("ABCD1234")))
        .await
        .unwrap();

    // WHEN: Loading packages
    let handle = h.facade.load_packages().await.unwrap();

    // THEN: Only the normal package is resolved
    assert_eq!(
        outcome_of(handle).await,
        RequestOutcome::Completed(ParsedResult::PackageList(vec![AppDescriptor {
            package: String::from("com.example.app"),
            display_name: String::from("com.example.app"),
            icon: None,
            system: false,
        }]))
    );

    // AND: The app view joins it with running processes
    h.driver.respond_to("ps -A", "com.example.app 4242\n");
    let handle = h.facade.load_processes().await.unwrap();
    outcome_of(handle).await;
    let rows = h.facade.app_processes("example", true).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].pid, Some(4242));
}

/// **VALUE**: Verifies a device chosen by the user is usable by the very next command.
///
/// **WHY THIS MATTERS**: The shell issues `select` and then `ps` back to back. If the selection
/// is still queued when `ps` looks for it, the command fails with no device selected.
///
/// **BUG THIS CATCHES**: Would catch `select_device` returning before the selection is applied.
#[tokio::test]
async fn given_device_selected_when_device_command_follows_immediately_then_selection_used() {
    for _ in 0..20 {
        // GIVEN: A ready session
        let h = ready_harness().await;

        // WHEN: Selecting a device and immediately loading processes and packages
        h.facade
            .select_device(Some(String::from("ABCD1234")))
            .await
            .unwrap();
        let processes = h.facade.load_processes().await;
        let packages = h.facade.load_packages().await;

        // THEN: Both were dispatched against the selected device
        assert!(processes.is_ok(), "load_processes failed: {processes:?}");
        assert!(packages.is_ok(), "load_packages failed: {packages:?}");
        let executed = h.driver.executed();
        assert_eq!(executed.len(), 2);
        assert!(executed.iter().all(|(argv, _)| argv[..2] == ["-s", "ABCD1234"]));
        h.facade.shutdown().await;
    }
}

/// **VALUE**: Verifies session markers written by a restart do not answer a pending listing.
///
/// **WHY THIS MATTERS**: The restart writes status lines into the same output. Parsing them as a
/// process listing hands the user a process named `*`.
///
/// **BUG THIS CATCHES**: Would catch any newline-terminated text completing a request.
#[tokio::test]
async fn given_pending_listing_when_session_restarts_then_markers_do_not_complete_it() {
    // GIVEN: A pending process listing whose output has not arrived
    let h = ready_harness().await;
    let mut transitions = h.facade.subscribe_transitions();
    h.facade
        .select_device(Some(String::from("ABCD1234")))
        .await
        .unwrap();
    let handle = h.facade.load_processes().await.unwrap();
    let mut outcome = Box::pin(handle.outcome());

    // WHEN: The session dies and comes back, writing its markers
    h.driver.kill_session();
    assert_eq!(next_transition(&mut transitions).await, SessionState::Dead);
    assert_eq!(next_transition(&mut transitions).await, SessionState::Starting);
    assert_eq!(next_transition(&mut transitions).await, SessionState::Ready);
    wait_for_output(&h.facade, "* session started").await;

    // THEN: The listing is still pending
    assert_still_pending(&mut outcome).await;
    assert!(h.facade.snapshot().await.pending.is_some());

    // AND: Its own output completes it
    let argv = commands::list_processes("ABCD1234").argv;
    h.driver.emit_frame(&argv, "com.example.app 4242\n").await;
    let outcome = timeout(WAIT_TIMEOUT, outcome)
        .await
        .expect("Timed out waiting for request outcome")
        .unwrap();
    assert_eq!(
        outcome,
        RequestOutcome::Completed(ParsedResult::ProcessList(vec![ProcessEntry {
            name: String::from("com.example.app"),
            pid: Some(4242),
            row: String::from("com.example.app 4242"),
        }]))
    );
}

/// **VALUE**: Verifies echoed input does not answer a pending listing.
///
/// **WHY THIS MATTERS**: The shell echoes every typed line into the output. A device refresh in
/// flight while the user types would complete with an empty device list.
///
/// **BUG THIS CATCHES**: Would catch echo lines being parsed as the pending command's output.
#[tokio::test]
async fn given_pending_device_listing_when_text_echoed_then_request_stays_pending() {
    // GIVEN: A pending device refresh with no output yet
    let h = ready_harness().await;
    let handle = h.facade.refresh_devices().await.unwrap();
    let mut outcome = Box::pin(handle.outcome());

    // WHEN: Unrelated text is echoed
    h.facade.echo("hello world").await.unwrap();
    wait_for_output(&h.facade, "hello world").await;

    // THEN: Still pending, selection untouched
    assert_still_pending(&mut outcome).await;
    let snapshot = h.facade.snapshot().await;
    assert!(snapshot.pending.is_some());
    assert!(snapshot.selected_device.is_none());
}

/// **VALUE**: Verifies late output of a superseded command is not taken as the new response.
///
/// **WHY THIS MATTERS**: The superseded client process still finishes and writes its output.
/// Parsing a process listing as a device list would select a process name as a device.
///
/// **BUG THIS CATCHES**: Would catch responses being matched by position instead of by argv.
#[tokio::test]
async fn given_superseded_command_when_its_output_arrives_late_then_new_request_ignores_it() {
    // GIVEN: A process listing superseded by a device refresh
    let h = ready_harness().await;
    h.facade
        .select_device(Some(String::from("ABCD1234")))
        .await
        .unwrap();
    let stale = h.facade.load_processes().await.unwrap();
    let handle = h.facade.refresh_devices().await.unwrap();
    let mut outcome = Box::pin(handle.outcome());
    assert!(matches!(outcome_of(stale).await, RequestOutcome::Superseded { .. }));

    // WHEN: The process listing's output shows up
    let ps_argv = commands::list_processes("ABCD1234").argv;
    h.driver.emit_frame(&ps_argv, "com.example.app 4242\n").await;
    wait_for_output(&h.facade, "com.example.app 4242").await;

    // THEN: The device refresh is still waiting for its own output
    assert_still_pending(&mut outcome).await;

    // AND: Its own output completes it
    h.driver.emit_frame(&commands::list_devices().argv, DEVICE_LISTING).await;
    let outcome = timeout(WAIT_TIMEOUT, outcome)
        .await
        .expect("Timed out waiting for request outcome")
        .unwrap();
    assert_eq!(
        outcome,
        RequestOutcome::Completed(ParsedResult::DeviceList(vec![String::from("ABCD1234")]))
    );
}

// ============================================================================
// Untagged commands and output
// ============================================================================

#[tokio::test]
async fn given_ready_session_when_submitting_untagged_and_raw_input_then_forwarded_to_driver() {
    // GIVEN: A ready session
    let h = ready_harness().await;

    // WHEN: Submitting a shell command and a raw line
    h.facade
        .submit(vec![String::from("getprop"), String::from("ro.product.model")], false)
        .await
        .unwrap();
    h.facade.send_raw_input("logcat -c").await.unwrap();

    // THEN: The driver saw both, and nothing became pending
    assert_eq!(
        h.driver.executed(),
        vec![(vec![String::from("getprop"), String::from("ro.product.model")], false)]
    );
    assert_eq!(h.driver.raw_inputs(), vec!["logcat -c"]);
    assert!(h.facade.snapshot().await.pending.is_none());
}

/// **VALUE**: Verifies the observed output view follows appends and clears.
///
/// **WHY THIS MATTERS**: This receiver is the live console in the presentation layer. If it
/// misses a clear, the user keeps seeing output they just dismissed.
///
/// **BUG THIS CATCHES**: Would catch the poller not running or not publishing after a clear.
#[tokio::test]
async fn given_echoed_text_when_observing_output_then_view_updates_and_clears() {
    // GIVEN: A facade and an output observer
    let h = harness();
    let mut observed = h.facade.observe_output();

    // WHEN: Echoing a line
    h.facade.echo("$ devices").await.unwrap();

    // THEN: The observer sees it
    timeout(WAIT_TIMEOUT, observed.wait_for(|s| s.text.contains("$ devices")))
        .await
        .expect("Echo never reached the observer")
        .unwrap();

    // WHEN: Clearing
    h.facade.clear_output().await.unwrap();

    // THEN: The view empties
    timeout(WAIT_TIMEOUT, observed.wait_for(|s| s.text.is_empty()))
        .await
        .expect("Clear never reached the observer")
        .unwrap();
    assert!(h.facade.current_output().is_empty());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn given_background_initialize_when_done_then_callback_reports_result() {
    // GIVEN: One facade that starts and one whose driver fails
    let ok = harness();
    let failing = harness();
    failing.driver.script_starts(&[false]);

    // WHEN: Initializing both in the background
    let (ok_tx, ok_rx) = oneshot::channel();
    let (fail_tx, fail_rx) = oneshot::channel();
    ok.facade.initialize_in_background(move |started| {
        let _ = ok_tx.send(started);
    });
    failing.facade.initialize_in_background(move |started| {
        let _ = fail_tx.send(started);
    });

    // THEN: Each callback gets its own result
    assert!(timeout(WAIT_TIMEOUT, ok_rx).await.unwrap().unwrap());
    assert!(!timeout(WAIT_TIMEOUT, fail_rx).await.unwrap().unwrap());
    assert_eq!(ok.facade.state(), SessionState::Ready);
    assert_eq!(failing.facade.state(), SessionState::Uninitialized);
}

/// **VALUE**: Verifies teardown stops everything and rejects later commands.
///
/// **BUG THIS CATCHES**: Would catch the driver not being released, or the correlator still
/// accepting submissions after shutdown.
#[tokio::test]
async fn given_ready_session_when_shutdown_then_driver_released_and_commands_rejected() {
    // GIVEN: A ready session
    let h = ready_harness().await;

    // WHEN: Shutting down
    h.facade.shutdown().await;

    // THEN: The driver was stopped and no command goes through
    assert_eq!(h.driver.stops(), 1);
    assert_eq!(h.facade.state(), SessionState::Uninitialized);
    assert!(h.facade.refresh_devices().await.is_err());
}

// ============================================================================
// Pairing
// ============================================================================

#[tokio::test]
async fn given_fresh_install_when_marking_paired_then_flag_persists() {
    // GIVEN: A facade over an empty flags directory
    let h = harness();
    assert!(h.facade.needs_to_pair());

    // WHEN: Pairing succeeds
    h.facade.mark_paired(true).unwrap();

    // THEN: The facade and a fresh load both see it
    assert!(h.facade.is_paired());
    assert!(PairingFlags::load(h.dir.path()).unwrap().is_paired());
}

/// **VALUE**: Verifies the pairing identity is created once and reused.
///
/// **WHY THIS MATTERS**: The peer pins the certificate it saw first. A new identity per attempt
/// would break every pairing after the first in the same run.
///
/// **BUG THIS CATCHES**: Would catch the identity being regenerated on each call.
#[tokio::test]
async fn given_pairing_identity_requested_twice_then_same_identity_returned() {
    // GIVEN: A facade
    let h = harness();
    let subject = SubjectPrincipal::new("devbridge pairing");

    // WHEN: Requesting the identity twice
    let first = h.facade.pairing_identity(&subject).await.unwrap();
    let second = h.facade.pairing_identity(&subject).await.unwrap();

    // THEN: Both are the same identity
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.certificate.subject.common_name, "devbridge pairing");
}
