//! Test helpers for session-core integration tests.
//!
//! - `FakeDriver`: scripted [`BridgeDriver`] that writes canned responses into
//!   the output channel as transcript frames, like the process driver
//! - Fast restart policy and config for tests
//! - Timed waits on state and transition channels

use session_core::config::{RestartPolicy, SessionConfig};
use session_core::driver::BridgeDriver;
use session_core::driver::transcript::frame;
use session_core::error::driver::DriverError;
use session_core::output::OutputChannel;

use models::SessionState;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast, watch};
use tokio::time::timeout;

/// Upper bound for any single wait in these tests.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct FakeDriver {
    output: Arc<OutputChannel>,
    start_script: Mutex<VecDeque<bool>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    death: Notify,
    die_immediately: AtomicBool,
    executed: Mutex<Vec<(Vec<String>, bool)>>,
    raw_inputs: Mutex<Vec<String>>,
    responses: Mutex<Vec<(String, String)>>,
}

impl FakeDriver {
    pub fn new(output: Arc<OutputChannel>) -> Self {
        Self {
            output,
            start_script: Mutex::new(VecDeque::new()),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            death: Notify::new(),
            die_immediately: AtomicBool::new(false),
            executed: Mutex::new(Vec::new()),
            raw_inputs: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        }
    }

    /// Results of the next `start_server` calls, in order. Unscripted starts succeed.
    pub fn script_starts(&self, results: &[bool]) {
        self.start_script.lock().unwrap().extend(results.iter().copied());
    }

    /// Every session ends as soon as it is waited on.
    pub fn die_immediately(&self) {
        self.die_immediately.store(true, Ordering::SeqCst);
    }

    /// End the current session.
    pub fn kill_session(&self) {
        self.death.notify_one();
    }

    /// When an executed command line contains `needle`, append `response`
    /// framed the way the process driver frames client output.
    pub fn respond_to(&self, needle: &str, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .push((needle.to_string(), response.to_string()));
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<(Vec<String>, bool)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn raw_inputs(&self) -> Vec<String> {
        self.raw_inputs.lock().unwrap().clone()
    }

    /// Append a frame for `argv` as if a client invocation finished just now.
    pub async fn emit_frame(&self, argv: &[String], body: &str) {
        let framed = frame(&format!("adb {}", argv.join(" ")), body.as_bytes(), Some(0));
        self.output
            .append(&framed)
            .await
            .expect("Fake driver failed to append output");
    }
}

#[async_trait]
impl BridgeDriver for FakeDriver {
    async fn start_server(&self) -> Result<bool, DriverError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(self.start_script.lock().unwrap().pop_front().unwrap_or(true))
    }

    async fn wait_for_termination(&self) {
        if self.die_immediately.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
            return;
        }
        self.death.notified().await;
    }

    async fn execute(&self, argv: &[String], use_external_client: bool) -> Result<(), DriverError> {
        self.executed
            .lock()
            .unwrap()
            .push((argv.to_vec(), use_external_client));

        let command_line = argv.join(" ");
        let response = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| command_line.contains(needle.as_str()))
            .map(|(_, response)| response.clone());

        if let Some(response) = response {
            let framed = frame(&format!("adb {command_line}"), response.as_bytes(), Some(0));
            self.output
                .append(&framed)
                .await
                .expect("Fake driver failed to append output");
        }

        Ok(())
    }

    async fn send_raw_input(&self, text: &str) -> Result<(), DriverError> {
        self.raw_inputs.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn stop(&self) -> Result<(), DriverError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Restart policy with millisecond backoff so restart tests finish quickly.
pub fn fast_restart_policy(max_restarts: u32) -> RestartPolicy {
    RestartPolicy {
        initial_interval_ms: 1,
        max_interval_ms: 1_000,
        max_restarts,
    }
}

/// Config writing output under `dir`, polling every 10 ms.
pub fn test_config(dir: &Path) -> SessionConfig {
    SessionConfig {
        output_log_path: dir.join("output.log"),
        poll_interval_ms: 10,
        restart: fast_restart_policy(3),
        ..SessionConfig::default()
    }
}

pub async fn next_transition(rx: &mut broadcast::Receiver<SessionState>) -> SessionState {
    timeout(WAIT_TIMEOUT, rx.recv())
        .await
        .expect("Timed out waiting for a state transition")
        .expect("Transition channel closed")
}

pub async fn wait_for_state(rx: &mut watch::Receiver<SessionState>, want: SessionState) {
    timeout(WAIT_TIMEOUT, rx.wait_for(|state| *state == want))
        .await
        .expect("Timed out waiting for session state")
        .expect("State channel closed");
}

/// Poll `condition` every 10 ms until it holds or the wait times out.
pub async fn eventually<F>(mut condition: F, what: &str)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "Timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
