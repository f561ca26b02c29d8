//! Lifecycle of the single bridge session.
//!
//! # State machine
//!
//! ```text
//! Uninitialized --initialize ok--> Ready --session ends--> Dead --restart--> Starting --> Ready
//! ```
//!
//! `initialize()` reports a failed start to its caller and never retries.
//! Once a session has been Ready, a death-watch task suspends on
//! [`BridgeDriver::wait_for_termination`] and restarts the session when it
//! ends. Restarts back off exponentially, and the supervisor gives up (stays
//! `Dead`) after `max_restarts` consecutive short-lived or failed attempts.
//!
//! # Server ownership
//!
//! With discovery enabled, a server already listening on the port before the
//! first start is adopted and left running at shutdown. A server that only
//! appears after our start is ours, and shutdown stops it.

use crate::config::RestartPolicy;
use crate::driver::{BridgeDriver, discovery};
use crate::error::supervisor::SupervisorError;
use crate::output::OutputChannel;

use common::ErrorLocation;
use models::{BridgeServerInfo, SessionState};

use std::panic::Location;
use std::sync::Arc;
use std::time::Instant;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TRANSITION_CAPACITY: usize = 64;
const SESSION_STARTED_MARKER: &str = "* session started";
const SESSION_DIED_MARKER: &str = "* session died, restarting";
const SESSION_ABANDONED_MARKER: &str = "* session died, giving up after repeated failures";

/// Publishes the current state and every transition.
#[derive(Clone)]
struct StatePublisher {
    current: watch::Sender<SessionState>,
    transitions: broadcast::Sender<SessionState>,
}

impl StatePublisher {
    fn new() -> Self {
        let (current, _) = watch::channel(SessionState::Uninitialized);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            current,
            transitions,
        }
    }

    fn set(&self, state: SessionState) {
        let previous = self.current.send_replace(state);
        if previous != state {
            debug!("Session state {previous} -> {state}");
            // No subscribers is fine.
            let _ = self.transitions.send(state);
        }
    }

    fn get(&self) -> SessionState {
        *self.current.borrow()
    }
}

struct DeathWatch {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct ServerSupervisor {
    driver: Arc<dyn BridgeDriver>,
    output: Arc<OutputChannel>,
    policy: RestartPolicy,
    discovery_port: Option<u16>,
    state: StatePublisher,
    init_lock: Mutex<()>,
    death_watch: Mutex<Option<DeathWatch>>,
    server: RwLock<Option<BridgeServerInfo>>,
}

impl ServerSupervisor {
    pub fn new(
        driver: Arc<dyn BridgeDriver>,
        output: Arc<OutputChannel>,
        policy: RestartPolicy,
    ) -> Self {
        Self {
            driver,
            output,
            policy,
            discovery_port: None,
            state: StatePublisher::new(),
            init_lock: Mutex::new(()),
            death_watch: Mutex::new(None),
            server: RwLock::new(None),
        }
    }

    /// Look for an already-running bridge server on `port` before starting.
    pub fn with_discovery(mut self, port: u16) -> Self {
        self.discovery_port = Some(port);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Receiver that always holds the latest state.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.current.subscribe()
    }

    /// Every transition, in order, from the moment of subscription.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<SessionState> {
        self.state.transitions.subscribe()
    }

    /// Server listening on the bridge port since the last initialize, if
    /// discovery is enabled and found one. `owned` tells whether we started it.
    pub async fn bridge_server(&self) -> Option<BridgeServerInfo> {
        self.server.read().await.clone()
    }

    /// Start the session and its death watch.
    ///
    /// Calling this while a session is already Ready is a no-op.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::ServerStartFailure`] if the driver could not start the
    /// server. The state returns to `Uninitialized` and nothing is retried.
    pub async fn initialize(&self) -> Result<(), SupervisorError> {
        let _init = self.init_lock.lock().await;

        if self.state.get() == SessionState::Ready {
            debug!("Session already ready, skipping initialize");
            return Ok(());
        }

        let adopted = self.discover_server().await;
        if let Some(server) = &adopted {
            info!(
                "Adopting running bridge server: {} (PID {}, {})",
                server.name, server.pid, server.socket
            );
        }

        info!("Starting bridge session");
        self.state.set(SessionState::Starting);

        let failure = match self.driver.start_server().await {
            Ok(true) => None,
            Ok(false) => Some(SupervisorError::ServerStartFailure {
                message: String::from("Bridge driver reported that the server did not start"),
                location: ErrorLocation::from(Location::caller()),
                source: None,
            }),
            Err(e) => Some(SupervisorError::ServerStartFailure {
                message: format!("Bridge driver failed to start: {e}"),
                location: ErrorLocation::from(Location::caller()),
                source: Some(e),
            }),
        };

        if let Some(err) = failure {
            error!("{err}");
            self.state.set(SessionState::Uninitialized);
            return Err(err);
        }

        let server = match adopted {
            Some(server) => Some(server),
            None => self.discover_server().await.map(|server| {
                info!("Started bridge server: PID {}", server.pid);
                BridgeServerInfo {
                    owned: true,
                    ..server
                }
            }),
        };
        *self.server.write().await = server;

        self.state.set(SessionState::Ready);
        append_marker(&self.output, SESSION_STARTED_MARKER).await;
        info!("Bridge session ready");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(death_watch_loop(
            Arc::clone(&self.driver),
            Arc::clone(&self.output),
            self.policy.clone(),
            self.state.clone(),
            cancel.clone(),
        ));

        if let Some(previous) = self.death_watch.lock().await.replace(DeathWatch { cancel, task }) {
            warn!("Replacing a stale death watch");
            previous.cancel.cancel();
        }

        Ok(())
    }

    /// Stop the death watch and release the bridge session.
    pub async fn shutdown(&self) {
        let _init = self.init_lock.lock().await;

        if let Some(watch) = self.death_watch.lock().await.take() {
            watch.cancel.cancel();
            if let Err(e) = watch.task.await {
                warn!("Death watch ended abnormally: {e}");
            }
        }

        if let Err(e) = self.driver.stop().await {
            warn!("Failed to stop bridge driver: {e}");
        }

        let server = self.server.write().await.take();
        if let Some(server) = server {
            if server.owned {
                self.stop_owned_server(server).await;
            } else {
                debug!("Leaving adopted bridge server {} running", server.pid);
            }
        }

        self.state.set(SessionState::Uninitialized);
        info!("Bridge session shut down");
    }

    async fn discover_server(&self) -> Option<BridgeServerInfo> {
        let port = self.discovery_port?;

        match tokio::task::spawn_blocking(move || discovery::discover(port)).await {
            Ok(Ok(found)) => {
                if found.is_none() {
                    debug!("No bridge server running on port {port}");
                }
                found
            }
            Ok(Err(e)) => {
                warn!("Bridge server discovery failed: {e}");
                None
            }
            Err(e) => {
                warn!("Bridge server discovery task failed: {e}");
                None
            }
        }
    }

    /// Stop `server` if it still holds the bridge port. A different PID on the
    /// port means ours already exited and the PID may have been reused.
    async fn stop_owned_server(&self, server: BridgeServerInfo) {
        match self.discover_server().await {
            Some(current) if current.pid == server.pid => {
                info!("Stopping bridge server we started (PID {})", server.pid);
                let pid = server.pid;
                match tokio::task::spawn_blocking(move || discovery::stop_pid(pid)).await {
                    Ok(true) => info!("Bridge server {pid} stopped"),
                    Ok(false) => warn!("Bridge server {pid} could not be stopped"),
                    Err(e) => warn!("Stopping bridge server {pid} failed: {e}"),
                }
            }
            Some(current) => debug!(
                "Port now held by PID {} instead of {}, not stopping it",
                current.pid, server.pid
            ),
            None => debug!("Bridge server {} already exited", server.pid),
        }
    }
}

async fn append_marker(output: &OutputChannel, marker: &str) {
    if let Err(e) = output.append_line(marker).await {
        warn!("Failed to write session marker: {e}");
    }
}

fn restart_backoff(policy: &RestartPolicy) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: policy.initial_interval(),
        current_interval: policy.initial_interval(),
        max_interval: policy.max_interval(),
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Wait for each session to end and bring up the next one.
async fn death_watch_loop(
    driver: Arc<dyn BridgeDriver>,
    output: Arc<OutputChannel>,
    policy: RestartPolicy,
    state: StatePublisher,
    cancel: CancellationToken,
) {
    let mut backoff = restart_backoff(&policy);
    let mut attempts: u32 = 0;

    loop {
        let ready_since = Instant::now();

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = driver.wait_for_termination() => {}
        }

        if cancel.is_cancelled() {
            return;
        }

        warn!("Bridge session died after {:?}", ready_since.elapsed());
        state.set(SessionState::Dead);

        // A session that stayed up longer than the longest backoff counts as stable.
        if ready_since.elapsed() >= policy.max_interval() {
            backoff.reset();
            attempts = 0;
        }

        loop {
            if attempts >= policy.max_restarts {
                error!(
                    "Giving up after {attempts} consecutive restarts; session stays dead"
                );
                append_marker(&output, SESSION_ABANDONED_MARKER).await;
                return;
            }

            if attempts == 0 {
                append_marker(&output, SESSION_DIED_MARKER).await;
            } else {
                let delay = backoff.next_backoff().unwrap_or(policy.max_interval());
                debug!("Restart attempt {} in {delay:?}", attempts + 1);
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            attempts += 1;
            state.set(SessionState::Starting);

            match driver.start_server().await {
                Ok(true) => {
                    state.set(SessionState::Ready);
                    append_marker(&output, SESSION_STARTED_MARKER).await;
                    info!("Bridge session restarted (attempt {attempts})");
                    break;
                }
                Ok(false) => warn!("Restart attempt {attempts} did not start the server"),
                Err(e) => warn!("Restart attempt {attempts} failed: {e}"),
            }

            state.set(SessionState::Dead);
        }
    }
}
