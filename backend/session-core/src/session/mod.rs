//! Single entry point for the presentation layer.
//!
//! [`SessionFacade`] wires the output channel, its tail poller, the server
//! supervisor, and the command correlator together, and owns their teardown.
//! Presentation code gets one facade injected rather than reaching for a global.

use crate::certificate::{Identity, SubjectPrincipal};
use crate::config::{PairingFlags, SessionConfig};
use crate::correlator::{
    CommandCorrelator, CorrelatorContext, CorrelatorSnapshot, NameOnlyResolver,
    PackageResolver, RequestHandle, TaggedCommand, commands, parse,
};
use crate::driver::{AdbProcessDriver, BridgeDriver};
use crate::error::CoreError;
use crate::error::certificate::CertificateError;
use crate::error::config::ConfigError;
use crate::error::correlator::CorrelatorError;
use crate::error::driver::DriverError;
use crate::error::output::OutputError;
use crate::error::supervisor::SupervisorError;
use crate::output::{OutputChannel, TailPoller, TailSnapshot, spawn_tail_poller};
use crate::supervisor::ServerSupervisor;

use common::ErrorLocation;
use models::{AppProcess, BridgeServerInfo, SessionState};

use std::panic::Location;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use tokio::sync::{Mutex, OnceCell, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct SessionFacade {
    driver: Arc<dyn BridgeDriver>,
    output: Arc<OutputChannel>,
    supervisor: ServerSupervisor,
    correlator: CommandCorrelator,
    resolver: Arc<dyn PackageResolver>,
    suppressed_packages: Vec<String>,
    tail: watch::Receiver<TailSnapshot>,
    flags: StdMutex<PairingFlags>,
    identity: OnceCell<Arc<Identity>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionFacade {
    /// Wire a facade around `driver`, which must write into `output`.
    ///
    /// Starts the tail poller and the correlator, so this must be called from
    /// within a Tokio runtime. The bridge server is not started until
    /// [`initialize`](Self::initialize).
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the pairing flags under `flags_dir` are unreadable.
    pub fn new(
        config: &SessionConfig,
        output: Arc<OutputChannel>,
        driver: Arc<dyn BridgeDriver>,
        resolver: Arc<dyn PackageResolver>,
        flags_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let supervisor =
            ServerSupervisor::new(Arc::clone(&driver), Arc::clone(&output), config.restart.clone());
        Self::assemble(config, output, driver, resolver, supervisor, flags_dir)
    }

    /// Facade over the bridge client binary named in `config`, with server
    /// discovery enabled on the configured port.
    pub fn with_process_driver(config: &SessionConfig, flags_dir: &Path) -> Result<Self, ConfigError> {
        let output = Arc::new(OutputChannel::new(config.output_log_path.clone()));
        let driver: Arc<dyn BridgeDriver> = Arc::new(AdbProcessDriver::new(
            config.bridge_binary.clone(),
            config.server_port,
            Arc::clone(&output),
        ));
        let supervisor =
            ServerSupervisor::new(Arc::clone(&driver), Arc::clone(&output), config.restart.clone())
                .with_discovery(config.server_port);

        Self::assemble(
            config,
            output,
            driver,
            Arc::new(NameOnlyResolver),
            supervisor,
            flags_dir,
        )
    }

    fn assemble(
        config: &SessionConfig,
        output: Arc<OutputChannel>,
        driver: Arc<dyn BridgeDriver>,
        resolver: Arc<dyn PackageResolver>,
        supervisor: ServerSupervisor,
        flags_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let flags = PairingFlags::load(flags_dir)?;
        let cancel = CancellationToken::new();

        let (tail_tx, tail) = watch::channel(TailSnapshot::default());
        let poller = TailPoller::new(Arc::clone(&output), config.tail_bytes, tail_tx);
        let poller_task = spawn_tail_poller(poller, config.poll_interval(), cancel.child_token());

        let (correlator, correlator_task) = CommandCorrelator::spawn(
            CorrelatorContext {
                driver: Arc::clone(&driver),
                output: Arc::clone(&output),
                resolver: Arc::clone(&resolver),
                suppressed_packages: config.suppressed_packages.clone(),
            },
            supervisor.watch_state(),
            tail.clone(),
            cancel.child_token(),
        );

        info!("Session facade ready (output: {})", output.path().display());

        Ok(Self {
            driver,
            output,
            supervisor,
            correlator,
            resolver,
            suppressed_packages: config.suppressed_packages.clone(),
            tail,
            flags: StdMutex::new(flags),
            identity: OnceCell::new(),
            cancel,
            tasks: Mutex::new(vec![poller_task, correlator_task]),
        })
    }

    // ============================================
    // LIFECYCLE
    // ============================================

    /// Start the bridge server and its death watch.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::ServerStartFailure`] if the server did not start.
    pub async fn initialize(&self) -> Result<(), SupervisorError> {
        self.supervisor.initialize().await
    }

    /// Run [`initialize`](Self::initialize) off the caller's task and report
    /// success to `on_done`.
    pub fn initialize_in_background<F>(self: &Arc<Self>, on_done: F) -> JoinHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let facade = Arc::clone(self);
        tokio::spawn(async move {
            let started = match facade.initialize().await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Background initialize failed: {e}");
                    false
                }
            };
            on_done(started);
        })
    }

    /// Stop the poller, the correlator, and the death watch, then release the
    /// bridge session. Pending requests are not completed.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.supervisor.shutdown().await;

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Session task ended abnormally: {e}");
            }
        }

        info!("Session facade shut down");
    }

    pub fn state(&self) -> SessionState {
        self.supervisor.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.supervisor.watch_state()
    }

    pub fn subscribe_transitions(&self) -> broadcast::Receiver<SessionState> {
        self.supervisor.subscribe_transitions()
    }

    pub async fn bridge_server(&self) -> Option<BridgeServerInfo> {
        self.supervisor.bridge_server().await
    }

    // ============================================
    // COMMANDS
    // ============================================

    /// Dispatch `argv` without tagging it. Output shows up in the tail only.
    ///
    /// # Errors
    ///
    /// [`CorrelatorError::SessionUnavailable`] unless the session is `Ready`,
    /// [`CorrelatorError::Dispatch`] if the driver rejected the command.
    pub async fn submit(
        &self,
        argv: Vec<String>,
        use_external_client: bool,
    ) -> Result<(), CorrelatorError> {
        let state = self.state();
        if !state.accepts_commands() {
            return Err(CorrelatorError::SessionUnavailable {
                message: format!("Cannot run '{}' while session is {state}", argv.join(" ")),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        debug!("Submitting untagged command: {argv:?}");
        self.driver
            .execute(&argv, use_external_client)
            .await
            .map_err(|e| CorrelatorError::Dispatch {
                message: format!("Failed to dispatch '{}'", argv.join(" ")),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })
    }

    /// Dispatch a tagged command and track its outcome.
    pub async fn request(&self, command: TaggedCommand) -> Result<RequestHandle, CorrelatorError> {
        self.correlator.submit(command).await
    }

    pub async fn refresh_devices(&self) -> Result<RequestHandle, CorrelatorError> {
        self.request(commands::list_devices()).await
    }

    pub async fn load_processes(&self) -> Result<RequestHandle, CorrelatorError> {
        let serial = self.require_device().await?;
        self.request(commands::list_processes(&serial)).await
    }

    pub async fn load_packages(&self) -> Result<RequestHandle, CorrelatorError> {
        let serial = self.require_device().await?;
        self.request(commands::list_packages(&serial)).await
    }

    /// Force-stop `package` on the selected device. A process refresh follows
    /// the acknowledgement.
    pub async fn kill_app(&self, package: &str) -> Result<RequestHandle, CorrelatorError> {
        let serial = self.require_device().await?;
        self.request(commands::force_stop(&serial, package)).await
    }

    pub async fn select_device(&self, serial: Option<String>) -> Result<(), CorrelatorError> {
        self.correlator.select_device(serial).await
    }

    pub async fn send_raw_input(&self, text: &str) -> Result<(), DriverError> {
        self.driver.send_raw_input(text).await
    }

    pub async fn snapshot(&self) -> CorrelatorSnapshot {
        self.correlator.snapshot().await
    }

    /// Running processes joined with their applications, from the latest
    /// process and package listings.
    pub async fn app_processes(&self, name_filter: &str, hide_system: bool) -> Vec<AppProcess> {
        let snapshot = self.correlator.snapshot().await;
        parse::app_processes(
            &snapshot.processes,
            &snapshot.packages,
            &self.suppressed_packages,
            self.resolver.as_ref(),
            name_filter,
            hide_system,
        )
        .await
    }

    async fn require_device(&self) -> Result<String, CorrelatorError> {
        self.correlator
            .selected_device()
            .await
            .ok_or_else(|| CorrelatorError::NoDeviceSelected {
                message: String::from("Select a device or refresh the device list first"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    // ============================================
    // OUTPUT
    // ============================================

    /// Append `text` as a line of output.
    pub async fn echo(&self, text: &str) -> Result<(), OutputError> {
        self.output.append_line(text).await
    }

    /// Receiver updated with the output tail each time it changes.
    pub fn observe_output(&self) -> watch::Receiver<TailSnapshot> {
        self.tail.clone()
    }

    /// Tail text as of the last poll.
    pub fn current_output(&self) -> String {
        self.tail.borrow().text.clone()
    }

    pub async fn clear_output(&self) -> Result<(), OutputError> {
        self.output.clear().await
    }

    // ============================================
    // PAIRING
    // ============================================

    fn flags(&self) -> MutexGuard<'_, PairingFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_paired(&self) -> bool {
        self.flags().is_paired()
    }

    pub fn needs_to_pair(&self) -> bool {
        self.flags().needs_to_pair()
    }

    pub fn mark_paired(&self, paired: bool) -> Result<(), ConfigError> {
        self.flags().mark_paired(paired)
    }

    pub fn is_verified(&self) -> bool {
        self.flags().is_verified()
    }

    pub fn mark_verified(&self, verified: bool) -> Result<(), ConfigError> {
        self.flags().mark_verified(verified)
    }

    /// Identity for the pairing channel, generated on first use and kept for
    /// the life of the facade. Later calls return the same identity whatever
    /// `subject` they pass.
    pub async fn pairing_identity(
        &self,
        subject: &SubjectPrincipal,
    ) -> Result<Arc<Identity>, CoreError> {
        let identity = self
            .identity
            .get_or_try_init(|| async {
                let subject = subject.clone();
                let identity = tokio::task::spawn_blocking(move || Identity::generate(&subject))
                    .await
                    .map_err(|e| CertificateError::CryptoFailure {
                        message: format!("Identity generation task failed: {e}"),
                        location: ErrorLocation::from(Location::caller()),
                        source: Some(Box::new(e)),
                    })??;
                Ok::<_, CoreError>(Arc::new(identity))
            })
            .await?;

        Ok(Arc::clone(identity))
    }
}
