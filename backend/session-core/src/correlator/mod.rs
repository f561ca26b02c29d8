//! Correlates one in-flight tagged command with the output it produces.
//!
//! # Architecture
//!
//! Same actor shape as the rest of the engine:
//! - Submissions and device selection are sent over an mpsc channel
//! - A dedicated task owns the pending slot and processes them sequentially
//! - The same task watches the output tail and parses it under the pending tag
//! - Reads go through `Arc<RwLock<CorrelatorSnapshot>>`
//!
//! # Pending policy
//!
//! There is exactly one pending slot. A submission while another command is
//! pending replaces it (last writer wins), and the replaced request's handle
//! resolves to [`RequestOutcome::Superseded`]. Submissions while the session
//! is not `Ready` are rejected with [`CorrelatorError::SessionUnavailable`].
//!
//! # Matching output to a request
//!
//! Output is shared with session markers, echoed input and the interactive
//! shell. A request completes only on the closed [`transcript`] frame whose
//! echo line carries its exact argv, and only that frame is parsed. Anything
//! else in the tail leaves the request pending.
//!
//! A command whose output never arrives stays pending until replaced. Callers
//! that need a bounded wait should time out on [`RequestHandle::outcome`].

pub mod commands;
pub mod package;
pub mod parse;

pub use commands::TaggedCommand;
pub use package::{CatalogResolver, NameOnlyResolver, PackageResolver};

use crate::driver::{BridgeDriver, transcript};
use crate::error::correlator::CorrelatorError;
use crate::output::{OutputChannel, TailSnapshot};

use common::ErrorLocation;
use models::{
    AppDescriptor, CommandTag, ParsedResult, PendingCommand, ProcessEntry, RequestId,
    SessionState,
};

use std::panic::Location;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{RwLock, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// How a submitted request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The tag's rule interpreted the output.
    Completed(ParsedResult),
    /// Another submission took the pending slot first.
    Superseded { by: RequestId },
}

/// Returned by a successful submission.
#[derive(Debug)]
pub struct RequestHandle {
    pub id: RequestId,
    pub tag: CommandTag,
    outcome: oneshot::Receiver<RequestOutcome>,
}

impl RequestHandle {
    /// Wait for the request to complete or be superseded.
    ///
    /// # Errors
    ///
    /// [`CorrelatorError::ActorStopped`] if the correlator shut down first.
    pub async fn outcome(self) -> Result<RequestOutcome, CorrelatorError> {
        self.outcome.await.map_err(|_| CorrelatorError::ActorStopped {
            message: format!("Correlator stopped before request {} resolved", self.id),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Latest parsed state, readable without going through the actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelatorSnapshot {
    pub pending: Option<PendingCommand>,
    pub selected_device: Option<String>,
    pub devices: Vec<String>,
    pub processes: Vec<ProcessEntry>,
    pub packages: Vec<AppDescriptor>,
    pub last_kill_ack: Option<String>,
}

enum CorrelatorCommand {
    Submit {
        command: TaggedCommand,
        reply: oneshot::Sender<Result<RequestHandle, CorrelatorError>>,
    },
    SelectDevice {
        serial: Option<String>,
        reply: oneshot::Sender<()>,
    },
}

/// Everything the actor needs besides its channels.
pub struct CorrelatorContext {
    pub driver: Arc<dyn BridgeDriver>,
    pub output: Arc<OutputChannel>,
    pub resolver: Arc<dyn PackageResolver>,
    pub suppressed_packages: Vec<String>,
}

/// Handle to the correlator actor. Clones share the same actor.
#[derive(Clone)]
pub struct CommandCorrelator {
    command_tx: mpsc::Sender<CorrelatorCommand>,
    snapshot: Arc<RwLock<CorrelatorSnapshot>>,
}

impl CommandCorrelator {
    /// Spawn the actor. Must be called from within a Tokio runtime.
    ///
    /// The actor runs until `cancel` fires or every handle is dropped.
    pub fn spawn(
        context: CorrelatorContext,
        session: watch::Receiver<SessionState>,
        tail: watch::Receiver<TailSnapshot>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let snapshot = Arc::new(RwLock::new(CorrelatorSnapshot::default()));

        let actor = CorrelatorActor {
            context,
            session,
            snapshot: Arc::clone(&snapshot),
            in_flight: None,
        };
        let task = tokio::spawn(actor.run(command_rx, tail, cancel));
        info!("Command correlator started");

        (
            Self {
                command_tx,
                snapshot,
            },
            task,
        )
    }

    /// Tag `command` as expected and dispatch it.
    ///
    /// # Errors
    ///
    /// - [`CorrelatorError::SessionUnavailable`] if the session is not `Ready`
    /// - [`CorrelatorError::Dispatch`] if the driver rejected the command
    /// - [`CorrelatorError::ActorStopped`] if the correlator has shut down
    pub async fn submit(&self, command: TaggedCommand) -> Result<RequestHandle, CorrelatorError> {
        let (reply, response) = oneshot::channel();
        self.send(CorrelatorCommand::Submit { command, reply }).await?;

        response.await.map_err(|_| CorrelatorError::ActorStopped {
            message: String::from("Correlator dropped the submission"),
            location: ErrorLocation::from(Location::caller()),
        })?
    }

    /// Override the selected device. `None` clears the selection.
    ///
    /// Returns once the selection is visible to [`selected_device`](Self::selected_device).
    pub async fn select_device(&self, serial: Option<String>) -> Result<(), CorrelatorError> {
        let (reply, applied) = oneshot::channel();
        self.send(CorrelatorCommand::SelectDevice { serial, reply }).await?;

        applied.await.map_err(|_| CorrelatorError::ActorStopped {
            message: String::from("Correlator dropped the device selection"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    pub async fn snapshot(&self) -> CorrelatorSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn pending(&self) -> Option<PendingCommand> {
        self.snapshot.read().await.pending.clone()
    }

    pub async fn selected_device(&self) -> Option<String> {
        self.snapshot.read().await.selected_device.clone()
    }

    async fn send(&self, command: CorrelatorCommand) -> Result<(), CorrelatorError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|e| CorrelatorError::ActorStopped {
                message: format!("Correlator actor died: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

struct InFlight {
    command: PendingCommand,
    /// Output epoch right after the pre-dispatch clear.
    epoch: u64,
    notify: oneshot::Sender<RequestOutcome>,
}

struct CorrelatorActor {
    context: CorrelatorContext,
    session: watch::Receiver<SessionState>,
    snapshot: Arc<RwLock<CorrelatorSnapshot>>,
    in_flight: Option<InFlight>,
}

impl CorrelatorActor {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<CorrelatorCommand>,
        mut tail: watch::Receiver<TailSnapshot>,
        cancel: CancellationToken,
    ) {
        let mut tail_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = command_rx.recv() => match command {
                    Some(CorrelatorCommand::Submit { command, reply }) => {
                        let result = self.submit(command, &mut tail).await;
                        // The submitter may have given up waiting.
                        let _ = reply.send(result);
                    }
                    Some(CorrelatorCommand::SelectDevice { serial, reply }) => {
                        info!("Selected device: {serial:?}");
                        self.snapshot.write().await.selected_device = serial;
                        let _ = reply.send(());
                    }
                    None => break,
                },
                changed = tail.changed(), if tail_open => {
                    if changed.is_err() {
                        debug!("Output tail publisher closed");
                        tail_open = false;
                        continue;
                    }
                    let current = tail.borrow_and_update().clone();
                    self.on_output(current, &mut tail).await;
                }
            }
        }

        info!("Command correlator stopped");
    }

    async fn submit(
        &mut self,
        command: TaggedCommand,
        tail: &mut watch::Receiver<TailSnapshot>,
    ) -> Result<RequestHandle, CorrelatorError> {
        let state = *self.session.borrow();
        if !state.accepts_commands() {
            warn!("Rejecting '{}' while session is {state}", command.tag);
            return Err(CorrelatorError::SessionUnavailable {
                message: format!("Cannot submit '{}' while session is {state}", command.tag),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let pending = PendingCommand::new(command.tag, command.argv);

        if let Some(previous) = self.in_flight.take() {
            info!(
                "Request {} ({}) superseded by {} ({})",
                previous.command.id, previous.command.tag, pending.id, pending.tag
            );
            let _ = previous.notify.send(RequestOutcome::Superseded { by: pending.id });
        }

        if let Err(e) = self.context.output.clear().await {
            warn!("Failed to clear output before dispatch: {e}");
        }
        let epoch = self.context.output.epoch();
        // Anything published so far predates this request.
        tail.mark_unchanged();

        debug!("Dispatching {} request {}: {:?}", pending.tag, pending.id, pending.argv);

        if let Err(e) = self.context.driver.execute(&pending.argv, true).await {
            self.snapshot.write().await.pending = None;
            return Err(CorrelatorError::Dispatch {
                message: format!("Failed to dispatch '{}'", pending.tag),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            });
        }

        let (notify, outcome) = oneshot::channel();
        let handle = RequestHandle {
            id: pending.id,
            tag: pending.tag,
            outcome,
        };

        self.snapshot.write().await.pending = Some(pending.clone());
        self.in_flight = Some(InFlight {
            command: pending,
            epoch,
            notify,
        });

        Ok(handle)
    }

    async fn on_output(&mut self, current: TailSnapshot, tail: &mut watch::Receiver<TailSnapshot>) {
        let Some(in_flight) = self.in_flight.as_ref() else {
            return;
        };

        if current.epoch < in_flight.epoch {
            debug!("Ignoring output from before request {}", in_flight.command.id);
            return;
        }

        let Some(response) = transcript::response_for(&current.text, &in_flight.command.argv)
        else {
            return;
        };

        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        let tag = in_flight.command.tag;
        let result = self.interpret(tag, response).await;

        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.pending = None;
            match &result {
                ParsedResult::DeviceList(devices) => {
                    snapshot.devices = devices.clone();
                    if snapshot.selected_device.is_none()
                        && let Some(first) = devices.first()
                    {
                        info!("Auto-selected device {first}");
                        snapshot.selected_device = Some(first.clone());
                    }
                }
                ParsedResult::ProcessList(processes) => snapshot.processes = processes.clone(),
                ParsedResult::PackageList(packages) => snapshot.packages = packages.clone(),
                ParsedResult::KillAck(ack) => snapshot.last_kill_ack = Some(ack.clone()),
            }
        }

        info!("Request {} ({tag}) completed", in_flight.command.id);
        let _ = in_flight.notify.send(RequestOutcome::Completed(result));

        if let Err(e) = self.context.output.clear().await {
            warn!("Failed to clear output after {tag}: {e}");
        }

        if tag == CommandTag::Kill {
            self.refresh_processes(tail).await;
        }
    }

    async fn interpret(&self, tag: CommandTag, text: &str) -> ParsedResult {
        match tag {
            CommandTag::Devices => ParsedResult::DeviceList(parse::parse_devices(text)),
            CommandTag::Ps => ParsedResult::ProcessList(parse::parse_processes(text)),
            CommandTag::Pm => ParsedResult::PackageList(
                parse::parse_packages(
                    text,
                    &self.context.suppressed_packages,
                    self.context.resolver.as_ref(),
                )
                .await,
            ),
            CommandTag::Kill => ParsedResult::KillAck(text.trim().to_string()),
        }
    }

    async fn refresh_processes(&mut self, tail: &mut watch::Receiver<TailSnapshot>) {
        let Some(serial) = self.snapshot.read().await.selected_device.clone() else {
            debug!("No device selected, skipping process refresh");
            return;
        };

        if let Err(e) = self.submit(commands::list_processes(&serial), tail).await {
            warn!("Process refresh after kill failed: {e}");
        }
    }
}
