//! [`BridgeDriver`] backed by the bridge client binary.
//!
//! `start_server` runs `<bin> start-server`, then keeps an interactive
//! `<bin> shell` child alive. Its exit is the session's death. Shell output is
//! streamed into the output channel as it arrives. One-off client invocations
//! are collected and appended as one [`transcript`] frame.

use crate::driver::{BridgeDriver, transcript};
use crate::error::driver::DriverError;
use crate::output::OutputChannel;

use common::ErrorLocation;

use std::io::ErrorKind;
use std::panic::Location;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, oneshot, watch};

const PORT_FLAG: &str = "-P";
const START_SERVER_COMMAND: &str = "start-server";
const SHELL_COMMAND: &str = "shell";
const PUMP_BUFFER_BYTES: usize = 4096;
const SERVER_SOCKET_PATTERN: &str = r"tcp:(?P<port>\d+)";
const SOCKET_CAPTURE_PORT: &str = "port";

static SOCKET_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_socket_regex() -> &'static Regex {
    SOCKET_REGEX.get_or_init(|| Regex::new(SERVER_SOCKET_PATTERN).expect("valid regex pattern"))
}

/// Port announced in the server's startup banner, e.g.
/// `* daemon not running; starting now at tcp:5037`.
pub(crate) fn parse_announced_port(banner: &str) -> Option<u16> {
    get_socket_regex()
        .captures(banner)
        .and_then(|cap| cap.name(SOCKET_CAPTURE_PORT))
        .and_then(|m| m.as_str().parse().ok())
}

pub(crate) fn build_client_command(binary: &str, port: u16, args: &[String]) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg(PORT_FLAG)
        .arg(port.to_string())
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

pub(crate) fn build_shell_command(binary: &str, port: u16) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg(PORT_FLAG)
        .arg(port.to_string())
        .arg(SHELL_COMMAND)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

struct ShellHandle {
    pid: Option<u32>,
    stdin: ChildStdin,
    kill_tx: Option<oneshot::Sender<()>>,
    exited: watch::Receiver<bool>,
}

pub struct AdbProcessDriver {
    binary: String,
    port: u16,
    output: Arc<OutputChannel>,
    shell: Mutex<Option<ShellHandle>>,
}

impl AdbProcessDriver {
    pub fn new(binary: impl Into<String>, port: u16, output: Arc<OutputChannel>) -> Self {
        Self {
            binary: binary.into(),
            port,
            output,
            shell: Mutex::new(None),
        }
    }

    #[track_caller]
    fn spawn_failure(&self, what: &str, err: std::io::Error) -> DriverError {
        let message = if err.kind() == ErrorKind::NotFound {
            format!("{} not found in PATH while running {what}", self.binary)
        } else {
            format!("Failed to run {} {what}: {err}", self.binary)
        };
        DriverError::Spawn {
            message,
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(err),
        }
    }

    async fn run_start_server(&self) -> Result<bool, DriverError> {
        let args = vec![START_SERVER_COMMAND.to_string()];
        let result = build_client_command(&self.binary, self.port, &args)
            .output()
            .await
            .map_err(|e| self.spawn_failure(START_SERVER_COMMAND, e))?;

        let banner = format!(
            "{}{}",
            String::from_utf8_lossy(&result.stderr),
            String::from_utf8_lossy(&result.stdout)
        );

        for line in banner.lines() {
            trace!("Server output: {line}");
        }

        if let Some(port) = parse_announced_port(&banner)
            && port != self.port
        {
            warn!("Server announced port {port}, expected {}", self.port);
        }

        if !result.status.success() {
            warn!("{} {START_SERVER_COMMAND} exited with {}", self.binary, result.status);
            return Ok(false);
        }

        Ok(true)
    }

    async fn spawn_shell(&self) -> Result<ShellHandle, DriverError> {
        let mut child = build_shell_command(&self.binary, self.port)
            .spawn()
            .map_err(|e| self.spawn_failure(SHELL_COMMAND, e))?;

        let stdin = child.stdin.take().ok_or_else(|| DriverError::Io {
            message: String::from("Shell child has no stdin"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(std::io::Error::from(ErrorKind::BrokenPipe)),
        })?;

        pump_child_output(&mut child, Arc::clone(&self.output));

        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exited_tx, exited) = watch::channel(false);

        tokio::spawn(watch_child(child, kill_rx, exited_tx));

        info!("Bridge shell started (PID: {pid:?})");

        Ok(ShellHandle {
            pid,
            stdin,
            kill_tx: Some(kill_tx),
            exited,
        })
    }
}

/// Copy the child's stdout and stderr into the output channel until EOF.
fn pump_child_output(child: &mut Child, output: Arc<OutputChannel>) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, Arc::clone(&output)));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, output));
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, output: Arc<OutputChannel>) {
    let mut buf = vec![0u8; PUMP_BUFFER_BYTES];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = output.append(&buf[..n]).await {
                    warn!("Dropping {n} bytes of bridge output: {e}");
                }
            }
            Err(e) => {
                debug!("Bridge output stream closed: {e}");
                break;
            }
        }
    }
}

async fn watch_child(mut child: Child, kill_rx: oneshot::Receiver<()>, exited: watch::Sender<bool>) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => info!("Bridge shell exited with {status}"),
            Err(e) => warn!("Failed waiting on bridge shell: {e}"),
        },
        _ = kill_rx => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill bridge shell: {e}");
            }
            debug!("Bridge shell killed");
        }
    }
    exited.send_replace(true);
}

#[async_trait]
impl BridgeDriver for AdbProcessDriver {
    async fn start_server(&self) -> Result<bool, DriverError> {
        info!("Starting bridge server on port {}", self.port);

        if !self.run_start_server().await? {
            return Ok(false);
        }

        let handle = self.spawn_shell().await?;

        let previous = self.shell.lock().await.replace(handle);
        if let Some(mut old) = previous
            && let Some(kill) = old.kill_tx.take()
        {
            debug!("Replacing previous bridge shell (PID: {:?})", old.pid);
            let _ = kill.send(());
        }

        Ok(true)
    }

    async fn wait_for_termination(&self) {
        let exited = self.shell.lock().await.as_ref().map(|h| h.exited.clone());

        if let Some(mut exited) = exited {
            // A closed sender also means the watcher task is gone.
            let _ = exited.wait_for(|dead| *dead).await;
        }
    }

    async fn execute(
        &self,
        argv: &[String],
        use_external_client: bool,
    ) -> Result<(), DriverError> {
        if !use_external_client {
            return self.send_raw_input(&argv.join(" ")).await;
        }

        let command_line = format!("{} {}", self.binary, argv.join(" "));
        debug!("Executing {command_line}");

        let child = build_client_command(&self.binary, self.port, argv)
            .spawn()
            .map_err(|e| self.spawn_failure(&argv.join(" "), e))?;

        let output = Arc::clone(&self.output);
        tokio::spawn(async move {
            let result = match child.wait_with_output().await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Failed waiting on client command: {e}");
                    return;
                }
            };
            trace!("Client command exited with {}", result.status);

            let mut body = result.stdout;
            body.extend_from_slice(&result.stderr);
            let framed = transcript::frame(&command_line, &body, result.status.code());
            if let Err(e) = output.append(&framed).await {
                warn!("Dropping output of '{command_line}': {e}");
            }
        });

        Ok(())
    }

    async fn send_raw_input(&self, text: &str) -> Result<(), DriverError> {
        let mut guard = self.shell.lock().await;
        let handle = guard.as_mut().ok_or_else(|| DriverError::NotRunning {
            message: String::from("No bridge shell is running"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let line = format!("{text}\n");
        handle
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DriverError::Io {
                message: format!("Failed to write to bridge shell: {e}"),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            })?;
        handle.stdin.flush().await.map_err(|e| DriverError::Io {
            message: format!("Failed to flush bridge shell input: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;

        Ok(())
    }

    async fn stop(&self) -> Result<(), DriverError> {
        let handle = self.shell.lock().await.take();

        if let Some(mut handle) = handle {
            info!("Stopping bridge shell (PID: {:?})", handle.pid);
            if let Some(kill) = handle.kill_tx.take() {
                let _ = kill.send(());
            }
            let _ = handle.exited.wait_for(|dead| *dead).await;
        }

        Ok(())
    }
}
