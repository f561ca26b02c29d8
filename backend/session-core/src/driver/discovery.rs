//! Find a bridge server already listening on this machine.

use crate::BRIDGE_BINARY;
use crate::error::discovery::DiscoveryError;

use common::ErrorLocation;
use models::{BridgeServerInfo, BridgeServerInfoBuilder};

use std::panic::Location;
use std::thread::sleep;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, trace, warn};
use netstat2::{
    AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, SocketInfo, TcpState, get_sockets_info,
};
use sysinfo::{Pid, Process, ProcessStatus, ProcessesToUpdate, Signal, System};

/// How long a server gets to exit on SIGTERM before it is killed.
pub const TERM_GRACE: Duration = Duration::from_secs(3);
const KILL_GRACE: Duration = Duration::from_secs(2);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[track_caller]
fn query_tcp_sockets() -> Result<Vec<SocketInfo>, DiscoveryError> {
    get_sockets_info(
        AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6,
        ProtocolFlags::TCP,
    )
    .map_err(|e| DiscoveryError::NetworkQuery {
        message: format!("Failed to query network sockets: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })
}

pub(crate) fn with_process<F, R>(pid: u32, f: F) -> Option<R>
where
    F: FnOnce(&Process) -> R,
{
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);

    sys.process(Pid::from_u32(pid)).map(f)
}

pub(crate) fn format_command(process: &Process) -> String {
    process
        .cmd()
        .iter()
        .map(|s| s.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Look for a process listening on `port`.
///
/// Servers found this way were not started by us, so `owned` is `false`.
///
/// # Returns
///
/// * `Ok(Some(BridgeServerInfo))` - A listener was found and its process still exists
/// * `Ok(None)` - Nothing listens on the port
/// * `Err(DiscoveryError)` - The socket table could not be read
#[track_caller]
pub fn discover(port: u16) -> Result<Option<BridgeServerInfo>, DiscoveryError> {
    debug!("Looking for a bridge server on port {port}");

    let sockets = query_tcp_sockets()?;

    for s in sockets {
        if let ProtocolSocketInfo::Tcp(tcp) = s.protocol_socket_info
            && tcp.state == TcpState::Listen
            && tcp.local_port == port
            && let Some(&pid) = s.associated_pids.first()
        {
            trace!("Found process {pid} listening on port {port}");

            let data = with_process(pid, |p| {
                (p.name().to_string_lossy().to_string(), format_command(p))
            });

            if let Some((name, command)) = data {
                debug!("Discovered bridge server: {name} (PID: {pid})");

                let command = if command.is_empty() {
                    BRIDGE_BINARY.to_string()
                } else {
                    command
                };

                let server_info = BridgeServerInfoBuilder::default()
                    .with_pid(pid)
                    .with_port(port)
                    .with_name(name)
                    .with_command(command)
                    .with_owned(false)
                    .build()?;

                return Ok(Some(server_info));
            }

            trace!("Process {pid} disappeared before we could read its info");
        }
    }

    debug!("No process found listening on port {port}");
    Ok(None)
}

fn is_running(pid: u32) -> bool {
    with_process(pid, |p| p.status() != ProcessStatus::Zombie).unwrap_or(false)
}

fn send_signal(pid: u32, signal: Signal) -> bool {
    with_process(pid, |p| p.kill_with(signal).unwrap_or_else(|| p.kill())).unwrap_or(false)
}

/// Poll until `pid` is gone, for at most `limit`.
fn exited_within(pid: u32, limit: Duration) -> bool {
    let mut backoff = ExponentialBackoff {
        initial_interval: EXIT_POLL_INTERVAL,
        current_interval: EXIT_POLL_INTERVAL,
        max_elapsed_time: Some(limit),
        ..Default::default()
    };

    while is_running(pid) {
        let Some(delay) = backoff.next_backoff() else {
            return false;
        };
        trace!("PID {pid} still running, checking again in {delay:?}");
        sleep(delay);
    }
    true
}

/// Stop a bridge server we started, by PID.
///
/// Asks politely first and only kills the process if it outlives
/// [`TERM_GRACE`]. Blocks while waiting, so call it off the async runtime.
///
/// Returns `true` once the process is gone. Returns `false` if it was not
/// running, survived both signals, or is PID 0, PID 1 or this process.
pub fn stop_pid(pid: u32) -> bool {
    if pid <= 1 || pid == std::process::id() {
        warn!("Refusing to stop PID {pid}");
        return false;
    }
    if !is_running(pid) {
        debug!("PID {pid} is not running");
        return false;
    }

    if send_signal(pid, Signal::Term) && exited_within(pid, TERM_GRACE) {
        debug!("PID {pid} exited after SIGTERM");
        return true;
    }

    warn!("PID {pid} outlived SIGTERM, killing it");
    send_signal(pid, Signal::Kill);
    let stopped = exited_within(pid, KILL_GRACE);
    if !stopped {
        warn!("PID {pid} is still running after SIGKILL");
    }
    stopped
}
