use crate::error::model_error::ModelError;
use crate::{BridgeServerInfo, ErrorLocation};

use std::panic::Location;

const SOCKET_SCHEME: &str = "tcp:";

/// Builder for validated [`BridgeServerInfo`] instances.
#[derive(Debug, Default)]
pub struct BridgeServerInfoBuilder {
    pid: Option<u32>,
    port: Option<u16>,
    socket: Option<String>,
    name: Option<String>,
    command: Option<String>,
    owned: Option<bool>,
}

impl BridgeServerInfoBuilder {
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_command(mut self, cmd: impl Into<String>) -> Self {
        self.command = Some(cmd.into());
        self
    }

    pub fn with_owned(mut self, owned: bool) -> Self {
        self.owned = Some(owned);
        self
    }

    /// Validate the collected fields.
    ///
    /// The socket defaults to `tcp:<port>` and ownership to `false` when not
    /// given. PID, port, name and command are required and must be non-empty.
    #[track_caller]
    pub fn build(self) -> Result<BridgeServerInfo, ModelError> {
        let pid = required(self.pid, "PID")?;
        let port = required(self.port, "port")?;
        if pid == 0 || port == 0 {
            return Err(invalid(format!(
                "PID and port must be non-zero (pid={pid}, port={port})"
            )));
        }

        let socket = self
            .socket
            .unwrap_or_else(|| format!("{SOCKET_SCHEME}{port}"));
        if socket.strip_prefix(SOCKET_SCHEME) != Some(port.to_string().as_str()) {
            return Err(invalid(format!(
                "Socket spec {socket} does not name port {port}"
            )));
        }

        let name = required(self.name.filter(|n| !n.is_empty()), "server name")?;
        let command = required(self.command.filter(|c| !c.is_empty()), "command line")?;

        Ok(BridgeServerInfo {
            pid,
            port,
            socket,
            name,
            command,
            owned: self.owned.unwrap_or(false),
        })
    }
}

#[track_caller]
fn required<T>(field: Option<T>, what: &str) -> Result<T, ModelError> {
    field.ok_or_else(|| invalid(format!("Missing {what}")))
}

#[track_caller]
fn invalid(message: String) -> ModelError {
    ModelError::InvalidServerInfo {
        message,
        location: ErrorLocation::from(Location::caller()),
    }
}
