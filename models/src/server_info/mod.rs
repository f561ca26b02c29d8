pub mod builder;

use serde::{Deserialize, Serialize};

/// A bridge server process found listening on the local machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeServerInfo {
    pub pid: u32,
    pub port: u16,
    /// Socket spec as the bridge prints it, e.g. `tcp:5037`.
    pub socket: String,
    pub name: String,
    pub command: String,
    /// Whether this process was started by us.
    pub owned: bool,
}
