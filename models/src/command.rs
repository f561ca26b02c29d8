use std::fmt::{Display, Formatter, Result as FormatResult};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parsing rule applied to the output of a tagged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandTag {
    /// `devices`: attached device identifiers.
    Devices,
    /// `ps`: running processes as `{name, pid}` rows.
    Ps,
    /// `pm`: installed packages resolved to application descriptors.
    Pm,
    /// `kill`: force-stop acknowledgement.
    Kill,
}

impl CommandTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandTag::Devices => "devices",
            CommandTag::Ps => "ps",
            CommandTag::Pm => "pm",
            CommandTag::Kill => "kill",
        }
    }
}

impl Display for CommandTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.as_str())
    }
}

/// Identifies one submitted request so its outcome can be matched later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "{}", self.0)
    }
}

/// The single in-flight command whose output is being correlated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub id: RequestId,
    pub tag: CommandTag,
    pub argv: Vec<String>,
    pub issued_at: SystemTime,
}

impl PendingCommand {
    pub fn new(tag: CommandTag, argv: Vec<String>) -> Self {
        Self {
            id: RequestId::new(),
            tag,
            argv,
            issued_at: SystemTime::now(),
        }
    }
}
