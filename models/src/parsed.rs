use serde::{Deserialize, Serialize};

/// One row of process output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub name: String,
    /// `None` when the last column is not numeric.
    pub pid: Option<u32>,
    /// Whitespace-normalized display row.
    pub row: String,
}

/// Application metadata resolved from a package identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub package: String,
    pub display_name: String,
    /// Encoded icon image, if the metadata source has one.
    pub icon: Option<Vec<u8>>,
    pub system: bool,
}

/// A running process joined with its application descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppProcess {
    pub descriptor: AppDescriptor,
    pub pid: Option<u32>,
}

/// Interpretation of a tagged command's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParsedResult {
    DeviceList(Vec<String>),
    ProcessList(Vec<ProcessEntry>),
    PackageList(Vec<AppDescriptor>),
    KillAck(String),
}
