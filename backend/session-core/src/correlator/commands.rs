//! Argument vectors for the tagged commands.

use models::CommandTag;

const SERIAL_FLAG: &str = "-s";
const SHELL: &str = "shell";

/// A command whose output is parsed under `tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedCommand {
    pub tag: CommandTag,
    pub argv: Vec<String>,
}

impl TaggedCommand {
    pub fn new(tag: CommandTag, argv: Vec<String>) -> Self {
        Self { tag, argv }
    }
}

fn on_device(serial: &str, remote: &[&str]) -> Vec<String> {
    [SERIAL_FLAG, serial, SHELL]
        .iter()
        .chain(remote)
        .map(|s| s.to_string())
        .collect()
}

pub fn list_devices() -> TaggedCommand {
    TaggedCommand::new(CommandTag::Devices, vec![String::from("devices")])
}

/// Running processes whose name contains `com`, kernel threads filtered out.
pub fn list_processes(serial: &str) -> TaggedCommand {
    TaggedCommand::new(
        CommandTag::Ps,
        on_device(
            serial,
            &[
                "ps", "-A", "-o", "NAME,PID", "|", "grep", "-v", "'^\\['", "|", "grep", "com",
            ],
        ),
    )
}

/// Third-party packages only.
pub fn list_packages(serial: &str) -> TaggedCommand {
    TaggedCommand::new(
        CommandTag::Pm,
        on_device(serial, &["pm", "list", "packages", "-3"]),
    )
}

pub fn force_stop(serial: &str, package: &str) -> TaggedCommand {
    TaggedCommand::new(
        CommandTag::Kill,
        on_device(serial, &["am", "force-stop", package]),
    )
}
