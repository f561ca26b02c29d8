//! Parsing rules applied to the output tail, one per command tag.
//!
//! Rules run on one command's frame (see [`transcript`](crate::driver::transcript)),
//! without its status line. Every rule drops the first line, which is the
//! `$ <command>` echo line.

use crate::correlator::package::PackageResolver;

use models::{AppDescriptor, AppProcess, ProcessEntry};

use log::{debug, warn};

/// Lines containing this are pipeline artifacts, not data.
pub const NOISE_MARKER: &str = "grep";
pub const PACKAGE_PREFIX: &str = "package:";
const DEVICE_STATE: &str = "device";
const DEVICE_FIELD_SEPARATOR: char = '\t';

/// Identifiers of devices in the `device` state, in listing order.
pub fn parse_devices(text: &str) -> Vec<String> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split(DEVICE_FIELD_SEPARATOR);
            let serial = fields.next()?.trim();
            let state = fields.next()?.trim();
            (state == DEVICE_STATE && !serial.is_empty()).then(|| serial.to_string())
        })
        .collect()
}

/// Rows with at least two whitespace-separated fields.
///
/// The name is the first field, the PID the last.
pub fn parse_processes(text: &str) -> Vec<ProcessEntry> {
    text.lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty() && !line.contains(NOISE_MARKER))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                return None;
            }
            Some(ProcessEntry {
                name: fields[0].to_string(),
                pid: fields[fields.len() - 1].parse().ok(),
                row: fields.join(" "),
            })
        })
        .collect()
}

/// Package identifiers listed in `text`, minus the suppressed ones.
pub fn package_names(text: &str, suppressed: &[String]) -> Vec<String> {
    text.lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(NOISE_MARKER))
        .map(|line| strip_package_prefix(line).to_string())
        .filter(|name| !is_suppressed(name, suppressed))
        .collect()
}

/// Resolve each listed package. Lines that fail resolution are dropped.
pub async fn parse_packages(
    text: &str,
    suppressed: &[String],
    resolver: &dyn PackageResolver,
) -> Vec<AppDescriptor> {
    let mut descriptors = Vec::new();

    for name in package_names(text, suppressed) {
        match resolver.resolve(&name).await {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => debug!("Dropping package line: {e}"),
        }
    }

    descriptors
}

pub fn strip_package_prefix(name: &str) -> &str {
    name.strip_prefix(PACKAGE_PREFIX).unwrap_or(name)
}

fn is_suppressed(name: &str, suppressed: &[String]) -> bool {
    suppressed.iter().any(|s| s == name)
}

/// Join running processes with the application each one belongs to.
///
/// A process is matched against `packages` by name first and resolved through
/// `resolver` otherwise. Processes that resolve to nothing, that match neither
/// by name nor by package `name_filter`, or that are system applications while
/// `hide_system` is set, are left out.
pub async fn app_processes(
    processes: &[ProcessEntry],
    packages: &[AppDescriptor],
    suppressed: &[String],
    resolver: &dyn PackageResolver,
    name_filter: &str,
    hide_system: bool,
) -> Vec<AppProcess> {
    let mut rows = Vec::new();

    for process in processes {
        let name = strip_package_prefix(&process.name);
        if is_suppressed(name, suppressed) {
            continue;
        }

        let descriptor = match packages.iter().find(|d| d.package == name) {
            Some(known) => known.clone(),
            None => match resolver.resolve(name).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!("No application for process {name}: {e}");
                    continue;
                }
            },
        };

        if hide_system && descriptor.system {
            continue;
        }

        if !name_filter.is_empty()
            && !descriptor.display_name.contains(name_filter)
            && !descriptor.package.contains(name_filter)
        {
            continue;
        }

        rows.push(AppProcess {
            descriptor,
            pid: process.pid,
        });
    }

    rows
}
