//! Session engine for a device-bridge debugging client.
//!
//! Keeps a local bridge server alive, tails everything it prints, and
//! correlates one tagged command at a time with the output it produces.
//! The presentation layer talks to [`session::SessionFacade`] only.

pub mod certificate;
pub mod config;
pub mod correlator;
pub mod driver;
pub mod error;
pub mod output;
pub mod session;
pub mod supervisor;

#[cfg(test)]
mod tests;

pub const BRIDGE_BINARY: &str = "adb";
pub const BRIDGE_SERVER_PORT: u16 = 5037;
