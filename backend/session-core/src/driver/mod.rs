//! Seam between the session engine and the bridge-protocol implementation.
//!
//! The engine never speaks the wire protocol itself. It drives something that
//! can start a server, report when it dies, and dispatch commands whose output
//! shows up later in the [`OutputChannel`](crate::output::OutputChannel).

pub mod discovery;
pub mod process;
pub mod transcript;

pub use process::AdbProcessDriver;

use crate::error::driver::DriverError;

use async_trait::async_trait;

#[async_trait]
pub trait BridgeDriver: Send + Sync {
    /// Start the bridge server and its session.
    ///
    /// `Ok(false)` means the driver ran but the server did not come up.
    async fn start_server(&self) -> Result<bool, DriverError>;

    /// Suspend until the current session ends. Returns immediately if none is live.
    async fn wait_for_termination(&self);

    /// Dispatch `argv` for side effect; output arrives through the output channel.
    ///
    /// With `use_external_client` the command runs through a separate client
    /// invocation, otherwise it is typed into the live session shell.
    async fn execute(&self, argv: &[String], use_external_client: bool)
    -> Result<(), DriverError>;

    /// Write a line to the live session shell.
    async fn send_raw_input(&self, text: &str) -> Result<(), DriverError>;

    /// Release the live session.
    async fn stop(&self) -> Result<(), DriverError>;
}
