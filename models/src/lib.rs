//! Domain models for the device bridge session engine.
//!
//! Pure data passed between layers. No I/O and no business logic beyond
//! validation; the session engine in `session-core` operates on these.

pub mod command;
pub mod error;
pub mod parsed;
pub mod server_info;
pub mod session;

pub use command::{CommandTag, PendingCommand, RequestId};
pub use common::ErrorLocation;
pub use error::model_error::ModelError;
pub use parsed::{AppDescriptor, AppProcess, ParsedResult, ProcessEntry};
pub use server_info::BridgeServerInfo;
pub use server_info::builder::BridgeServerInfoBuilder;
pub use session::SessionState;

#[cfg(test)]
mod tests;
