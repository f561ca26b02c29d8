use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

/// Lifecycle of the single bridge session.
///
/// `Uninitialized -> Ready -> Dead -> Starting -> Ready`, looping for as long
/// as restarts succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Starting,
    Ready,
    Dead,
}

impl SessionState {
    /// Only a ready session accepts commands.
    pub fn accepts_commands(&self) -> bool {
        matches!(self, SessionState::Ready)
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Starting => "starting",
            SessionState::Ready => "ready",
            SessionState::Dead => "dead",
        };
        write!(f, "{name}")
    }
}
