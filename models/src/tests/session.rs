use crate::{CommandTag, PendingCommand, SessionState};

/// **VALUE**: Verifies that only a ready session accepts commands.
///
/// **WHY THIS MATTERS**: The correlator rejects submissions based on this predicate.
/// If `Dead` or `Starting` accepted commands they would be dispatched into a dead bridge
/// and silently lost.
///
/// **BUG THIS CATCHES**: Would catch a new state being added as accepting by default.
#[test]
fn given_each_state_when_checking_acceptance_then_only_ready_accepts() {
    // GIVEN/WHEN/THEN
    assert!(SessionState::Ready.accepts_commands());
    assert!(!SessionState::Uninitialized.accepts_commands());
    assert!(!SessionState::Starting.accepts_commands());
    assert!(!SessionState::Dead.accepts_commands());
    assert_eq!(SessionState::default(), SessionState::Uninitialized);
}

/// **VALUE**: Verifies that every pending command gets a fresh request id.
///
/// **BUG THIS CATCHES**: Would catch ids colliding, which would let a superseded
/// request be completed with another request's output.
#[test]
fn given_two_pending_commands_when_created_then_ids_differ() {
    // GIVEN/WHEN: Two commands with identical content
    let first = PendingCommand::new(CommandTag::Ps, vec!["shell".into(), "ps".into()]);
    let second = PendingCommand::new(CommandTag::Ps, vec!["shell".into(), "ps".into()]);

    // THEN: Ids are distinct, tags display as their wire names
    assert_ne!(first.id, second.id);
    assert_eq!(first.tag.to_string(), "ps");
    assert_eq!(CommandTag::Devices.as_str(), "devices");
}
