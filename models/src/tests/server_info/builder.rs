use crate::{BridgeServerInfoBuilder, ModelError};

fn complete_builder() -> BridgeServerInfoBuilder {
    BridgeServerInfoBuilder::default()
        .with_pid(4242)
        .with_port(5037)
        .with_name("adb")
        .with_command("adb -L tcp:5037 fork-server server")
        .with_owned(false)
}

fn validation_message(err: ModelError) -> String {
    match err {
        ModelError::InvalidServerInfo { message, .. } => message,
    }
}

/// **VALUE**: Verifies that builder validation rejects zero PIDs.
///
/// **WHY THIS MATTERS**: PID 0 is never a real bridge server. Letting it through would
/// make `stop_pid` target the wrong thing during teardown.
///
/// **BUG THIS CATCHES**: Would catch the PID zero check being deleted during refactoring.
#[test]
fn given_zero_pid_when_building_server_info_then_returns_validation_error() {
    // GIVEN: Builder with PID set to zero
    let builder = complete_builder().with_pid(0);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    assert!(validation_message(result.unwrap_err()).contains("pid=0"));
}

/// **VALUE**: Verifies that builder validation rejects a missing PID.
///
/// **BUG THIS CATCHES**: Would catch the builder allowing incomplete construction.
#[test]
fn given_missing_pid_when_building_then_returns_validation_error() {
    // GIVEN: Builder without PID
    let builder = BridgeServerInfoBuilder::default()
        .with_port(5037)
        .with_name("adb")
        .with_command("adb server");

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    assert_eq!(validation_message(result.unwrap_err()), "Missing PID");
}

/// **VALUE**: Verifies that the socket spec defaults to `tcp:<port>`.
///
/// **WHY THIS MATTERS**: Discovery only knows the port; the socket string is what the
/// bridge prints and what the shell shows to the user.
///
/// **BUG THIS CATCHES**: Would catch the default being dropped or formatted differently.
#[test]
fn given_no_socket_when_building_then_defaults_to_tcp_port() {
    // GIVEN: A complete builder without socket
    let builder = complete_builder();

    // WHEN: Building
    let info = builder.build().unwrap();

    // THEN: Socket is derived from the port
    assert_eq!(info.socket, "tcp:5037");
    assert_eq!(info.port, 5037);
    assert!(!info.owned);
}

/// **VALUE**: Verifies that non-tcp socket specs are rejected.
///
/// **BUG THIS CATCHES**: Would catch the scheme check being removed.
#[test]
fn given_unix_socket_spec_when_building_then_returns_validation_error() {
    // GIVEN: A socket spec the supervisor cannot talk to
    let builder = complete_builder().with_socket("localabstract:adb");

    // WHEN: Building
    let result = builder.build();

    // THEN: Validation error names the socket
    assert!(validation_message(result.unwrap_err()).contains("localabstract:adb"));
}

/// **VALUE**: Verifies that empty names are rejected.
///
/// **BUG THIS CATCHES**: Would catch the empty-string check being dropped.
#[test]
fn given_empty_name_when_building_then_returns_validation_error() {
    // GIVEN: Builder with an empty name
    let builder = complete_builder().with_name("");

    // WHEN/THEN: Building fails
    assert_eq!(
        validation_message(builder.build().unwrap_err()),
        "Missing server name"
    );
}

/// **VALUE**: Verifies a socket spec must agree with the port.
///
/// **WHY THIS MATTERS**: The supervisor reports the socket to the user. A socket naming a
/// different port than the one discovery probed would send them to the wrong server.
///
/// **BUG THIS CATCHES**: Would catch only the scheme being checked.
#[test]
fn given_socket_for_other_port_when_building_then_returns_validation_error() {
    // GIVEN: A tcp socket on a different port
    let builder = complete_builder().with_socket("tcp:5038");

    // WHEN: Building
    let result = builder.build();

    // THEN: Rejected
    assert!(validation_message(result.unwrap_err()).contains("tcp:5038"));

    // AND: Ownership defaults to false when not set
    let info = BridgeServerInfoBuilder::default()
        .with_pid(7)
        .with_port(5037)
        .with_name("adb")
        .with_command("adb server")
        .build()
        .unwrap();
    assert!(!info.owned);
}
