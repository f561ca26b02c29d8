use crate::driver::process::{
    build_client_command, build_shell_command, get_socket_regex, parse_announced_port,
};

use std::ffi::OsStr;

/// **VALUE**: Verifies the announced port is read out of a real server banner.
///
/// **WHY THIS MATTERS**: The driver compares the announced port with the configured one and
/// warns when a different server answered. A wrong parse makes that warning noise or silence.
///
/// **BUG THIS CATCHES**: Would catch a pattern that requires the socket at line start or that
/// captures the `tcp:` prefix along with the digits.
#[test]
fn given_daemon_banner_when_parsing_port_then_returns_announced_port() {
    // GIVEN: The banner printed when the server starts fresh
    let banner = "* daemon not running; starting now at tcp:5037\n* daemon started successfully\n";

    // WHEN: Parsing the announced port
    let port = parse_announced_port(banner);

    // THEN: Should be 5037
    assert_eq!(port, Some(5037));
}

/// **VALUE**: Verifies banners without a socket, or with an out-of-range port, yield None.
///
/// **WHY THIS MATTERS**: An already-running server prints nothing, which is not an error.
///
/// **BUG THIS CATCHES**: Would catch a u16 overflow being wrapped instead of rejected.
#[test]
fn given_banner_without_valid_port_when_parsing_then_returns_none() {
    // GIVEN: An empty banner and one whose port overflows u16
    let empty = "";
    let overflow = "starting now at tcp:99999";

    // WHEN/THEN: Neither yields a port
    assert_eq!(parse_announced_port(empty), None);
    assert_eq!(parse_announced_port(overflow), None);
    assert!(get_socket_regex().is_match(overflow), "Pattern itself still matches digits");
}

/// **VALUE**: Verifies one-off client commands carry the port flag ahead of the caller's args.
///
/// **BUG THIS CATCHES**: Would catch args placed before `-P`, which the client binary would
/// treat as the command and ignore the port.
#[test]
fn given_args_when_building_client_command_then_port_flag_comes_first() {
    // GIVEN: A devices request against port 5038
    let args = vec![String::from("devices")];

    // WHEN: Building the client command
    let cmd = build_client_command("adb", 5038, &args);

    // THEN: Program and argument order should match
    let std_cmd = cmd.as_std();
    assert_eq!(std_cmd.get_program(), OsStr::new("adb"));
    let built: Vec<String> = std_cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(built, vec!["-P", "5038", "devices"]);
}

#[test]
fn given_port_when_building_shell_command_then_runs_shell_on_port() {
    // GIVEN/WHEN: The interactive shell command for port 5037
    let cmd = build_shell_command("adb", 5037);

    // THEN: Should be `adb -P 5037 shell`
    let built: Vec<String> = cmd
        .as_std()
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(built, vec!["-P", "5037", "shell"]);
}
