use crate::driver::transcript::{frame, is_echo_of, response_for};

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn framed(command_line: &str, body: &str, status: Option<i32>) -> String {
    String::from_utf8(frame(command_line, body.as_bytes(), status)).unwrap()
}

/// **VALUE**: Verifies a frame is echo line, body, status line, each newline-terminated.
///
/// **WHY THIS MATTERS**: Readers find the end of a response by its status line. A body without a
/// trailing newline would glue the status onto the last row and the response would never close.
///
/// **BUG THIS CATCHES**: Would catch the missing-newline case or a signalled exit being dropped.
#[test]
fn given_client_output_when_framed_then_echo_body_and_status_lines() {
    // GIVEN/WHEN: Output with and without a trailing newline
    let with_newline = framed("adb devices", "List of devices attached\n", Some(0));
    let without_newline = framed("adb shell am force-stop x", "Success", Some(1));
    let signalled = framed("adb shell ps", "", None);

    // THEN
    assert_eq!(
        with_newline,
        "$ adb devices\nList of devices attached\n[exit 0]\n"
    );
    assert_eq!(
        without_newline,
        "$ adb shell am force-stop x\nSuccess\n[exit 1]\n"
    );
    assert_eq!(signalled, "$ adb shell ps\n[exit signal]\n");
}

/// **VALUE**: Verifies an echo line matches only the exact argv it was written for.
///
/// **WHY THIS MATTERS**: Process listings for two devices differ only in the serial. Matching a
/// prefix would hand one device's processes to a request for the other.
///
/// **BUG THIS CATCHES**: Would catch substring or prefix matching of the argv.
#[test]
fn given_echo_lines_when_matching_argv_then_exact_arguments_required() {
    // GIVEN
    let ps = argv(&["-s", "ABCD", "shell", "ps"]);

    // WHEN/THEN
    assert!(is_echo_of("$ adb -s ABCD shell ps\n", &ps));
    assert!(is_echo_of("$ /opt/sdk/adb -s ABCD shell ps", &ps));
    assert!(!is_echo_of("$ adb -s XABCD shell ps", &ps));
    assert!(!is_echo_of("$ -s ABCD shell ps", &ps), "Binary name is required");
    assert!(!is_echo_of("adb -s ABCD shell ps", &ps), "Echo prefix is required");
    assert!(!is_echo_of("$ adb -s ABCD shell ps -A", &ps));
}

/// **VALUE**: Verifies the response is picked out of a tail shared with unrelated output.
///
/// **WHY THIS MATTERS**: Session markers, typed input echoes and interactive shell output land in
/// the same log. Only the frame of the pending argv may be parsed as its result.
///
/// **BUG THIS CATCHES**: Would catch any complete-looking text being taken as the response.
#[test]
fn given_tail_with_foreign_output_when_finding_response_then_only_matching_frame() {
    // GIVEN: A tail with a marker, another command's frame, shell noise and the wanted frame
    let devices = argv(&["devices"]);
    let tail = format!(
        "* session started\n{}shell@device:/ $ ls\n{}",
        framed("adb -s ABCD shell ps", "com.example 12\n", Some(0)),
        framed("adb devices", "List of devices attached\nABCD\tdevice\n", Some(0)),
    );

    // WHEN
    let response = response_for(&tail, &devices);

    // THEN: Echo line plus body, no status line
    assert_eq!(
        response,
        Some("$ adb devices\nList of devices attached\nABCD\tdevice\n")
    );
}

/// **VALUE**: Verifies there is no response until the frame for the argv exists and is closed.
///
/// **WHY THIS MATTERS**: A request answered by a marker or an echo would complete with an empty
/// or nonsense listing and the real response would be thrown away.
///
/// **BUG THIS CATCHES**: Would catch an unterminated or foreign frame completing a request.
#[test]
fn given_no_matching_closed_frame_when_finding_response_then_none() {
    // GIVEN
    let devices = argv(&["devices"]);

    // WHEN/THEN: Markers and echoes alone
    assert_eq!(response_for("* session started\nhello world\n", &devices), None);
    // AND: Another command's frame
    assert_eq!(
        response_for(&framed("adb shell pm list packages", "", Some(0)), &devices),
        None
    );
    // AND: An echo with no status line yet
    assert_eq!(response_for("$ adb devices\nList of devices attached\n", &devices), None);
}
