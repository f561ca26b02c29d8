//! Framing of one-off client invocations in the output channel.
//!
//! ```text
//! $ adb -s ABCD1234 shell pm list packages -3
//! package:com.example.app
//! [exit 0]
//! ```
//!
//! A frame is appended in a single write. Its echo line names the argv that
//! produced it and its status line closes it, so a reader can pick one
//! command's response out of a tail shared with markers, shell output and
//! other commands.

pub const ECHO_PREFIX: &str = "$ ";
pub const STATUS_PREFIX: &str = "[exit ";
pub const STATUS_SUFFIX: &str = "]";
const SIGNALLED_STATUS: &str = "signal";

/// Frame `body` as the output of `command_line`. `status` is `None` when the
/// command was ended by a signal.
pub fn frame(command_line: &str, body: &[u8], status: Option<i32>) -> Vec<u8> {
    let mut bytes = format!("{ECHO_PREFIX}{command_line}\n").into_bytes();
    bytes.extend_from_slice(body);
    if !body.is_empty() && !body.ends_with(b"\n") {
        bytes.push(b'\n');
    }

    let status = status.map_or_else(|| SIGNALLED_STATUS.to_string(), |code| code.to_string());
    bytes.extend_from_slice(format!("{STATUS_PREFIX}{status}{STATUS_SUFFIX}\n").as_bytes());
    bytes
}

/// Whether `line` is the echo line of a client invocation with exactly `argv`.
///
/// The binary name in front of the arguments is not compared.
pub fn is_echo_of(line: &str, argv: &[String]) -> bool {
    let Some(command_line) = line.trim_end().strip_prefix(ECHO_PREFIX) else {
        return false;
    };
    let args = argv.join(" ");
    command_line
        .strip_suffix(args.as_str())
        .and_then(|binary| binary.strip_suffix(' '))
        .is_some_and(|binary| !binary.trim().is_empty())
}

pub fn is_status_line(line: &str) -> bool {
    let line = line.trim_end();
    line.starts_with(STATUS_PREFIX) && line.ends_with(STATUS_SUFFIX)
}

/// The frame produced by `argv` within `text`, from its echo line up to (not
/// including) its status line. `None` until the status line has arrived.
///
/// When `argv` ran more than once, the latest frame wins.
pub fn response_for<'a>(text: &'a str, argv: &[String]) -> Option<&'a str> {
    let mut offset = 0;
    let mut start = None;
    let mut latest = None;

    for line in text.split_inclusive('\n') {
        if is_echo_of(line, argv) {
            start = Some(offset);
        } else if let Some(begin) = start
            && line.ends_with('\n')
            && is_status_line(line)
        {
            latest = Some(&text[begin..offset]);
            start = None;
        }
        offset += line.len();
    }

    latest
}
