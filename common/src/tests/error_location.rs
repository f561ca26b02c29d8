use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures file, line, and column.
///
/// **WHY THIS MATTERS**: Every error in the session engine carries an ErrorLocation.
/// If capture breaks, a failed server start or certificate issuance loses the only
/// pointer to where it happened.
///
/// **BUG THIS CATCHES**: Would catch if `Location::caller()` stops being propagated
/// or line/column capture breaks.
#[test]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN/WHEN: Creating ErrorLocation from caller
    let location = ErrorLocation::from(Location::caller());

    // THEN: Should capture file, line, and column
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path"
    );
    assert_eq!(location.line, 15, "Should capture correct line number");
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies the `[file:line:column]` Display format.
///
/// **WHY THIS MATTERS**: Error messages are written to the log file and shown in the
/// shell. A changed format makes them unreadable.
///
/// **BUG THIS CATCHES**: Would catch if Display drops the brackets or a component.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: An ErrorLocation
    let location = ErrorLocation::from(Location::caller());

    // WHEN: Formatting as string
    let formatted = format!("{}", location);

    // THEN: Should produce "[file:line:column]"
    assert!(formatted.starts_with('['), "Should start with '['");
    assert!(formatted.ends_with(']'), "Should end with ']'");
    assert!(formatted.contains("error_location.rs"));
    assert!(formatted.contains(&location.line.to_string()));
    assert_eq!(formatted.matches(':').count(), 2, "Should have exactly 2 colons");
}

/// **VALUE**: Verifies that `#[track_caller]` propagation gives each call site its own line.
///
/// **BUG THIS CATCHES**: Would catch all errors reporting the constructor's location
/// instead of the real error site.
#[test]
fn given_multiple_call_sites_when_capturing_location_then_each_has_unique_line() {
    // GIVEN: A helper that captures location
    #[track_caller]
    fn capture_location() -> ErrorLocation {
        ErrorLocation::from(Location::caller())
    }

    // WHEN: Capturing from two consecutive lines
    let loc1 = capture_location();
    let loc2 = capture_location();

    // THEN: Same file, sequential lines
    assert_eq!(loc1.file, loc2.file);
    assert_eq!(loc1.line + 1, loc2.line, "Lines should be sequential");
}
