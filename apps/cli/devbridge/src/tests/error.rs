use crate::error::DevbridgeError;

use session_core::error::CoreError;
use session_core::error::correlator::CorrelatorError;

use common::ErrorLocation;

use std::error::Error;
use std::panic::Location;

/// **VALUE**: Verifies error display carries the message and where it was raised.
///
/// **WHY THIS MATTERS**: Errors are printed to the user and logged; without a location a
/// failure in a long session is hard to trace.
///
/// **BUG THIS CATCHES**: Would catch `#[track_caller]` being dropped from the constructor.
#[test]
fn given_devbridge_error_when_displayed_then_message_and_location() {
    // GIVEN/WHEN
    let error = DevbridgeError::devbridge("stdin went away");
    let text = error.to_string();

    // THEN
    assert!(text.contains("stdin went away"));
    assert!(text.contains(file!()), "Location should point at this test: {text}");
}

/// **VALUE**: Verifies wrapped engine errors keep their source.
///
/// **WHY THIS MATTERS**: The log needs the full chain to tell a rejected command from a
/// broken driver.
///
/// **BUG THIS CATCHES**: Would catch the `#[source]` attribute going missing.
#[test]
fn given_core_error_when_wrapped_then_context_and_source_kept() {
    // GIVEN: An engine error
    let inner = CorrelatorError::NoDeviceSelected {
        message: String::from("no device"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Wrapping it
    let error = DevbridgeError::core("Command rejected", inner);

    // THEN: Message leads with context and includes the inner text
    assert!(error.to_string().contains("Command rejected: "));
    assert!(error.to_string().contains("no device"));

    // AND: The source is the engine error
    let source = error.source().expect("Source should be set");
    assert!(source.downcast_ref::<CoreError>().is_some());
}
