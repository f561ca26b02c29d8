use crate::logger::{LOG_FILE_NAME, initialize, level_for};

use log::LevelFilter;
use serial_test::serial;
use tempfile::TempDir;

/// **VALUE**: Verifies verbose mode always logs at trace.
///
/// **WHY THIS MATTERS**: `-v` is how users capture a full trace of correlator decisions.
///
/// **BUG THIS CATCHES**: Would catch `-v` being ignored.
#[test]
fn given_verbose_when_level_chosen_then_trace() {
    // GIVEN/WHEN/THEN
    assert_eq!(level_for(true), LevelFilter::Trace);
    assert!(level_for(false) < LevelFilter::Trace);
}

/// **VALUE**: Verifies an unusable log directory is reported.
///
/// **WHY THIS MATTERS**: Silently running without a log file loses the diagnostics users send
/// with bug reports.
///
/// **BUG THIS CATCHES**: Would catch the error being swallowed once the logger is installed.
#[test]
#[serial]
fn given_missing_log_dir_when_initialized_then_error() {
    // GIVEN: A directory that does not exist
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let missing = temp_dir.path().join("does").join("not").join("exist");

    // WHEN
    let result = initialize(&missing, false);

    // THEN
    assert!(result.is_err(), "Missing directory should fail");
}

/// **VALUE**: Verifies initialization is idempotent.
///
/// **WHY THIS MATTERS**: Tests and embedding code may both initialize logging.
///
/// **BUG THIS CATCHES**: Would catch a second `set_logger` call surfacing as an error.
#[test]
#[serial]
fn given_logger_initialized_when_initialized_again_then_ok() {
    // GIVEN: A writable directory
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    // WHEN: Initializing twice
    let first = initialize(temp_dir.path(), false);
    let second = initialize(temp_dir.path(), true);

    // THEN
    assert!(first.is_ok(), "First initialize should succeed: {first:?}");
    assert!(second.is_ok(), "Second initialize should succeed: {second:?}");
    assert!(temp_dir.path().join(LOG_FILE_NAME).exists());
}
