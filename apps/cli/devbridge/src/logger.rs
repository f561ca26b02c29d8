//! Logging for the devbridge binary.
//!
//! Provides dual output (stderr with colors + file) with thread-safe initialization.
//! Stdout is left to the shell.

use crate::error::DevbridgeError;

use std::io::stderr;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

/// Tracks if logger initialization was already attempted with a usable log file.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "devbridge.log";

const LOGGER_INITIALIZED_MESSAGE_PREFIX: &str = "Logger initialized with level: ";
const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Level for this run: `Trace` when verbose, the build default otherwise.
pub fn level_for(verbose: bool) -> LevelFilter {
    if verbose { LevelFilter::Trace } else { LOG_LEVEL }
}

/// Initialize the logger with dual output (stderr + `{log_dir}/devbridge.log`).
///
/// Safe to call more than once: later calls log a warning and return Ok. A
/// call whose log file cannot be created fails without consuming the
/// one-time initialization.
///
/// # Errors
///
/// Returns an error if the log file cannot be created or the dispatch cannot
/// be installed.
pub fn initialize(log_dir: &Path, verbose: bool) -> Result<(), DevbridgeError> {
    let log_file = fern::log_file(log_dir.join(LOG_FILE_NAME))
        .map_err(|e| DevbridgeError::devbridge(format!("Failed to create log file: {e}")))?;

    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let level = level_for(verbose);
    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_file, level);
        if result.is_ok() {
            info!("{LOGGER_INITIALIZED_MESSAGE_PREFIX}{level:?}");
        }
    });

    result
}

/// Stderr shares the terminal with the shell, so its lines are short and
/// coloured. The file gets the target and source position as well.
#[track_caller]
fn initialize_internal(log_file: std::fs::File, level: LevelFilter) -> Result<(), DevbridgeError> {
    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stderr_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{level}] {message}",
                level = colors.color(record.level()),
            ))
        })
        .chain(stderr());

    let file_dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{date} - {level} - {target}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = record.level(),
                target = record.target(),
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0),
            ))
        })
        .chain(log_file);

    Dispatch::new()
        .level(level)
        .chain(stderr_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| DevbridgeError::devbridge(format!("Failed to install logger: {e}")))
}
