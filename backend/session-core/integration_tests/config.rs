use session_core::config::{PairingFlags, RestartPolicy, SessionConfig};
use session_core::error::config::ConfigError;

use tempfile::TempDir;

// ============================================================================
// SessionConfig
// ============================================================================

/// **VALUE**: Verifies first launch works with no config file at all.
///
/// **WHY THIS MATTERS**: Nobody writes a config before the first run. Failing here would make
/// the tool unusable out of the box.
///
/// **BUG THIS CATCHES**: Would catch `load()` treating a missing file as a read error, or
/// defaults drifting from the documented values.
#[test]
fn given_no_config_file_when_loading_then_returns_defaults() {
    // GIVEN: An empty config directory
    let dir = TempDir::new().unwrap();

    // WHEN: Loading
    let config = SessionConfig::load(dir.path()).unwrap();

    // THEN: Documented defaults
    assert_eq!(config.bridge_binary, "adb");
    assert_eq!(config.server_port, 5037);
    assert_eq!(config.tail_bytes, 16 * 1024);
    assert_eq!(config.poll_interval_ms, 500);
    assert_eq!(config.restart, RestartPolicy::default());
    assert!(config.suppressed_packages.iter().any(|p| p == "com.qti.phone"));
}

#[test]
fn given_saved_config_when_loading_then_changes_survive() {
    // GIVEN: A config with a faster poll and a custom binary, saved to disk
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        bridge_binary: String::from("/opt/platform-tools/adb"),
        poll_interval_ms: 100,
        ..SessionConfig::default()
    };
    config.save(dir.path()).unwrap();

    // WHEN: Loading it back
    let loaded = SessionConfig::load(dir.path()).unwrap();

    // THEN: The changed fields came back, the rest stayed default
    assert_eq!(loaded.bridge_binary, "/opt/platform-tools/adb");
    assert_eq!(loaded.poll_interval_ms, 100);
    assert_eq!(loaded.server_port, 5037);
    assert!(!dir.path().join("config.json.tmp").exists(), "Temp file should be renamed away");
}

#[test]
fn given_partial_config_file_when_loading_then_missing_fields_use_defaults() {
    // GIVEN: A config file naming only the port
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json"), r#"{ "server_port": 5038 }"#).unwrap();

    // WHEN: Loading
    let config = SessionConfig::load(dir.path()).unwrap();

    // THEN: Port from the file, everything else default
    assert_eq!(config.server_port, 5038);
    assert_eq!(config.tail_bytes, 16 * 1024);
}

/// **VALUE**: Verifies a corrupted config file is an error, not a silent reset.
///
/// **WHY THIS MATTERS**: Falling back to defaults on a typo would quietly point the tool at the
/// wrong binary or port, and the next save would overwrite the user's file.
///
/// **BUG THIS CATCHES**: Would catch `load()` swallowing JSON errors.
#[test]
fn given_corrupted_config_file_when_loading_then_returns_parse_error() {
    // GIVEN: A config file that is not JSON
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();

    // WHEN: Loading
    let result = SessionConfig::load(dir.path());

    // THEN: Reported as corrupted
    assert!(matches!(result, Err(ConfigError::Corrupted { .. })));
}

#[test]
fn given_invalid_values_when_validating_then_each_is_rejected() {
    // GIVEN: Configs each breaking one rule
    let zero_tail = SessionConfig {
        tail_bytes: 0,
        ..SessionConfig::default()
    };
    let zero_poll = SessionConfig {
        poll_interval_ms: 0,
        ..SessionConfig::default()
    };
    let inverted_backoff = SessionConfig {
        restart: RestartPolicy {
            initial_interval_ms: 5_000,
            max_interval_ms: 100,
            max_restarts: 3,
        },
        ..SessionConfig::default()
    };
    let future_version = SessionConfig {
        version: 99,
        ..SessionConfig::default()
    };

    // WHEN/THEN: Every one fails validation
    for config in [zero_tail, zero_poll, inverted_backoff, future_version] {
        assert!(
            matches!(config.validate(), Err(ConfigError::InvalidSetting { .. })),
            "Expected validation failure for {config:?}"
        );
    }
}

// ============================================================================
// PairingFlags
// ============================================================================

/// **VALUE**: Verifies pairing status persists across loads.
///
/// **WHY THIS MATTERS**: Asking the user to pair again on every launch is the bug users notice
/// first.
///
/// **BUG THIS CATCHES**: Would catch setters that change memory without writing through.
#[test]
fn given_fresh_flags_when_marking_paired_then_persisted_for_next_load() {
    // GIVEN: No flags file
    let dir = TempDir::new().unwrap();
    let mut flags = PairingFlags::load(dir.path()).unwrap();
    assert!(flags.needs_to_pair());
    assert!(!flags.is_verified());

    // WHEN: Marking paired and verified
    flags.mark_paired(true).unwrap();
    flags.mark_verified(true).unwrap();

    // THEN: A fresh load sees both
    let reloaded = PairingFlags::load(dir.path()).unwrap();
    assert!(reloaded.is_paired());
    assert!(!reloaded.needs_to_pair());
    assert!(reloaded.is_verified());
}

#[test]
fn given_corrupted_flags_file_when_loading_then_returns_parse_error() {
    // GIVEN: A flags file that is not JSON
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("flags.json"), "paired=true").unwrap();

    // WHEN: Loading
    let result = PairingFlags::load(dir.path());

    // THEN: Reported as corrupted
    assert!(matches!(result, Err(ConfigError::Corrupted { .. })));
}
