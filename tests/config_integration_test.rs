//! Integration tests for configuration loading and validation
//!
//! Tests that modify environment variables hold `ENV_MUTEX`.

use kanon::config::{load_config, Strategy};
use kanon::domain::KanonError;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("KANON_APPLICATION_LOG_LEVEL");
    std::env::remove_var("KANON_DEIDENTIFICATION_MIN_COUNT");
    std::env::remove_var("KANON_DEIDENTIFICATION_STRATEGY");
    std::env::remove_var("KANON_DEIDENTIFICATION_THREADS");
    std::env::remove_var("KANON_AUDIT_ENABLED");
    std::env::remove_var("TEST_KANON_AUDIT_DIR");
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let temp_file = write_config(
        r#"
[application]
log_level = "debug"
dry_run = true

[deidentification]
strategy = "k_anon"
min_count = 12.5
reservoir_capacity = 250
threads = 4
chunk_size = 1024
blocking_prefix_len = 3
min_value_len = 1

[audit]
enabled = true
log_path = "/tmp/kanon/audit.log"
json_format = false

[logging]
local_enabled = true
local_path = "/tmp/kanon/logs"
local_rotation = "hourly"
"#,
    );

    let config = load_config(temp_file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert!(config.application.dry_run);
    assert_eq!(config.deidentification.strategy, Strategy::KAnon);
    assert_eq!(config.deidentification.min_count, 12.5);
    assert_eq!(config.deidentification.reservoir_capacity, 250);
    assert_eq!(config.deidentification.threads, 4);
    assert_eq!(config.deidentification.chunk_size, 1024);
    assert_eq!(config.deidentification.blocking_prefix_len, 3);
    assert_eq!(config.deidentification.min_value_len, 1);
    assert_eq!(config.audit.log_path, "/tmp/kanon/audit.log");
    assert!(!config.audit.json_format);
    assert!(config.logging.local_enabled);
    assert_eq!(config.logging.local_rotation, "hourly");
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let temp_file = write_config("[deidentification]\nstrategy = \"digit_remap\"\n");
    let config = load_config(temp_file.path()).unwrap();

    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.deidentification.strategy, Strategy::DigitRemap);
    assert_eq!(config.deidentification.min_count, 30.0);
    assert_eq!(config.deidentification.reservoir_capacity, 1000);
    assert_eq!(config.deidentification.chunk_size, 4096);
    assert!(config.audit.enabled);
    assert!(!config.logging.local_enabled);
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_KANON_AUDIT_DIR", "/srv/audit");

    let temp_file = write_config("[audit]\nlog_path = \"${TEST_KANON_AUDIT_DIR}/deident.log\"\n");
    let config = load_config(temp_file.path()).unwrap();
    assert_eq!(config.audit.log_path, "/srv/audit/deident.log");

    cleanup_env_vars();
    let err = load_config(temp_file.path()).unwrap_err();
    assert!(matches!(err, KanonError::Configuration(_)));
    assert!(err.to_string().contains("TEST_KANON_AUDIT_DIR"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let temp_file = write_config("[deidentification]\nmin_count = 30.0\n");

    std::env::set_var("KANON_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("KANON_DEIDENTIFICATION_MIN_COUNT", "7.5");
    std::env::set_var("KANON_DEIDENTIFICATION_STRATEGY", "digit_remap");
    std::env::set_var("KANON_AUDIT_ENABLED", "false");

    let config = load_config(temp_file.path());
    cleanup_env_vars();
    let config = config.unwrap();

    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.deidentification.min_count, 7.5);
    assert_eq!(config.deidentification.strategy, Strategy::DigitRemap);
    assert!(!config.audit.enabled);
}

#[test]
fn test_unparseable_override_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let temp_file = write_config("");
    std::env::set_var("KANON_DEIDENTIFICATION_THREADS", "many");
    let result = load_config(temp_file.path());
    cleanup_env_vars();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("KANON_DEIDENTIFICATION_THREADS"));
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    for content in [
        "[application]\nlog_level = \"loud\"\n",
        "[deidentification]\nmin_count = 0.0\n",
        "[deidentification]\nreservoir_capacity = 0\n",
        "[deidentification]\nstrategy = \"nearest\"\n",
        "[logging]\nlocal_rotation = \"weekly\"\n",
    ] {
        let temp_file = write_config(content);
        let result = load_config(temp_file.path());
        assert!(
            matches!(result, Err(KanonError::Configuration(_))),
            "expected configuration error for {content:?}"
        );
    }
}
