//! Coverage for error construction and classification.

use std::time::Duration;

use itest_core::Error;

#[test]
fn test_config_error() {
    let err = Error::config("image must not be empty");
    assert_eq!(err.to_string(), "Configuration error: image must not be empty");
    assert!(!err.is_retryable());
}

#[test]
fn test_timeout_error() {
    let err = Error::timeout("icinga2 api", Duration::from_secs(2));
    assert_eq!(err.to_string(), "Timed out after 2000ms: icinga2 api");
    assert!(err.is_retryable());
}

#[test]
fn test_io_error_from() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "schema.sql");
    let err: Error = io.into();
    assert!(err.to_string().starts_with("I/O error"));
    assert!(err.is_retryable());
}

#[test]
fn test_error_debug_format() {
    let err = Error::missing_env("ICINGA_TESTING_ICINGADB_BINARY");
    let debug = format!("{err:?}");
    assert!(debug.contains("Config"));
}
