//! Tests for `src/logging.rs`.

use secrets_admission::config::LoggingConfig;
use secrets_admission::logging::{self, LoggingGuard};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_creates_configured_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("nested").join("logs");
    assert!(!logs_dir.exists());

    let config = LoggingConfig {
        dir: Some(logs_dir.clone()),
        json: true,
        ..LoggingConfig::default()
    };
    // Only one global subscriber can be installed per process, so the
    // result may be an error; the directory is created either way.
    if let Ok(guard) = logging::init(&config) {
        assert!(guard.writes_file());
    }
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn unusable_logs_dir_is_an_error() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, b"").expect("write file");

    let config = LoggingConfig {
        dir: Some(blocker.join("logs")),
        ..LoggingConfig::default()
    };
    let err = logging::init(&config).err().expect("file in place of directory must fail");
    assert!(format!("{err:#}").contains("failed to create logs directory"));
}

#[test]
fn invalid_level_falls_back() {
    let config = LoggingConfig {
        level: "[[not a filter".to_owned(),
        ..LoggingConfig::default()
    };
    let _filter = logging::filter(&config);
}
