use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

// The global subscriber can be installed only once per test binary, so all
// assertions about it live in a single test.
#[test]
#[serial]
fn writes_log_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tea_timer.log");

    tea_timer::logging::init(true, Some(path.clone()));
    tracing::info!("countdown started");
    tracing::debug!("override engaged");

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("countdown started"));
    assert!(contents.contains("override engaged"));
    assert!(!contents.contains("\x1b["), "file output must not carry colour codes");
}
