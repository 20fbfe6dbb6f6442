use chrono::{TimeZone, Utc};
use std::fs;
use tempfile::TempDir;

use ddmon::core::disk_monitor::{FileThrottleStore, ThrottleState, ThrottleStore};

fn sample_state() -> ThrottleState {
    ThrottleState {
        last_percentage: 91,
        last_notified_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
    }
}

#[test]
fn test_missing_file_loads_default() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileThrottleStore::new(temp_dir.path().join("throttle.json"));

    assert_eq!(store.load(), ThrottleState::default());
}

#[test]
fn test_save_then_load() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileThrottleStore::new(temp_dir.path().join("state").join("throttle.json"));

    store.save(&sample_state()).unwrap();
    assert!(store.path().exists());

    // A fresh store over the same file sees the saved state
    let reopened = FileThrottleStore::new(store.path());
    assert_eq!(reopened.load(), sample_state());
}

#[test]
fn test_corrupt_file_loads_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("throttle.json");
    fs::write(&path, "last_percentage=91").unwrap();

    let store = FileThrottleStore::new(&path);
    assert_eq!(store.load(), ThrottleState::default());
}

#[test]
fn test_reset_removes_state() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileThrottleStore::new(temp_dir.path().join("throttle.json"));

    store.save(&sample_state()).unwrap();
    store.reset().unwrap();

    assert!(!store.path().exists());
    assert_eq!(store.load(), ThrottleState::default());

    // Resetting twice is fine
    store.reset().unwrap();
}
