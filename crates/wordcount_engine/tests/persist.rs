use std::fs;

use tempfile::TempDir;
use wordcount_engine::{ensure_state_dir, read_state_file, reset_state_dir, write_state_file};

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state").join("nested");
    assert!(!dir.exists());
    ensure_state_dir(&dir).unwrap();
    assert!(dir.is_dir());
}

#[test]
fn file_in_place_of_dir_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("state");
    fs::write(&file, "x").unwrap();
    assert!(ensure_state_dir(&file).is_err());
    assert!(write_state_file(&file, "counts.ron", "data").is_err());
}

#[test]
fn reset_removes_files_and_directories() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state");
    write_state_file(&dir, "counts.ron", "old").unwrap();
    fs::create_dir_all(dir.join("rocksdb").join("0_0")).unwrap();

    assert_eq!(reset_state_dir(&dir).unwrap(), 2);
    assert!(dir.is_dir());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    assert_eq!(reset_state_dir(&dir).unwrap(), 0);
}

#[test]
fn write_replaces_and_read_round_trips() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    assert_eq!(read_state_file(&dir, "counts.ron").unwrap(), None);

    let first = write_state_file(&dir, "counts.ron", "one").unwrap();
    let second = write_state_file(&dir, "counts.ron", "two").unwrap();
    assert_eq!(first, second);
    assert_eq!(read_state_file(&dir, "counts.ron").unwrap().as_deref(), Some("two"));
    // No temp files left behind.
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
}
