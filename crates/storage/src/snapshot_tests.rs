// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::Task;
use tempfile::tempdir;

#[test]
fn round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.snap");

    let mut state = MaterializedTasks::default();
    let task = Task::builder().title("snapshot me").build();
    let id = task.id.as_str().to_string();
    state.tasks.insert(id.clone(), task);

    write_snapshot(&path, &state, 42).unwrap();
    let loaded = load_snapshot(&path).unwrap();
    assert_eq!(loaded.last_seq, 42);
    assert_eq!(loaded.state.tasks.get(&id).unwrap().title, "snapshot me");
}

#[test]
fn missing_snapshot_is_none() {
    let dir = tempdir().unwrap();
    assert!(load_snapshot(&dir.path().join("nope.snap")).is_none());
}

#[test]
fn corrupt_snapshot_is_discarded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.snap");
    std::fs::write(&path, b"definitely not zstd").unwrap();
    assert!(load_snapshot(&path).is_none());
}
