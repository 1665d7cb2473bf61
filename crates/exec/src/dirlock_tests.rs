// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn owner() -> DirLockOwner {
    DirLockOwner::current("proj1", "run1")
}

#[tokio::test]
async fn acquire_creates_dir_and_owner_file() {
    let dir = tempfile::tempdir().unwrap();
    let lock = DirLock::new(dir.path().join("repo.lock"));

    let guard = lock.acquire(owner(), Duration::from_secs(1)).await.unwrap();
    assert!(lock.path().exists());
    let bytes = std::fs::read(lock.path().join("owner.json")).unwrap();
    let parsed: DirLockOwner = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed.pid, std::process::id());
    assert_eq!(parsed.project_id, "proj1");
    drop(guard);
    assert!(!lock.path().exists());
}

#[tokio::test]
async fn second_acquire_times_out_while_held() {
    let dir = tempfile::tempdir().unwrap();
    let lock = DirLock::new(dir.path().join("repo.lock"));

    let _guard = lock.acquire(owner(), Duration::from_secs(1)).await.unwrap();
    let err = lock.acquire(owner(), Duration::from_millis(150)).await.unwrap_err();
    assert!(matches!(err, ExecError::LockTimeout(_)));
}

#[tokio::test]
async fn lock_held_by_dead_pid_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let lock = DirLock::new(dir.path().join("repo.lock"));

    // Fabricate a lock owned by a pid that cannot be alive.
    std::fs::create_dir_all(lock.path()).unwrap();
    let dead = DirLockOwner { pid: 999_999_999, ..owner() };
    std::fs::write(lock.path().join("owner.json"), serde_json::to_vec(&dead).unwrap()).unwrap();

    let guard = lock.acquire(owner(), Duration::from_secs(2)).await.unwrap();
    drop(guard);
}

#[tokio::test]
async fn release_is_idempotent_with_explicit_release() {
    let dir = tempfile::tempdir().unwrap();
    let lock = DirLock::new(dir.path().join("repo.lock"));
    let guard = lock.acquire(owner(), Duration::from_secs(1)).await.unwrap();
    guard.release();
    assert!(!lock.path().exists());

    // Reacquire works immediately after release.
    let guard = lock.acquire(owner(), Duration::from_secs(1)).await.unwrap();
    drop(guard);
}

#[tokio::test]
async fn try_acquire_returns_none_when_held() {
    let dir = tempfile::tempdir().unwrap();
    let lock = DirLock::new(dir.path().join("repo.lock"));
    let _guard = lock.try_acquire(&owner()).unwrap().unwrap();
    assert!(lock.try_acquire(&owner()).unwrap().is_none());
}
