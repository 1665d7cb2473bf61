// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_adapters::{AgentAdapter, FakeAgent};
use ads_core::FakeClock;
use std::sync::atomic::{AtomicUsize, Ordering};

fn manager(dir: &Path, clock: FakeClock) -> (SessionManager<FakeClock>, Arc<AtomicUsize>) {
    let store = Arc::new(TaskStore::open(dir).unwrap());
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let factory: Arc<OrchestratorFactory> = Arc::new(move |_cwd, _resume| {
        counter.fetch_add(1, Ordering::SeqCst);
        let fake: Arc<dyn AgentAdapter> = Arc::new(FakeAgent::new("fake"));
        Arc::new(Orchestrator::new(vec![fake]))
    });
    (SessionManager::new(factory, store, clock).with_ttl(Duration::from_secs(60)), built)
}

#[tokio::test]
async fn orchestrator_is_built_lazily_and_reused() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let (manager, built) = manager(dir.path(), clock);

    let a = manager.get_or_create(1, Path::new("/tmp/ws"), None);
    let b = manager.get_or_create(1, Path::new("/tmp/ws"), None);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(built.load(Ordering::SeqCst), 1);

    manager.get_or_create(2, Path::new("/tmp/other"), None);
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn idle_sessions_are_collected_after_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let (manager, _) = manager(dir.path(), clock.clone());

    manager.get_or_create(1, Path::new("/tmp/ws"), None);
    manager.get_or_create(2, Path::new("/tmp/ws"), None);

    clock.advance(Duration::from_secs(30));
    manager.touch(1);
    clock.advance(Duration::from_secs(40));

    // User 2 has been idle 70s (> 60s TTL); user 1 only 40s.
    assert_eq!(manager.collect_idle(), 1);
    let remaining: Vec<i64> = manager.snapshots().into_iter().map(|s| s.user_id).collect();
    assert_eq!(remaining, vec![1]);
}

#[tokio::test]
async fn history_injection_flag_is_consumed_once() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _) = manager(dir.path(), FakeClock::new());
    manager.get_or_create(1, Path::new("/tmp/ws"), None);

    assert!(!manager.take_needs_history_injection(1));
    manager.set_needs_history_injection(1, true);
    assert!(manager.take_needs_history_injection(1));
    assert!(!manager.take_needs_history_injection(1));
}

#[tokio::test]
async fn set_cwd_updates_record_and_adapters() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _) = manager(dir.path(), FakeClock::new());
    manager.get_or_create(1, Path::new("/tmp/ws"), None);

    manager.set_cwd(1, Path::new("/tmp/elsewhere"));
    assert_eq!(manager.cwd(1), Some(PathBuf::from("/tmp/elsewhere")));
}

#[tokio::test]
async fn thread_storage_is_idempotent_and_persistent() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _) = manager(dir.path(), FakeClock::new());

    manager.save_thread(1, "codex", "th-1").unwrap();
    manager.save_thread(1, "codex", "th-1").unwrap();
    assert_eq!(manager.saved_thread(1, "codex").as_deref(), Some("th-1"));

    manager.stash_resume_thread(1, "codex", "th-0").unwrap();
    assert_eq!(manager.resume_thread(1, "codex").as_deref(), Some("th-0"));

    manager.clear_thread(1, "codex").unwrap();
    assert!(manager.saved_thread(1, "codex").is_none());
}
