// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::FakeClock;
use ads_storage::CreateTask;
use parking_lot::Mutex;
use yare::parameterized;

/// Sender that can be scripted to fail, recording every delivery.
struct ScriptedSender {
    fail_next: Mutex<u32>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedSender {
    fn new() -> Self {
        Self { fail_next: Mutex::new(0), sent: Mutex::new(Vec::new()) }
    }

    fn fail_times(&self, n: u32) {
        *self.fail_next.lock() = n;
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotifySender for ScriptedSender {
    async fn send(&self, _row: &NotificationRow, text: &str) -> Result<(), String> {
        let mut fail = self.fail_next.lock();
        if *fail > 0 {
            *fail -= 1;
            return Err("network down".to_string());
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }
}

struct Fixture {
    notifier: TerminalNotifier<FakeClock>,
    sender: Arc<ScriptedSender>,
    store: Arc<TaskStore>,
    clock: FakeClock,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TaskStore::open(dir.path()).unwrap());
    let sender = Arc::new(ScriptedSender::new());
    let clock = FakeClock::new();
    let notifier = TerminalNotifier::new(
        Arc::clone(&store),
        Arc::clone(&sender) as Arc<dyn NotifySender>,
        clock.clone(),
    );
    Fixture { notifier, sender, store, clock, _dir: dir }
}

fn terminal_task(store: &TaskStore) -> ads_core::Task {
    let task = store
        .create_task(CreateTask { prompt: "notify me".into(), ..CreateTask::default() }, 1, None)
        .unwrap();
    store.start_task(&task.id, 2).unwrap();
    store.set_task_running(&task.id, None).unwrap();
    store.complete_task(&task.id, 3, "done".into(), None).unwrap();
    store.get_task(&task.id).unwrap()
}

#[tokio::test]
async fn terminal_task_is_notified_once() {
    let f = fixture();
    let task = terminal_task(&f.store);
    f.notifier.record_terminal(&task, Path::new("/tmp/proj")).unwrap();

    assert_eq!(f.notifier.run_pending().await, 1);
    // Second pass is a no-op: notified_at is set.
    assert_eq!(f.notifier.run_pending().await, 0);
    assert_eq!(f.sender.sent().len(), 1);
    assert!(f.sender.sent()[0].contains("proj"));
    assert!(f.sender.sent()[0].contains("completed"));
}

#[tokio::test]
async fn failed_send_backs_off_then_succeeds() {
    let f = fixture();
    let task = terminal_task(&f.store);
    f.notifier.record_terminal(&task, Path::new("/tmp/proj")).unwrap();
    f.sender.fail_times(1);

    assert_eq!(f.notifier.run_pending().await, 0);
    let row = f.store.get_notification(&task.id).unwrap();
    assert_eq!(row.retry_count, 1);
    assert!(row.next_retry_at_ms.is_some());
    assert!(row.notified_at_ms.is_none());

    // Not yet due.
    assert_eq!(f.notifier.run_pending().await, 0);
    assert!(f.sender.sent().is_empty());

    // After the backoff window the send succeeds exactly once.
    f.clock.advance(std::time::Duration::from_millis(backoff_ms(0) + 1));
    assert_eq!(f.notifier.run_pending().await, 1);
    assert!(f.store.get_notification(&task.id).unwrap().notified_at_ms.is_some());
}

#[test]
fn backoff_grows_and_caps() {
    assert_eq!(backoff_ms(0), 30_000);
    assert_eq!(backoff_ms(1), 60_000);
    assert!(backoff_ms(3) > backoff_ms(2));
    assert_eq!(backoff_ms(30), 60 * 60 * 1000);
}

#[parameterized(
    shanghai = { "Asia/Shanghai", "1970-01-01 08:00:00" },
    utc = { "UTC", "1970-01-01 00:00:00" },
    tokyo = { "Asia/Tokyo", "1970-01-01 09:00:00" },
    invalid_falls_back = { "Not/AZone", "1970-01-01 08:00:00" },
)]
fn time_formatting(zone: &str, expected: &str) {
    assert_eq!(format_in_zone(0, zone), expected);
}
