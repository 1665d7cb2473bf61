// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::{ClassifiedError, ErrorCode, FakeClock, PlanStep, TaskStatus};
use ads_storage::CreateTask;
use async_trait::async_trait;
use std::collections::VecDeque;

struct FakeRunner {
    results: Mutex<VecDeque<Result<String, ClassifiedError>>>,
    delay: Option<Duration>,
}

impl FakeRunner {
    fn new() -> Self {
        Self { results: Mutex::new(VecDeque::new()), delay: None }
    }

    fn with_delay(delay: Duration) -> Self {
        Self { results: Mutex::new(VecDeque::new()), delay: Some(delay) }
    }

    fn script(&self, result: Result<&str, ClassifiedError>) {
        self.results.lock().push_back(result.map(str::to_string));
    }
}

#[async_trait]
impl TaskRunner for FakeRunner {
    async fn plan(&self, task: &Task) -> Result<Vec<(String, String)>, ClassifiedError> {
        Ok(vec![("Execute task".to_string(), task.prompt.clone())])
    }

    async fn run_step(
        &self,
        _task: &Task,
        _step: &PlanStep,
        cancel: &CancellationToken,
    ) -> Result<StepOutput, ClassifiedError> {
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Err(ClassifiedError::new(ErrorCode::Internal, "aborted").not_retryable());
                }
            }
        }
        let result = self.results.lock().pop_front().unwrap_or(Ok("done".to_string()));
        result.map(|summary| StepOutput { summary, thread_id: None })
    }

    fn agent_id(&self) -> String {
        "fake".to_string()
    }
}

struct Harness {
    queue: Arc<TaskQueue<FakeClock>>,
    store: Arc<TaskStore>,
    runner: Arc<FakeRunner>,
    clock: FakeClock,
    _dir: tempfile::TempDir,
}

fn harness_with(runner: FakeRunner) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TaskStore::open(dir.path()).unwrap());
    let runner = Arc::new(runner);
    let clock = FakeClock::new();
    let queue = Arc::new(TaskQueue::new(
        Arc::clone(&store),
        Arc::clone(&runner) as Arc<dyn TaskRunner>,
        WorkspaceLocks::new(),
        PathBuf::from("/tmp/ws"),
        clock.clone(),
    ));
    Harness { queue, store, runner, clock, _dir: dir }
}

fn harness() -> Harness {
    harness_with(FakeRunner::new())
}

fn create_task(store: &TaskStore, prompt: &str, now: u64) -> Task {
    store
        .create_task(CreateTask { prompt: prompt.into(), ..CreateTask::default() }, now, None)
        .unwrap()
}

fn drain(rx: &mut broadcast::Receiver<QueueEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    names
}

#[tokio::test]
async fn happy_path_emits_causal_event_order() {
    let h = harness();
    let task = create_task(&h.store, "Hello", 100);
    h.clock.set_epoch_ms(200);
    h.queue.start();
    let mut rx = h.queue.subscribe();

    assert!(h.queue.run_next().await);

    let names = drain(&mut rx);
    assert_eq!(
        names,
        vec![
            "task:started",
            "task:planned",
            "task:running",
            "step:started",
            "message",
            "step:completed",
            "task:completed",
        ]
    );

    let done = h.store.get_task(&task.id).unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.result.as_deref(), Some("done"));
    assert!(done.completed_at_ms.unwrap() >= done.started_at_ms.unwrap());
    assert!(done.started_at_ms.unwrap() >= done.created_at_ms);
    assert!(done.prompt_injected_at_ms.is_some());
    assert!(h.queue.active_task_id().is_none());
}

#[tokio::test]
async fn prompt_injection_is_reported_once() {
    let h = harness();
    let failing = ClassifiedError::new(ErrorCode::AgentProtocol, "boom");
    h.runner.script(Err(failing.clone()));
    h.runner.script(Ok("recovered"));

    let task = h
        .store
        .create_task(
            CreateTask { prompt: "retry me".into(), max_retries: 1, ..CreateTask::default() },
            1,
            None,
        )
        .unwrap();
    h.queue.start();
    let mut rx = h.queue.subscribe();

    // First attempt fails and requeues; second succeeds.
    assert!(h.queue.run_next().await);
    assert!(h.queue.run_next().await);

    let mut injected = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let QueueEvent::TaskStarted { prompt_injected, .. } = event {
            injected.push(prompt_injected);
        }
    }
    assert_eq!(injected, vec![true, false]);
    assert_eq!(h.store.get_task(&task.id).unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn failure_exhausting_retries_is_terminal() {
    let h = harness();
    h.runner.script(Err(ClassifiedError::new(ErrorCode::AgentProtocol, "boom")));
    let task = create_task(&h.store, "no retries", 1);
    h.queue.start();
    let mut rx = h.queue.subscribe();

    assert!(h.queue.run_next().await);

    let mut saw_terminal_failure = false;
    while let Ok(event) = rx.try_recv() {
        if let QueueEvent::TaskFailed { terminal, .. } = event {
            saw_terminal_failure = terminal;
        }
    }
    assert!(saw_terminal_failure);
    let failed = h.store.get_task(&task.id).unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("boom"));
}

#[tokio::test]
async fn promotion_pass_runs_before_pick() {
    let h = harness();
    let queued = h
        .store
        .create_task(
            CreateTask { prompt: "queued".into(), ..CreateTask::default() },
            1,
            Some(TaskStatus::Queued),
        )
        .unwrap();
    h.queue.start();
    let mut rx = h.queue.subscribe();

    assert!(h.queue.run_next().await);
    let names = drain(&mut rx);
    assert_eq!(names[0], "task:updated");
    assert_eq!(names[1], "task:started");
    assert_eq!(h.store.get_task(&queued.id).unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn highest_priority_pending_runs_first() {
    let h = harness();
    let low = create_task(&h.store, "low", 1);
    let high = h
        .store
        .create_task(
            CreateTask { prompt: "high".into(), priority: 9, ..CreateTask::default() },
            2,
            None,
        )
        .unwrap();
    h.queue.start();

    assert!(h.queue.run_next().await);
    assert_eq!(h.store.get_task(&high.id).unwrap().status, TaskStatus::Completed);
    assert_eq!(h.store.get_task(&low.id).unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn paused_queue_runs_nothing() {
    let h = harness();
    create_task(&h.store, "waiting", 1);
    assert!(!h.queue.run_next().await);
}

#[tokio::test]
async fn cancel_of_active_task_aborts_and_records_cancelled() {
    let h = harness_with(FakeRunner::with_delay(Duration::from_secs(30)));
    let task = create_task(&h.store, "slow", 1);
    h.queue.start();
    let mut rx = h.queue.subscribe();

    let queue = Arc::clone(&h.queue);
    let run = tokio::spawn(async move { queue.run_next().await });

    // Wait until the task is active, then cancel it.
    for _ in 0..100 {
        if h.queue.active_task_id().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    h.queue.cancel(&task.id).unwrap();
    assert!(run.await.unwrap());

    let names = drain(&mut rx);
    assert!(names.contains(&"task:cancelled"));
    assert_eq!(h.store.get_task(&task.id).unwrap().status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn cancel_of_pending_task_transitions_directly() {
    let h = harness();
    let task = create_task(&h.store, "pending", 1);
    let mut rx = h.queue.subscribe();

    h.queue.cancel(&task.id).unwrap();
    assert_eq!(h.store.get_task(&task.id).unwrap().status, TaskStatus::Cancelled);
    assert!(drain(&mut rx).contains(&"task:cancelled"));

    // Second cancel is a no-op with no event replay.
    h.queue.cancel(&task.id).unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn retry_requeues_failed_task() {
    let h = harness();
    h.runner.script(Err(ClassifiedError::new(ErrorCode::AgentProtocol, "boom")));
    let task = create_task(&h.store, "fails", 1);
    h.queue.start();
    assert!(h.queue.run_next().await);
    assert_eq!(h.store.get_task(&task.id).unwrap().status, TaskStatus::Failed);

    h.clock.set_epoch_ms(5_000);
    let requeued = h.queue.retry(&task.id).unwrap();
    assert_eq!(requeued.status, TaskStatus::Pending);
    assert_eq!(requeued.queue_order, 5_000);

    assert!(h.queue.run_next().await);
    assert_eq!(h.store.get_task(&task.id).unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn retry_of_pending_task_is_rejected() {
    let h = harness();
    let task = create_task(&h.store, "pending", 1);
    assert!(h.queue.retry(&task.id).is_err());
}

#[tokio::test]
async fn single_run_auto_resumes_and_re_pauses() {
    let h = harness();
    let other = create_task(&h.store, "other", 1);
    let target = create_task(&h.store, "target", 2);
    assert!(!h.queue.is_running());

    h.queue.run_single(&target.id).unwrap();
    assert!(h.queue.is_running());
    // Idempotent for the same task.
    h.queue.run_single(&target.id).unwrap();

    assert!(h.queue.run_next().await);
    assert_eq!(h.store.get_task(&target.id).unwrap().status, TaskStatus::Completed);
    assert_eq!(h.store.get_task(&other.id).unwrap().status, TaskStatus::Pending);

    // Queue returned to paused; nothing else starts.
    assert!(!h.queue.is_running());
    assert!(!h.queue.run_next().await);
}
