// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project wiring.
//!
//! A project is opened lazily on first use: its task store, scheduler,
//! terminal notifier, purge scheduler and user-session registry. Opened
//! projects live for the rest of the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ads_adapters::{AgentAdapter, ClaudeProfile, CliAgent, CodexProfile, GeminiProfile};
use ads_core::{derive_project_session_id, ProjectId, SystemClock};
use ads_engine::{
    AgentTaskRunner, DesktopNotifySender, Orchestrator, OrchestratorFactory, PurgeScheduler,
    QueueEvent, SessionManager, TaskQueue, TerminalNotifier,
};
use ads_exec::WorkspaceLocks;
use ads_storage::TaskStore;
use ads_wire::{ServerMessage, TaskDto, TaskEventPayload};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broadcast::BroadcastBus;

/// Cadence of the notifier/purge housekeeping tick.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("workspace does not exist: {0}")]
    Missing(PathBuf),

    #[error("workspace is outside the allowed directories: {0}")]
    NotAllowed(PathBuf),

    #[error(transparent)]
    Store(#[from] ads_storage::StoreError),
}

/// Process-wide registry configuration (resolved from env at startup).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub state_dir: PathBuf,
    pub allowed_dirs: Vec<PathBuf>,
    pub queue_enabled: bool,
    pub queue_auto_start: bool,
    pub default_model: Option<String>,
    pub plan_model: Option<String>,
    pub notify_timezone: String,
}

/// One opened workspace.
pub struct Project {
    pub root: PathBuf,
    pub project_id: ProjectId,
    /// Broadcast identity (`proj:<digest>`).
    pub session_id: String,
    pub store: Arc<TaskStore>,
    pub queue: Arc<TaskQueue<SystemClock>>,
    pub notifier: Arc<TerminalNotifier<SystemClock>>,
    pub purge: Arc<PurgeScheduler<SystemClock>>,
    pub sessions: Arc<SessionManager<SystemClock>>,
}

pub struct ProjectRegistry {
    config: RegistryConfig,
    locks: WorkspaceLocks,
    bus: Arc<BroadcastBus>,
    shutdown: CancellationToken,
    projects: Mutex<HashMap<PathBuf, Arc<Project>>>,
}

impl ProjectRegistry {
    pub fn new(
        config: RegistryConfig,
        locks: WorkspaceLocks,
        bus: Arc<BroadcastBus>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { config, locks, bus, shutdown, projects: Mutex::new(HashMap::new()) }
    }

    pub fn locks(&self) -> &WorkspaceLocks {
        &self.locks
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Canonicalize and validate a workspace root against the allow-list.
    pub fn validate_workspace(&self, root: &Path) -> Result<PathBuf, ProjectError> {
        let canonical = ads_core::canonical_workspace_root(root)
            .map_err(|_| ProjectError::Missing(root.to_path_buf()))?;
        if !self.config.allowed_dirs.is_empty()
            && !self.config.allowed_dirs.iter().any(|dir| canonical.starts_with(dir))
        {
            return Err(ProjectError::NotAllowed(canonical));
        }
        Ok(canonical)
    }

    /// Open (or fetch) the project for a workspace root.
    pub fn get_or_open(&self, root: &Path) -> Result<Arc<Project>, ProjectError> {
        let canonical = self.validate_workspace(root)?;
        if let Some(project) = self.projects.lock().get(&canonical) {
            return Ok(Arc::clone(project));
        }

        let project = Arc::new(self.open(&canonical)?);
        let mut projects = self.projects.lock();
        // A racing open may have won; keep the first one.
        let entry =
            projects.entry(canonical).or_insert_with(|| Arc::clone(&project));
        Ok(Arc::clone(entry))
    }

    pub fn opened(&self) -> Vec<Arc<Project>> {
        self.projects.lock().values().cloned().collect()
    }

    fn open(&self, root: &Path) -> Result<Project, ProjectError> {
        let clock = SystemClock;
        let project_id = ProjectId::derive(root);
        let session_id = derive_project_session_id(root);
        let store_dir = self.config.state_dir.join("workspaces").join(project_id.as_str());
        let store = Arc::new(TaskStore::open(&store_dir)?);
        info!(root = %root.display(), project = %project_id, "opening project");

        // Queue runner: one dedicated adapter per project, default codex.
        let queue_agent: Arc<dyn AgentAdapter> =
            Arc::new(CliAgent::with_cwd(CodexProfile::new(), root.to_path_buf()));
        if let Some(model) = &self.config.default_model {
            queue_agent.set_model(Some(model.clone()));
        }
        let runner = Arc::new(
            AgentTaskRunner::new(queue_agent).with_plan_model(self.config.plan_model.clone()),
        );
        let queue = Arc::new(TaskQueue::new(
            Arc::clone(&store),
            runner,
            self.locks.clone(),
            root.to_path_buf(),
            clock.clone(),
        ));

        let notifier = Arc::new(
            TerminalNotifier::new(Arc::clone(&store), Arc::new(DesktopNotifySender), clock.clone())
                .with_timezone(self.config.notify_timezone.clone()),
        );
        let purge = Arc::new(PurgeScheduler::new(
            Arc::clone(&store),
            store_dir.join("attachments"),
            clock.clone(),
        ));

        // Sessions build a three-adapter orchestrator per user.
        let session_root = root.to_path_buf();
        let factory: Arc<OrchestratorFactory> = Arc::new(move |cwd, resume| {
            let cwd = if cwd.as_os_str().is_empty() { session_root.clone() } else { cwd.to_path_buf() };
            let agents: Vec<Arc<dyn AgentAdapter>> = vec![
                Arc::new(CliAgent::with_cwd(CodexProfile::new(), cwd.clone()).with_thread(resume)),
                Arc::new(CliAgent::with_cwd(ClaudeProfile::new(), cwd.clone())),
                Arc::new(CliAgent::with_cwd(GeminiProfile::new(), cwd)),
            ];
            Arc::new(Orchestrator::new(agents))
        });
        let sessions =
            Arc::new(SessionManager::new(factory, Arc::clone(&store), clock.clone()));

        let project = Project {
            root: root.to_path_buf(),
            project_id,
            session_id,
            store,
            queue: Arc::clone(&queue),
            notifier: Arc::clone(&notifier),
            purge: Arc::clone(&purge),
            sessions: Arc::clone(&sessions),
        };

        if self.config.queue_enabled {
            tokio::spawn(Arc::clone(&queue).run_loop(self.shutdown.child_token()));
            if self.config.queue_auto_start {
                queue.start();
            }
        }
        self.spawn_event_relay(&project);
        self.spawn_housekeeping(&project);
        Ok(project)
    }

    /// Relay queue lifecycle events to matching connections and feed the
    /// terminal notifier.
    fn spawn_event_relay(&self, project: &Project) {
        let mut rx = project.queue.subscribe();
        let bus = Arc::clone(&self.bus);
        let notifier = Arc::clone(&project.notifier);
        let session_id = project.session_id.clone();
        let root = project.root.clone();
        let shutdown = self.shutdown.child_token();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                };

                if let QueueEvent::TaskCompleted { task }
                | QueueEvent::TaskFailed { task, terminal: true }
                | QueueEvent::TaskCancelled { task } = &event
                {
                    if let Err(e) = notifier.record_terminal(task, &root) {
                        warn!(error = %e, "terminal notification bookkeeping failed");
                    }
                }

                let payload = relay_payload(&event);
                bus.broadcast(&session_id, &ServerMessage::TaskEvent(payload));
            }
        });
    }

    /// Notifier sends and purge runs on a slow tick.
    fn spawn_housekeeping(&self, project: &Project) {
        let notifier = Arc::clone(&project.notifier);
        let purge = Arc::clone(&project.purge);
        let sessions = Arc::clone(&project.sessions);
        let shutdown = self.shutdown.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(HOUSEKEEPING_INTERVAL) => {}
                }
                notifier.run_pending().await;
                purge.maybe_run().await;
                sessions.collect_idle();
            }
        });
    }
}

/// Shape a queue event for the WS channel.
fn relay_payload(event: &QueueEvent) -> TaskEventPayload {
    let (task_id, task) = match event {
        QueueEvent::TaskStarted { task, .. }
        | QueueEvent::TaskUpdated { task }
        | QueueEvent::TaskCompleted { task }
        | QueueEvent::TaskFailed { task, .. }
        | QueueEvent::TaskCancelled { task } => (Some(task.id.clone()), Some(TaskDto::from(task))),
        QueueEvent::TaskPlanned { task_id, .. }
        | QueueEvent::TaskRunning { task_id }
        | QueueEvent::StepStarted { task_id, .. }
        | QueueEvent::StepCompleted { task_id, .. }
        | QueueEvent::Message { task_id, .. }
        | QueueEvent::MessageDelta { task_id, .. }
        | QueueEvent::Command { task_id, .. } => (Some(task_id.clone()), None),
        QueueEvent::QueuePaused { .. } | QueueEvent::QueueResumed => (None, None),
    };
    TaskEventPayload {
        event: event.name().to_string(),
        task_id,
        task,
        detail: serde_json::to_value(event).ok(),
    }
}
