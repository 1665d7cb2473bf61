// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-user session records.
//!
//! A session owns one orchestrator, the user's working directory and the
//! "needs history injection" flag. Orchestrators are built lazily on first
//! use and pruned after the idle TTL. Thread identity is persisted through
//! the task store so it survives restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ads_core::Clock;
use ads_storage::TaskStore;
use parking_lot::Mutex;
use tracing::debug;

use crate::Orchestrator;

/// Default idle TTL before a session is collected.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Builds an orchestrator for a user: `(cwd, resume_thread)`.
pub type OrchestratorFactory =
    dyn Fn(&Path, Option<String>) -> Arc<Orchestrator> + Send + Sync;

struct SessionRecord {
    orchestrator: Arc<Orchestrator>,
    last_activity: Instant,
    cwd: PathBuf,
    needs_history_injection: bool,
}

/// Read-only view of a session for status surfaces.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub user_id: i64,
    pub cwd: PathBuf,
    pub idle: Duration,
}

pub struct SessionManager<C: Clock> {
    sessions: Mutex<HashMap<i64, SessionRecord>>,
    factory: Arc<OrchestratorFactory>,
    store: Arc<TaskStore>,
    clock: C,
    ttl: Duration,
}

impl<C: Clock> SessionManager<C> {
    pub fn new(factory: Arc<OrchestratorFactory>, store: Arc<TaskStore>, clock: C) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            store,
            clock,
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Get the user's orchestrator, constructing it lazily.
    ///
    /// `resume_thread` only applies on construction; an existing session
    /// keeps its current thread.
    pub fn get_or_create(
        &self,
        user_id: i64,
        cwd: &Path,
        resume_thread: Option<String>,
    ) -> Arc<Orchestrator> {
        let mut sessions = self.sessions.lock();
        let now = self.clock.now();
        let record = sessions.entry(user_id).or_insert_with(|| {
            debug!(user_id, cwd = %cwd.display(), "creating session");
            SessionRecord {
                orchestrator: (self.factory)(cwd, resume_thread),
                last_activity: now,
                cwd: cwd.to_path_buf(),
                needs_history_injection: false,
            }
        });
        record.last_activity = now;
        Arc::clone(&record.orchestrator)
    }

    /// Drop and rebuild a session, optionally resuming a thread id.
    pub fn recreate(
        &self,
        user_id: i64,
        cwd: &Path,
        resume_thread: Option<String>,
    ) -> Arc<Orchestrator> {
        self.sessions.lock().remove(&user_id);
        self.get_or_create(user_id, cwd, resume_thread)
    }

    pub fn touch(&self, user_id: i64) {
        if let Some(record) = self.sessions.lock().get_mut(&user_id) {
            record.last_activity = self.clock.now();
        }
    }

    pub fn cwd(&self, user_id: i64) -> Option<PathBuf> {
        self.sessions.lock().get(&user_id).map(|r| r.cwd.clone())
    }

    /// Update the session cwd and point every adapter at it.
    pub fn set_cwd(&self, user_id: i64, cwd: &Path) {
        let mut sessions = self.sessions.lock();
        if let Some(record) = sessions.get_mut(&user_id) {
            record.cwd = cwd.to_path_buf();
            record.last_activity = self.clock.now();
            record.orchestrator.set_working_directory(cwd.to_path_buf());
        }
    }

    /// Flag that the next turn should prepend a synthesized history block.
    pub fn set_needs_history_injection(&self, user_id: i64, value: bool) {
        if let Some(record) = self.sessions.lock().get_mut(&user_id) {
            record.needs_history_injection = value;
        }
    }

    /// Consume the history-injection flag (true at most once per set).
    pub fn take_needs_history_injection(&self, user_id: i64) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&user_id) {
            Some(record) if record.needs_history_injection => {
                record.needs_history_injection = false;
                true
            }
            _ => false,
        }
    }

    /// Drop sessions idle past the TTL. Returns how many were collected.
    pub fn collect_idle(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|user_id, record| {
            let keep = now.duration_since(record.last_activity) < ttl;
            if !keep {
                debug!(user_id, "collecting idle session");
            }
            keep
        });
        before - sessions.len()
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        let now = self.clock.now();
        self.sessions
            .lock()
            .iter()
            .map(|(user_id, record)| SessionSnapshot {
                user_id: *user_id,
                cwd: record.cwd.clone(),
                idle: now.duration_since(record.last_activity),
            })
            .collect()
    }

    // ---- thread identity (persisted) ----

    fn thread_key(user_id: i64, agent_id: &str) -> String {
        format!("{}:{}", user_id, agent_id)
    }

    /// Idempotent thread save.
    pub fn save_thread(
        &self,
        user_id: i64,
        agent_id: &str,
        thread_id: &str,
    ) -> Result<(), ads_storage::StoreError> {
        self.store.save_thread(&Self::thread_key(user_id, agent_id), thread_id)
    }

    pub fn saved_thread(&self, user_id: i64, agent_id: &str) -> Option<String> {
        self.store.thread_record(&Self::thread_key(user_id, agent_id)).thread_id
    }

    /// Stash a restore point before a reset clears the live thread.
    pub fn stash_resume_thread(
        &self,
        user_id: i64,
        agent_id: &str,
        thread_id: &str,
    ) -> Result<(), ads_storage::StoreError> {
        self.store.stash_resume_thread(&Self::thread_key(user_id, agent_id), thread_id)
    }

    pub fn resume_thread(&self, user_id: i64, agent_id: &str) -> Option<String> {
        self.store.thread_record(&Self::thread_key(user_id, agent_id)).resume_thread
    }

    pub fn clear_thread(
        &self,
        user_id: i64,
        agent_id: &str,
    ) -> Result<(), ads_storage::StoreError> {
        self.store.clear_thread(&Self::thread_key(user_id, agent_id))
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
