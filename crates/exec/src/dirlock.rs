// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process directory lock.
//!
//! Ownership is taken by atomically creating the lock directory and writing
//! an `owner.json` descriptor inside it. Contenders poll with jittered
//! backoff until the timeout. Recovery removes locks whose owner pid is
//! dead on this host, and ownerless directories older than a grace period.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::command::ExecError;

/// Poll interval bounds (jittered).
const POLL_MIN: Duration = Duration::from_millis(50);
const POLL_SPREAD_MS: u64 = 200;

/// An ownerless lock directory older than this is considered abandoned.
const ORPHAN_GRACE: Duration = Duration::from_secs(10);

const OWNER_FILE: &str = "owner.json";

/// Descriptor written inside the lock directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirLockOwner {
    pub pid: u32,
    pub host: String,
    pub acquired_at_ms: u64,
    pub project_id: String,
    pub run_id: String,
}

impl DirLockOwner {
    pub fn current(project_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            pid: std::process::id(),
            host: hostname(),
            acquired_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            project_id: project_id.into(),
            run_id: run_id.into(),
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Cheap jitter source; uniformity does not matter for lock polling.
fn jitter_ms() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % POLL_SPREAD_MS
}

/// A directory lock rooted at a fixed path.
#[derive(Debug, Clone)]
pub struct DirLock {
    dir: PathBuf,
}

/// Held lock; removes the directory when dropped.
pub struct DirLockGuard {
    dir: PathBuf,
    released: bool,
}

impl DirLockGuard {
    /// Release explicitly (Drop also releases).
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(e) = std::fs::remove_dir_all(&self.dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(dir = %self.dir.display(), error = %e, "failed to remove lock dir");
                }
            }
        }
    }
}

impl Drop for DirLockGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

impl DirLock {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Try to take the lock once without waiting.
    pub fn try_acquire(&self, owner: &DirLockOwner) -> Result<Option<DirLockGuard>, ExecError> {
        if let Some(parent) = self.dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::create_dir(&self.dir) {
            Ok(()) => {
                let payload = serde_json::to_vec_pretty(owner)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                std::fs::write(self.dir.join(OWNER_FILE), payload)?;
                Ok(Some(DirLockGuard { dir: self.dir.clone(), released: false }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Acquire the lock, polling until `timeout`.
    pub async fn acquire(
        &self,
        owner: DirLockOwner,
        timeout: Duration,
    ) -> Result<DirLockGuard, ExecError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(guard) = self.try_acquire(&owner)? {
                return Ok(guard);
            }
            self.recover_stale()?;
            if Instant::now() >= deadline {
                return Err(ExecError::LockTimeout(timeout));
            }
            tokio::time::sleep(POLL_MIN + Duration::from_millis(jitter_ms())).await;
        }
    }

    /// Remove the lock directory when its owner is provably gone.
    fn recover_stale(&self) -> Result<(), ExecError> {
        let owner_path = self.dir.join(OWNER_FILE);
        match std::fs::read(&owner_path) {
            Ok(bytes) => {
                let Ok(owner) = serde_json::from_slice::<DirLockOwner>(&bytes) else {
                    return self.remove_if_orphaned();
                };
                if owner.host == hostname() && !pid_alive(owner.pid) {
                    tracing::warn!(
                        dir = %self.dir.display(),
                        pid = owner.pid,
                        "removing lock held by dead process"
                    );
                    let _ = std::fs::remove_dir_all(&self.dir);
                }
                Ok(())
            }
            // Lock dir without a descriptor: either mid-acquisition by a
            // peer, or abandoned. Only the grace period decides.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.remove_if_orphaned(),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_if_orphaned(&self) -> Result<(), ExecError> {
        let Ok(meta) = std::fs::metadata(&self.dir) else {
            return Ok(());
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .unwrap_or_default();
        if age > ORPHAN_GRACE {
            tracing::warn!(dir = %self.dir.display(), "removing ownerless stale lock dir");
            let _ = std::fs::remove_dir_all(&self.dir);
        }
        Ok(())
    }
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
#[path = "dirlock_tests.rs"]
mod tests;
