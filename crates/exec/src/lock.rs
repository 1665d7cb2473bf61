// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace cooperative lock pool.
//!
//! One async mutex per canonical workspace root, created on first use and
//! never evicted. Everything that mutates per-workspace invariants (task
//! state, turn dispatch, history writes) funnels through `run_exclusive`.
//! Fairness comes from tokio's FIFO mutex queue.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Process-wide pool of per-workspace locks.
#[derive(Clone, Default)]
pub struct WorkspaceLocks {
    inner: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for a workspace root, created on first use.
    pub fn lock_for(&self, workspace_root: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut pool = self.inner.lock();
        Arc::clone(
            pool.entry(workspace_root.to_path_buf())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Run `op` while holding the workspace lock.
    pub async fn run_exclusive<F, Fut, T>(&self, workspace_root: &Path, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.lock_for(workspace_root);
        let _guard = lock.lock().await;
        op().await
    }

    /// Number of distinct workspace roots seen so far.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
