// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace purge scheduler.
//!
//! Reclaims archived+completed tasks older than the retention window, in
//! batches, unlinking their attachment blobs with bounded concurrency.
//! Throttled to at most one run per workspace per 12 hours.

use std::path::PathBuf;
use std::sync::Arc;

use ads_core::Clock;
use ads_storage::TaskStore;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Minimum spacing between runs for one workspace.
const RUN_INTERVAL_MS: u64 = 12 * 60 * 60 * 1000;

/// Retention for archived completed tasks.
const RETENTION_MS: u64 = 7 * 24 * 60 * 60 * 1000;

const BATCH_SIZE: usize = 100;

/// Concurrent unlink fan-out per batch.
const UNLINK_CONCURRENCY: usize = 8;

pub struct PurgeScheduler<C: Clock> {
    store: Arc<TaskStore>,
    /// Root under which attachment storage keys resolve.
    attachments_root: PathBuf,
    clock: C,
    last_run_ms: Mutex<Option<u64>>,
}

impl<C: Clock> PurgeScheduler<C> {
    pub fn new(store: Arc<TaskStore>, attachments_root: PathBuf, clock: C) -> Self {
        Self { store, attachments_root, clock, last_run_ms: Mutex::new(None) }
    }

    /// Run if the throttle window has elapsed. Returns purged task count.
    pub async fn maybe_run(&self) -> usize {
        let now = self.clock.epoch_ms();
        {
            let mut last = self.last_run_ms.lock();
            if let Some(last_run) = *last {
                if now.saturating_sub(last_run) < RUN_INTERVAL_MS {
                    return 0;
                }
            }
            *last = Some(now);
        }
        self.run_now(now).await
    }

    /// Unthrottled batched purge loop.
    pub async fn run_now(&self, now: u64) -> usize {
        let cutoff = now.saturating_sub(RETENTION_MS);
        let mut purged = 0;
        loop {
            let batch = match self.store.purge_archived_completed_tasks_batch(cutoff, BATCH_SIZE) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "purge batch failed");
                    break;
                }
            };
            if batch.task_ids.is_empty() {
                break;
            }
            purged += batch.task_ids.len();
            debug!(count = batch.task_ids.len(), "purged task batch");

            // Unlink blobs with bounded fan-out; missing files are fine.
            for chunk in batch.attachments.chunks(UNLINK_CONCURRENCY) {
                let mut handles = Vec::with_capacity(chunk.len());
                for (id, storage_key) in chunk {
                    let path = self.attachments_root.join(storage_key);
                    let id = id.clone();
                    handles.push(tokio::spawn(async move {
                        match tokio::fs::remove_file(&path).await {
                            Ok(()) => {}
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                            Err(e) => {
                                warn!(attachment = %id, error = %e, "failed to unlink blob")
                            }
                        }
                    }));
                }
                for handle in handles {
                    let _ = handle.await;
                }
            }

            // Yield between batches so the purge never starves the loop.
            tokio::task::yield_now().await;
        }
        purged
    }
}

#[cfg(test)]
#[path = "purge_tests.rs"]
mod tests;
