// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-terminal notifier.
//!
//! Terminal task transitions upsert an outbox row; a background sender
//! delivers each row at most once, with exponential backoff recorded back
//! into the row on failure. Timestamps in outbound text are formatted in a
//! configurable named timezone (default Asia/Shanghai); unknown names fall
//! back silently.

use std::path::Path;
use std::sync::Arc;

use ads_core::{Clock, Task};
use ads_storage::{NotificationRow, TaskStore};
use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone};
use tracing::{debug, warn};

/// Backoff base and cap for failed sends.
const BACKOFF_BASE_MS: u64 = 30_000;
const BACKOFF_CAP_MS: u64 = 60 * 60 * 1000;

const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

/// Delivery seam; the default implementation posts a desktop notification.
/// (The Telegram transport lives outside this crate and plugs in here.)
#[async_trait]
pub trait NotifySender: Send + Sync {
    async fn send(&self, row: &NotificationRow, text: &str) -> Result<(), String>;
}

/// Desktop notification sender.
pub struct DesktopNotifySender;

#[async_trait]
impl NotifySender for DesktopNotifySender {
    async fn send(&self, row: &NotificationRow, text: &str) -> Result<(), String> {
        notify_rust::Notification::new()
            .summary(&format!("Task {}", row.status))
            .body(text)
            .show()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Exponential backoff for the retry_count-th failure.
pub fn backoff_ms(retry_count: u32) -> u64 {
    BACKOFF_BASE_MS.saturating_mul(1_u64 << retry_count.min(10)).min(BACKOFF_CAP_MS)
}

/// Minimal named-timezone table. The corpus carries no tz database; these
/// fixed offsets cover the supported deployment zones.
fn zone_offset(name: &str) -> Option<FixedOffset> {
    let hours = match name {
        "Asia/Shanghai" | "Asia/Singapore" | "Asia/Hong_Kong" => 8,
        "Asia/Tokyo" | "Asia/Seoul" => 9,
        "UTC" | "Etc/UTC" => 0,
        "Europe/Berlin" | "Europe/Paris" => 1,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

/// Format epoch millis as `YYYY-MM-DD HH:MM:SS` in the given zone.
/// Unknown zone names fall back to the default silently.
pub fn format_in_zone(epoch_ms: u64, zone: &str) -> String {
    let Some(offset) = zone_offset(zone).or_else(|| zone_offset(DEFAULT_TIMEZONE)) else {
        return epoch_ms.to_string();
    };
    match offset.timestamp_millis_opt(epoch_ms as i64).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => epoch_ms.to_string(),
    }
}

pub struct TerminalNotifier<C: Clock> {
    store: Arc<TaskStore>,
    sender: Arc<dyn NotifySender>,
    clock: C,
    timezone: String,
}

impl<C: Clock> TerminalNotifier<C> {
    pub fn new(store: Arc<TaskStore>, sender: Arc<dyn NotifySender>, clock: C) -> Self {
        Self { store, sender, clock, timezone: DEFAULT_TIMEZONE.to_string() }
    }

    /// Override the display timezone (ADS_TELEGRAM_NOTIFY_TIMEZONE).
    /// Invalid values are kept and fall back at format time.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Record a terminal transition in the outbox.
    pub fn record_terminal(
        &self,
        task: &Task,
        workspace_root: &Path,
    ) -> Result<(), ads_storage::StoreError> {
        debug_assert!(task.is_terminal());
        let existing = self.store.get_notification(&task.id);
        let row = NotificationRow {
            task_id: task.id.clone(),
            workspace_root: workspace_root.to_path_buf(),
            status: task.status,
            started_at_ms: task.started_at_ms,
            completed_at_ms: task.completed_at_ms,
            project_name: workspace_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| workspace_root.display().to_string()),
            last_error: task.error.clone(),
            retry_count: existing.as_ref().map(|r| r.retry_count).unwrap_or(0),
            next_retry_at_ms: existing.as_ref().and_then(|r| r.next_retry_at_ms),
            notified_at_ms: None,
        };
        self.store.upsert_notification(row)
    }

    fn render(&self, row: &NotificationRow) -> String {
        let mut text = format!("[{}] task \"{}\" {}", row.project_name, row.task_id, row.status);
        if let Some(started) = row.started_at_ms {
            text.push_str(&format!("\nstarted: {}", format_in_zone(started, &self.timezone)));
        }
        if let Some(completed) = row.completed_at_ms {
            text.push_str(&format!("\nfinished: {}", format_in_zone(completed, &self.timezone)));
        }
        if let Some(error) = &row.last_error {
            text.push_str(&format!("\nerror: {}", error));
        }
        text
    }

    /// One send pass over the due rows. Returns how many sends succeeded.
    pub async fn run_pending(&self) -> usize {
        let now = self.clock.epoch_ms();
        let mut sent = 0;
        for row in self.store.due_notifications(now) {
            let text = self.render(&row);
            match self.sender.send(&row, &text).await {
                Ok(()) => match self.store.mark_notified(&row.task_id, self.clock.epoch_ms()) {
                    Ok(true) => sent += 1,
                    Ok(false) => debug!(task = %row.task_id, "already notified; skipping"),
                    Err(e) => warn!(task = %row.task_id, error = %e, "mark_notified failed"),
                },
                Err(error) => {
                    let next = self.clock.epoch_ms() + backoff_ms(row.retry_count);
                    if let Err(e) = self.store.record_notification_failure(
                        &row.task_id,
                        self.clock.epoch_ms(),
                        next,
                        error,
                    ) {
                        warn!(task = %row.task_id, error = %e, "failure bookkeeping failed");
                    }
                }
            }
        }
        sent
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
