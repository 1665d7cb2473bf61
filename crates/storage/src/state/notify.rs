// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification outbox event handlers.

use crate::events::StoreEvent;
use crate::state::MaterializedTasks;

pub(super) fn apply(state: &mut MaterializedTasks, event: &StoreEvent) {
    match event {
        StoreEvent::NotificationUpserted { row } => {
            let entry = state
                .notifications
                .entry(row.task_id.as_str().to_string())
                .or_insert_with(|| row.clone());
            // A later terminal transition may update status/error; the
            // at-most-once marker is never overwritten.
            let notified = entry.notified_at_ms;
            *entry = row.clone();
            if notified.is_some() {
                entry.notified_at_ms = notified;
            }
        }

        StoreEvent::NotificationSent { task_id, at_ms } => {
            if let Some(row) = state.notifications.get_mut(task_id.as_str()) {
                if row.notified_at_ms.is_none() {
                    row.notified_at_ms = Some(*at_ms);
                }
            }
        }

        StoreEvent::NotificationFailed { task_id, next_retry_at_ms, error, at_ms } => {
            if let Some(row) = state.notifications.get_mut(task_id.as_str()) {
                // Only count each failure once on replay.
                if row.next_retry_at_ms != Some(*next_retry_at_ms) {
                    row.retry_count += 1;
                    row.next_retry_at_ms = Some(*next_retry_at_ms);
                    row.last_error = Some(format!("{} (at {})", error, at_ms));
                }
            }
        }

        _ => {}
    }
}
