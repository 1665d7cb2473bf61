// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! History and thread-identity event handlers.

use crate::events::StoreEvent;
use crate::state::MaterializedTasks;

/// Retention cap per session; old rows fall off the front.
const HISTORY_CAP: usize = 500;

pub(super) fn apply(state: &mut MaterializedTasks, event: &StoreEvent) {
    match event {
        StoreEvent::HistoryAppended { entry } => {
            let rows = state.history.entry(entry.session_key.clone()).or_default();
            // Client-message-id dedup: first insertion wins.
            if let Some(client_id) = &entry.client_message_id {
                if rows.iter().any(|r| r.client_message_id.as_ref() == Some(client_id)) {
                    return;
                }
            }
            rows.push(entry.clone());
            if rows.len() > HISTORY_CAP {
                let excess = rows.len() - HISTORY_CAP;
                rows.drain(..excess);
            }
        }

        StoreEvent::HistoryCleared { session_key } => {
            state.history.remove(session_key);
        }

        StoreEvent::ThreadSaved { key, thread_id } => {
            state.threads.entry(key.clone()).or_default().thread_id = Some(thread_id.clone());
        }

        StoreEvent::ThreadResumeStashed { key, thread_id } => {
            state.threads.entry(key.clone()).or_default().resume_thread = Some(thread_id.clone());
        }

        StoreEvent::ThreadCleared { key } => {
            state.threads.remove(key);
        }

        _ => {}
    }
}
