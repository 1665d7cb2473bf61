// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast bus.
//!
//! Routes server messages to the subset of connections whose identity
//! matches a broadcast session id: either the connection's own chat
//! session id or the digest derived from its workspace root. Delivery is
//! best-effort; a failed send is logged and dropped, never raised.

use std::collections::{HashMap, HashSet};

use ads_core::id::ConnectionId;
use ads_wire::ServerMessage;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Chat session excluded from task-event broadcasts.
const PLANNER_SESSION: &str = "planner";

/// One registered connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    /// Chat session id (main, planner, custom).
    pub session_id: String,
    /// Derived workspace session id (`proj:<digest>`).
    pub workspace_session: String,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    /// Key used to dedupe history side-effects within one broadcast.
    fn history_key(&self) -> String {
        format!("{}|{}", self.workspace_session, self.session_id)
    }
}

#[derive(Default)]
pub struct BroadcastBus {
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ConnectionId, handle: ConnectionHandle) {
        self.connections.lock().insert(id, handle);
    }

    pub fn unregister(&self, id: &ConnectionId) {
        self.connections.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Deliver to every matching connection. Returns the deduped
    /// history keys of the receivers, for callers that persist history as
    /// a broadcast side-effect.
    pub fn broadcast(&self, target_session: &str, message: &ServerMessage) -> Vec<String> {
        let is_task_event = matches!(message, ServerMessage::TaskEvent(_));
        let mut history_keys: HashSet<String> = HashSet::new();
        let connections = self.connections.lock();
        for (id, handle) in connections.iter() {
            let matched = handle.session_id == target_session
                || handle.workspace_session == target_session;
            if !matched {
                continue;
            }
            if is_task_event && handle.session_id == PLANNER_SESSION {
                continue;
            }
            if handle.sender.send(message.clone()).is_err() {
                // Receiver is gone; unregister happens on its own path.
                debug!(connection = %id, "dropping broadcast to closed connection");
                continue;
            }
            history_keys.insert(handle.history_key());
        }
        history_keys.into_iter().collect()
    }

    /// Send to exactly one connection.
    pub fn send_to(&self, id: &ConnectionId, message: ServerMessage) {
        let connections = self.connections.lock();
        if let Some(handle) = connections.get(id) {
            if handle.sender.send(message).is_err() {
                debug!(connection = %id, "send to closed connection dropped");
            }
        }
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
