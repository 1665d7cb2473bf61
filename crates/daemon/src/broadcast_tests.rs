// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_wire::TaskEventPayload;

fn handle(
    session_id: &str,
    workspace_session: &str,
) -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ConnectionHandle {
            session_id: session_id.to_string(),
            workspace_session: workspace_session.to_string(),
            sender: tx,
        },
        rx,
    )
}

fn task_event() -> ServerMessage {
    ServerMessage::TaskEvent(TaskEventPayload {
        event: "task:started".into(),
        task_id: None,
        task: None,
        detail: None,
    })
}

fn delta() -> ServerMessage {
    ServerMessage::Delta { delta: "x".into(), source: None }
}

#[tokio::test]
async fn matches_by_session_or_workspace() {
    let bus = BroadcastBus::new();
    let (main, mut main_rx) = handle("main", "proj:abc");
    let (other, mut other_rx) = handle("main", "proj:zzz");
    bus.register(ConnectionId::from_string("conn-1"), main);
    bus.register(ConnectionId::from_string("conn-2"), other);

    bus.broadcast("proj:abc", &delta());
    assert!(main_rx.try_recv().is_ok());
    assert!(other_rx.try_recv().is_err());

    bus.broadcast("main", &delta());
    assert!(main_rx.try_recv().is_ok());
    assert!(other_rx.try_recv().is_ok());
}

#[tokio::test]
async fn planner_is_excluded_from_task_events() {
    let bus = BroadcastBus::new();
    let (planner, mut planner_rx) = handle("planner", "proj:abc");
    let (main, mut main_rx) = handle("main", "proj:abc");
    bus.register(ConnectionId::from_string("conn-1"), planner);
    bus.register(ConnectionId::from_string("conn-2"), main);

    bus.broadcast("proj:abc", &task_event());
    assert!(planner_rx.try_recv().is_err());
    assert!(main_rx.try_recv().is_ok());

    // Non-task messages still reach the planner session.
    bus.broadcast("proj:abc", &delta());
    assert!(planner_rx.try_recv().is_ok());
}

#[tokio::test]
async fn history_keys_are_deduped_per_broadcast() {
    let bus = BroadcastBus::new();
    // Two connections with the same identity (e.g. two browser tabs).
    let (a, _rx_a) = handle("main", "proj:abc");
    let (b, _rx_b) = handle("main", "proj:abc");
    bus.register(ConnectionId::from_string("conn-1"), a);
    bus.register(ConnectionId::from_string("conn-2"), b);

    let keys = bus.broadcast("proj:abc", &delta());
    assert_eq!(keys.len(), 1);
}

#[tokio::test]
async fn closed_receiver_does_not_block_others() {
    let bus = BroadcastBus::new();
    let (dead, dead_rx) = handle("main", "proj:abc");
    drop(dead_rx);
    let (alive, mut alive_rx) = handle("main", "proj:abc");
    bus.register(ConnectionId::from_string("conn-1"), dead);
    bus.register(ConnectionId::from_string("conn-2"), alive);

    bus.broadcast("proj:abc", &delta());
    assert!(alive_rx.try_recv().is_ok());
}

#[tokio::test]
async fn unregister_removes_connection() {
    let bus = BroadcastBus::new();
    let (a, _rx) = handle("main", "proj:abc");
    let id = ConnectionId::from_string("conn-1");
    bus.register(id.clone(), a);
    assert_eq!(bus.len(), 1);
    bus.unregister(&id);
    assert!(bus.is_empty());
}
