// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ads-storage: workspace-scoped durable task state.
//!
//! The store is event-sourced: every mutation appends a [`StoreEvent`] to a
//! JSONL write-ahead log and applies it to the in-memory
//! [`MaterializedTasks`]. Startup replays the WAL on top of the most recent
//! zstd snapshot.

mod events;
mod snapshot;
pub mod state;
mod store;
mod wal;

pub use events::StoreEvent;
pub use snapshot::{load_snapshot, write_snapshot, Snapshot};
pub use state::{HistoryEntry, MaterializedTasks, NotificationRow, ThreadRecord};
pub use store::{
    CreateTask, PurgeBatch, StoreError, TaskStore, TaskUpdate,
};
pub use wal::{Wal, WalEntry};
