// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! zstd-compressed state snapshots.
//!
//! A snapshot folds the WAL prefix up to `last_seq` into one file; startup
//! loads it and replays only the WAL suffix.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::state::MaterializedTasks;
use crate::wal::WalError;

const ZSTD_LEVEL: i32 = 3;

/// Snapshot payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub last_seq: u64,
    pub state: MaterializedTasks,
}

/// Write a snapshot atomically (temp file + rename).
pub fn write_snapshot(
    path: &Path,
    state: &MaterializedTasks,
    last_seq: u64,
) -> Result<(), WalError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let snapshot = Snapshot { last_seq, state: state.clone() };
    let json = serde_json::to_vec(&snapshot)?;
    let compressed = zstd::encode_all(&json[..], ZSTD_LEVEL)?;
    let tmp = path.with_extension("snap.tmp");
    std::fs::write(&tmp, compressed)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a snapshot; a missing or unreadable file yields `None` (the WAL
/// replays from the beginning instead).
pub fn load_snapshot(path: &Path) -> Option<Snapshot> {
    let compressed = std::fs::read(path).ok()?;
    let json = zstd::decode_all(&compressed[..]).ok()?;
    match serde_json::from_slice(&json) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "discarding unreadable snapshot");
            None
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
