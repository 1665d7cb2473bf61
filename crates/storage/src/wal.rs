// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL write-ahead log.
//!
//! One `{"seq":N,"event":{...}}` object per line. Sequence numbers are
//! monotonic and survive reopen; snapshotting truncates the prefix that is
//! already folded into a snapshot.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::StoreEvent;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("WAL I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One WAL record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: StoreEvent,
}

/// Append-only event log.
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
}

impl Wal {
    /// Open (creating if absent) and scan for the last sequence number.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let write_seq = read_entries(path)?.last().map(|e| e.seq).unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { path: path.to_path_buf(), writer: BufWriter::new(file), write_seq })
    }

    /// Highest sequence number written so far.
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Append an event, returning its sequence number.
    pub fn append(&mut self, event: &StoreEvent) -> Result<u64, WalError> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, event: event.clone() };
        let line = serde_json::to_string(&entry)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(self.write_seq)
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        Ok(())
    }

    /// All entries with `seq > after`.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        Ok(read_entries(&self.path)?.into_iter().filter(|e| e.seq > after).collect())
    }

    /// Drop every entry with `seq <= before` (after a snapshot).
    pub fn truncate_before(&mut self, before: u64) -> Result<(), WalError> {
        self.flush()?;
        let keep: Vec<WalEntry> =
            read_entries(&self.path)?.into_iter().filter(|e| e.seq > before).collect();
        let tmp = self.path.with_extension("wal.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for entry in &keep {
                let line = serde_json::to_string(entry)?;
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        Ok(())
    }
}

/// Read every parseable entry; a torn final line (crash mid-write) is
/// skipped rather than treated as corruption.
fn read_entries(path: &Path) -> Result<Vec<WalEntry>, WalError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping torn WAL line");
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
