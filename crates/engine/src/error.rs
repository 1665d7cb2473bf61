// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error surface.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Exec(#[from] ads_exec::ExecError),

    #[error(transparent)]
    Store(#[from] ads_storage::StoreError),

    #[error("git: {0}")]
    Git(String),

    #[error("sandbox: {0}")]
    Sandbox(String),

    #[error("commit: {0}")]
    Commit(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// Cancellation; distinct control path, never reclassified.
    #[error("aborted")]
    Aborted,

    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, EngineError::Aborted)
    }
}
