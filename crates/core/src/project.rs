// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project identity.
//!
//! A project is identified by its canonical workspace root: the absolute,
//! symlink-resolved directory path. Everything per-project (locking, state
//! directories, broadcast routing) keys off the [`ProjectId`] digest derived
//! from that root.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Number of hex characters kept from the root digest.
const PROJECT_ID_LEN: usize = 12;

/// Stable digest identity of a workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Derive a project ID from a canonical workspace root.
    pub fn derive(workspace_root: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(workspace_root.as_os_str().as_encoded_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(PROJECT_ID_LEN);
        for byte in digest.iter().take(PROJECT_ID_LEN / 2) {
            hex.push_str(&format!("{:02x}", byte));
        }
        Self(hex)
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve a workspace root to its canonical form (absolute, symlinks resolved).
///
/// The path must exist; canonicalization is what makes two spellings of the
/// same directory map to the same project.
pub fn canonical_workspace_root(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::canonicalize(path)
}

/// Project session id used to match broadcasts against connections.
///
/// Same digest space as [`ProjectId`] but prefixed, so a chat session id can
/// never collide with it.
pub fn derive_project_session_id(workspace_root: &Path) -> String {
    format!("proj:{}", ProjectId::derive(workspace_root))
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
