// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap plane: iteratively drive an agent until a repository passes
//! install/lint/test verification inside a sandboxed git worktree.

mod recipe;
mod run;
mod worktree;

pub use recipe::{detect_recipe, BootstrapRecipe};
pub use run::{run_bootstrap, BootstrapAgent, BootstrapOutcome, Feedback, IterationRequest};
pub use worktree::{prepare_worktree, WorktreeContext};

use std::path::PathBuf;

use ads_core::ProjectId;
use serde::{Deserialize, Serialize};

/// Where the repository comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProjectSource {
    GitUrl(String),
    LocalPath(PathBuf),
}

impl ProjectSource {
    /// Stable project identity for the state directory layout.
    pub fn project_id(&self) -> ProjectId {
        match self {
            ProjectSource::GitUrl(url) => ProjectId::derive(std::path::Path::new(url)),
            ProjectSource::LocalPath(path) => {
                let canonical =
                    ads_core::canonical_workspace_root(path).unwrap_or_else(|_| path.clone());
                ProjectId::derive(&canonical)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSpec {
    pub enabled: bool,
    /// Placeholders: `{goal}`, `{runId}`, `{iteration}`.
    pub message_template: String,
}

impl Default for CommitSpec {
    fn default() -> Self {
        Self { enabled: false, message_template: "bootstrap: {goal} ({runId})".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxBackend {
    Bwrap,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SandboxSpec {
    pub backend: SandboxBackend,
    /// Fail fast when no hard sandbox is available.
    #[serde(default)]
    pub require_hard: bool,
}

/// Full bootstrap run specification.
#[derive(Debug, Clone)]
pub struct BootstrapSpec {
    pub project: ProjectSource,
    pub goal: String,
    /// Clamped to 1..=10.
    pub max_iterations: u32,
    pub allow_network: bool,
    pub allow_install_deps: bool,
    pub commit: CommitSpec,
    pub sandbox: SandboxSpec,
    pub branch_prefix: String,
    /// Detected from the worktree when absent.
    pub recipe: Option<BootstrapRecipe>,
    pub state_dir: PathBuf,
}

/// Recovery strategy; transitions one-way per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NormalFix,
    CleanDeps,
    RestartAgent,
}

ads_core::simple_display! {
    Strategy {
        NormalFix => "normal_fix",
        CleanDeps => "clean_deps",
        RestartAgent => "restart_agent",
    }
}
