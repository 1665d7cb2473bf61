// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap worktree preparation.
//!
//! Ensures `bootstraps/<projectId>/repo` is a clone of the source, then
//! adds a fresh worktree on a run-specific branch. Serialized per project
//! by the workspace lock pool, and across processes by a directory lock.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ads_exec::{run, CommandSpec, DirLock, DirLockOwner, WorkspaceLocks};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ProjectSource;
use crate::EngineError;

/// Inter-process lock timeout for repo preparation.
pub const REPO_LOCK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const GIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Stable committer identity for bootstrap commits.
const BOOTSTRAP_USER: &str = "ads-bootstrap";
const BOOTSTRAP_EMAIL: &str = "bootstrap@ads.local";

/// Everything a run needs to know about its prepared worktree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeContext {
    pub project_id: String,
    pub run_id: String,
    pub bootstrap_root: PathBuf,
    pub repo_dir: PathBuf,
    pub worktree_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub branch_name: String,
    pub source: ProjectSource,
}

pub(crate) async fn git(
    args: &[&str],
    cwd: &Path,
    cancel: &CancellationToken,
) -> Result<String, EngineError> {
    let spec = CommandSpec::new("git")
        .args(args.iter().map(|s| s.to_string()))
        .cwd(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .timeout(GIT_TIMEOUT);
    let outcome = run(spec, cancel).await?;
    if outcome.killed && !outcome.timed_out {
        return Err(EngineError::Aborted);
    }
    if !outcome.ok() {
        return Err(EngineError::Git(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            outcome.stderr.trim()
        )));
    }
    Ok(outcome.stdout)
}

/// Prepare a fresh worktree for a bootstrap run.
pub async fn prepare_worktree(
    source: &ProjectSource,
    branch_prefix: &str,
    state_dir: &Path,
    run_id: &str,
    locks: &WorkspaceLocks,
    cancel: &CancellationToken,
) -> Result<WorktreeContext, EngineError> {
    prepare_worktree_with_lock_timeout(
        source,
        branch_prefix,
        state_dir,
        run_id,
        locks,
        cancel,
        REPO_LOCK_TIMEOUT,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn prepare_worktree_with_lock_timeout(
    source: &ProjectSource,
    branch_prefix: &str,
    state_dir: &Path,
    run_id: &str,
    locks: &WorkspaceLocks,
    cancel: &CancellationToken,
    lock_timeout: Duration,
) -> Result<WorktreeContext, EngineError> {
    let project_id = source.project_id().to_string();
    let bootstrap_root = state_dir.join("bootstraps").join(&project_id);
    let repo_dir = bootstrap_root.join("repo");
    let worktree_dir = bootstrap_root.join("worktrees").join(run_id);
    let artifacts_dir = bootstrap_root.join("artifacts").join(run_id);
    let branch_name = format!("{}/{}", branch_prefix, run_id);

    let context = WorktreeContext {
        project_id: project_id.clone(),
        run_id: run_id.to_string(),
        bootstrap_root: bootstrap_root.clone(),
        repo_dir: repo_dir.clone(),
        worktree_dir: worktree_dir.clone(),
        artifacts_dir: artifacts_dir.clone(),
        branch_name: branch_name.clone(),
        source: source.clone(),
    };

    locks
        .run_exclusive(&bootstrap_root, || async {
            let lock = DirLock::new(bootstrap_root.join(".locks").join("repo.lock"));
            let owner = DirLockOwner::current(project_id.clone(), run_id.to_string());
            let guard = lock.acquire(owner, lock_timeout).await?;
            let result = prepare_inner(&context, cancel).await;
            guard.release();
            result
        })
        .await?;

    Ok(context)
}

async fn prepare_inner(
    context: &WorktreeContext,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    std::fs::create_dir_all(&context.bootstrap_root).map_err(ads_exec::ExecError::Io)?;

    if !context.repo_dir.join(".git").exists() {
        // Clone into a temp sibling, then rename, so a crashed clone never
        // masquerades as a usable repo.
        let tmp = context.bootstrap_root.join(format!("repo.tmp-{}", context.run_id));
        if tmp.exists() {
            let _ = std::fs::remove_dir_all(&tmp);
        }
        let src = match &context.source {
            ProjectSource::GitUrl(url) => url.clone(),
            ProjectSource::LocalPath(path) => path.display().to_string(),
        };
        info!(src = %src, "cloning bootstrap repo");
        git(&["clone", &src, &tmp.display().to_string()], &context.bootstrap_root, cancel).await?;
        std::fs::rename(&tmp, &context.repo_dir).map_err(ads_exec::ExecError::Io)?;
    } else {
        // Best-effort refresh; offline preparation still works.
        debug!(repo = %context.repo_dir.display(), "refreshing bootstrap repo");
        let _ = git(&["fetch", "--all", "--prune"], &context.repo_dir, cancel).await;
    }

    let _ = git(&["worktree", "prune"], &context.repo_dir, cancel).await;
    std::fs::create_dir_all(
        context.worktree_dir.parent().unwrap_or(&context.bootstrap_root),
    )
    .map_err(ads_exec::ExecError::Io)?;
    git(
        &[
            "worktree",
            "add",
            "-b",
            &context.branch_name,
            &context.worktree_dir.display().to_string(),
            "HEAD",
        ],
        &context.repo_dir,
        cancel,
    )
    .await?;

    // Local committer identity so commits never depend on host config.
    git(&["config", "user.name", BOOTSTRAP_USER], &context.worktree_dir, cancel).await?;
    git(&["config", "user.email", BOOTSTRAP_EMAIL], &context.worktree_dir, cancel).await?;

    std::fs::create_dir_all(&context.artifacts_dir).map_err(ads_exec::ExecError::Io)?;
    Ok(())
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
