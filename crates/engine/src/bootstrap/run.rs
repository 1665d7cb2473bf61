// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap iteration loop.
//!
//! plan → verify → strategize → commit. Each iteration lets the agent edit
//! the worktree, re-verifies, and escalates the recovery strategy when the
//! same failure signature repeats. Artifacts are persisted per iteration;
//! the final report is written on every exit path, including cancellation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ads_core::ClassifiedError;
use ads_exec::{run_recipe_step, StepReport, VerifyStep, WorkspaceLocks};
use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::recipe::{detect_recipe, BootstrapRecipe};
use super::worktree::{git, prepare_worktree, WorktreeContext};
use super::{BootstrapSpec, SandboxBackend, Strategy};
use crate::EngineError;

/// Files whose change triggers a dependency re-install.
const DEP_MARKERS: &[&str] = &[
    "package.json",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "pyproject.toml",
    "poetry.lock",
    "uv.lock",
    "requirements.txt",
];

/// Dependency caches removed by the clean_deps strategy.
const DEP_CACHES: &[&str] =
    &["node_modules", ".venv", ".pytest_cache", ".mypy_cache", "__pycache__"];

/// Path prefixes never staged by the safe commit.
const UNSAFE_COMMIT_DIRS: &[&str] =
    &["node_modules", ".venv", ".pytest_cache", ".mypy_cache", "__pycache__", ".ads"];

/// Feedback handed to the agent each iteration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Feedback {
    pub lint_summary: Option<String>,
    pub test_summary: Option<String>,
    pub diff_summary: Option<String>,
    pub strategy_note: Option<String>,
}

/// One agent iteration request.
#[derive(Debug, Clone)]
pub struct IterationRequest {
    pub iteration: u32,
    pub goal: String,
    pub cwd: PathBuf,
    pub feedback: Feedback,
    pub cancel: CancellationToken,
}

/// The agent driven by the loop.
#[async_trait]
pub trait BootstrapAgent: Send + Sync {
    /// Edit the worktree toward the goal. Errors are persisted but do not
    /// abort the loop.
    async fn run_iteration(&self, request: IterationRequest) -> Result<(), ClassifiedError>;

    /// Drop conversational state (restart_agent strategy).
    async fn reset(&self);
}

/// Result of a bootstrap run.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapOutcome {
    pub ok: bool,
    pub iterations: u32,
    pub strategy_changes: u32,
    pub final_commit: Option<String>,
    pub final_branch: String,
    pub last_report_path: PathBuf,
    pub error: Option<String>,
}

#[derive(Serialize)]
struct IterationReport<'a> {
    iteration: u32,
    ok: bool,
    signature: &'a str,
    strategy: Strategy,
    install: &'a Option<StepReport>,
    lint: &'a Option<StepReport>,
    test: &'a Option<StepReport>,
}

/// Run a full bootstrap. Cancellation still writes the final report, then
/// surfaces as `EngineError::Aborted`.
pub async fn run_bootstrap(
    spec: &BootstrapSpec,
    agent: &dyn BootstrapAgent,
    locks: &WorkspaceLocks,
    cancel: &CancellationToken,
) -> Result<BootstrapOutcome, EngineError> {
    if spec.sandbox.require_hard && spec.sandbox.backend == SandboxBackend::None {
        return Err(EngineError::Sandbox(
            "hard sandbox required but backend is none".to_string(),
        ));
    }
    let max_iterations = spec.max_iterations.clamp(1, 10);
    let run_id = format!("run-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S%3f"));

    let context = prepare_worktree(
        &spec.project,
        &spec.branch_prefix,
        &spec.state_dir,
        &run_id,
        locks,
        cancel,
    )
    .await?;
    let recipe = match &spec.recipe {
        Some(recipe) => recipe.clone(),
        None => detect_recipe(&context.worktree_dir),
    };
    info!(run = %run_id, worktree = %context.worktree_dir.display(), "bootstrap run starting");

    let mut loop_state = LoopState::new(spec, recipe, context);
    let result = loop_state.run(agent, max_iterations, cancel).await;
    loop_state.write_final_report(&result);

    match result {
        LoopResult::Success { iterations, final_commit } => Ok(BootstrapOutcome {
            ok: true,
            iterations,
            strategy_changes: loop_state.strategy_changes,
            final_commit: Some(final_commit).filter(|c| !c.is_empty()),
            final_branch: loop_state.context.branch_name.clone(),
            last_report_path: loop_state.final_report_path(),
            error: None,
        }),
        LoopResult::Exhausted { iterations } => Ok(BootstrapOutcome {
            ok: false,
            iterations,
            strategy_changes: loop_state.strategy_changes,
            final_commit: None,
            final_branch: loop_state.context.branch_name.clone(),
            last_report_path: loop_state.final_report_path(),
            error: Some("max iterations exceeded".to_string()),
        }),
        LoopResult::Aborted => Err(EngineError::Aborted),
        LoopResult::Failed(err) => Err(err),
    }
}

enum LoopResult {
    Success { iterations: u32, final_commit: String },
    Exhausted { iterations: u32 },
    Aborted,
    Failed(EngineError),
}

struct LoopState {
    spec: BootstrapSpec,
    recipe: BootstrapRecipe,
    context: WorktreeContext,
    strategy: Strategy,
    strategy_changes: u32,
    same_failure_streak: u32,
    previous_signature: Option<String>,
    feedback: Feedback,
    iterations: u32,
}

impl LoopState {
    fn new(spec: &BootstrapSpec, recipe: BootstrapRecipe, context: WorktreeContext) -> Self {
        Self {
            spec: spec.clone(),
            recipe,
            context,
            strategy: Strategy::NormalFix,
            strategy_changes: 0,
            same_failure_streak: 0,
            previous_signature: None,
            feedback: Feedback::default(),
            iterations: 0,
        }
    }

    fn final_report_path(&self) -> PathBuf {
        self.context.artifacts_dir.join("final.json")
    }

    async fn run(
        &mut self,
        agent: &dyn BootstrapAgent,
        max_iterations: u32,
        cancel: &CancellationToken,
    ) -> LoopResult {
        for iteration in 1..=max_iterations {
            self.iterations = iteration;
            if cancel.is_cancelled() {
                return LoopResult::Aborted;
            }
            match self.run_iteration(agent, iteration, cancel).await {
                Ok(Some(final_commit)) => {
                    return LoopResult::Success { iterations: iteration, final_commit }
                }
                Ok(None) => {}
                Err(EngineError::Aborted) => return LoopResult::Aborted,
                Err(err) => return LoopResult::Failed(err),
            }
        }
        LoopResult::Exhausted { iterations: max_iterations }
    }

    /// One iteration. `Ok(Some(commit))` means verification passed.
    async fn run_iteration(
        &mut self,
        agent: &dyn BootstrapAgent,
        iteration: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, EngineError> {
        let iter_dir = self.context.artifacts_dir.join(format!("iter-{}", iteration));
        std::fs::create_dir_all(&iter_dir).map_err(ads_exec::ExecError::Io)?;

        let mut feedback = self.feedback.clone();
        if self.strategy != Strategy::NormalFix {
            feedback.strategy_note =
                Some(format!("recovery strategy is now {}", self.strategy));
        }

        let request = IterationRequest {
            iteration,
            goal: self.spec.goal.clone(),
            cwd: self.context.worktree_dir.clone(),
            feedback,
            cancel: cancel.clone(),
        };
        if let Err(err) = agent.run_iteration(request).await {
            if cancel.is_cancelled() {
                return Err(EngineError::Aborted);
            }
            warn!(iteration, error = %err, "agent iteration failed");
            let _ = std::fs::write(iter_dir.join("agent_error.txt"), err.to_string());
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Aborted);
        }

        // Re-install when the agent touched a dependency manifest.
        let changed = git(&["diff", "--name-only"], &self.context.worktree_dir, cancel).await?;
        let deps_changed = changed
            .lines()
            .any(|line| DEP_MARKERS.iter().any(|marker| line.trim() == *marker));
        let mut install = None;
        if deps_changed && self.spec.allow_install_deps {
            install = self.run_verify_step(&self.recipe.install.clone(), cancel).await?;
        }

        let patch = git(&["diff"], &self.context.worktree_dir, cancel).await?;
        if !patch.trim().is_empty() {
            let _ = std::fs::write(iter_dir.join("diff.patch"), &patch);
        }

        let install_failed = install.as_ref().map(|r: &StepReport| !r.ok).unwrap_or(false);
        let (lint, test) = if install_failed {
            (
                self.recipe.lint.as_ref().map(|s| skipped_report(s, "install_failed")),
                self.recipe.test.as_ref().map(|s| skipped_report(s, "install_failed")),
            )
        } else {
            let lint = self.run_verify_step(&self.recipe.lint.clone(), cancel).await?;
            let lint_ok = lint.as_ref().map(|r| r.ok).unwrap_or(true);
            let test = if lint_ok {
                self.run_verify_step(&self.recipe.test.clone(), cancel).await?
            } else {
                self.recipe.test.as_ref().map(|s| skipped_report(s, "lint failed"))
            };
            (lint, test)
        };

        let lint_ok = lint.as_ref().map(|r| r.ok).unwrap_or(true);
        let test_ok = test.as_ref().map(|r| r.ok).unwrap_or(true);
        let ok = !install_failed && lint_ok && test_ok;
        let signature = format!("{}::{}", signature_of(&lint), signature_of(&test));

        if !ok {
            if self.previous_signature.as_deref() == Some(signature.as_str()) {
                self.same_failure_streak += 1;
            } else {
                self.same_failure_streak = 1;
            }
            // An iteration with no patch cannot have changed the outcome.
            if patch.trim().is_empty() && self.same_failure_streak < 2 {
                self.same_failure_streak = 2;
            }
            if self.same_failure_streak >= 2 && self.strategy == Strategy::NormalFix {
                self.strategy = Strategy::CleanDeps;
                self.strategy_changes += 1;
                info!(iteration, "escalating to clean_deps");
                self.clean_dependency_caches();
                if self.spec.allow_install_deps {
                    let _ = self.run_verify_step(&self.recipe.install.clone(), cancel).await?;
                }
            }
            if self.same_failure_streak >= 3 && self.strategy != Strategy::RestartAgent {
                self.strategy = Strategy::RestartAgent;
                self.strategy_changes += 1;
                info!(iteration, "escalating to restart_agent");
                agent.reset().await;
            }
            self.previous_signature = Some(signature.clone());
        }

        let report = IterationReport {
            iteration,
            ok,
            signature: &signature,
            strategy: self.strategy,
            install: &install,
            lint: &lint,
            test: &test,
        };
        if let Ok(json) = serde_json::to_vec_pretty(&report) {
            let _ = std::fs::write(iter_dir.join("report.json"), json);
        }
        self.append_strategy_log(iteration, ok, &signature);

        self.feedback = Feedback {
            lint_summary: lint.as_ref().map(report_summary),
            test_summary: test.as_ref().map(report_summary),
            diff_summary: (!patch.trim().is_empty()).then(|| truncate(&patch, 4_000)),
            strategy_note: None,
        };

        if !ok {
            return Ok(None);
        }
        let commit = if self.spec.commit.enabled {
            self.commit_safe_changes(iteration, cancel).await?
        } else {
            String::new()
        };
        Ok(Some(commit))
    }

    async fn run_verify_step(
        &self,
        step: &Option<VerifyStep>,
        cancel: &CancellationToken,
    ) -> Result<Option<StepReport>, EngineError> {
        let Some(step) = step else {
            return Ok(None);
        };
        let step = wrap_in_sandbox(
            step.clone(),
            self.spec.sandbox.backend,
            self.spec.allow_network,
            &self.context.worktree_dir,
        );
        let report = run_recipe_step(
            &step,
            &self.context.worktree_dir,
            &HashMap::new(),
            cancel,
        )
        .await?;
        if cancel.is_cancelled() {
            return Err(EngineError::Aborted);
        }
        Ok(Some(report))
    }

    fn clean_dependency_caches(&self) {
        for cache in DEP_CACHES {
            let path = self.context.worktree_dir.join(cache);
            if path.exists() {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove dependency cache");
                }
            }
        }
    }

    /// Stage safe changes and commit with the rendered template. Zero
    /// staged files or a failed commit is a terminal error.
    async fn commit_safe_changes(
        &self,
        iteration: u32,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        let worktree = &self.context.worktree_dir;
        let status = git(&["status", "--porcelain"], worktree, cancel).await?;
        let mut staged_any = false;
        for line in status.lines() {
            let path = line.get(3..).unwrap_or_default().trim();
            if path.is_empty() || !is_safe_commit_path(path) {
                continue;
            }
            git(&["add", "--", path], worktree, cancel).await?;
            staged_any = true;
        }
        if !staged_any {
            return Err(EngineError::Commit("no safe files to commit".to_string()));
        }
        let staged = git(&["diff", "--cached", "--name-only"], worktree, cancel).await?;
        if staged.trim().is_empty() {
            return Err(EngineError::Commit("staging produced zero files".to_string()));
        }

        let message = self
            .spec
            .commit
            .message_template
            .replace("{goal}", &self.spec.goal)
            .replace("{runId}", &self.context.run_id)
            .replace("{iteration}", &iteration.to_string());
        git(&["commit", "-m", &message], worktree, cancel)
            .await
            .map_err(|e| EngineError::Commit(e.to_string()))?;
        let hash = git(&["rev-parse", "HEAD"], worktree, cancel).await?;
        Ok(hash.trim().to_string())
    }

    fn append_strategy_log(&self, iteration: u32, ok: bool, signature: &str) {
        use std::io::Write;
        let line = format!(
            "iter={} ok={} strategy={} streak={} sig={}\n",
            iteration, ok, self.strategy, self.same_failure_streak, signature
        );
        let path = self.context.artifacts_dir.join("strategy.log");
        if let Ok(mut file) =
            std::fs::OpenOptions::new().create(true).append(true).open(&path)
        {
            let _ = file.write_all(line.as_bytes());
        }
    }

    fn write_final_report(&self, result: &LoopResult) {
        #[derive(Serialize)]
        struct FinalReport<'a> {
            ok: bool,
            iterations: u32,
            strategy: Strategy,
            strategy_changes: u32,
            branch: &'a str,
            error: Option<&'a str>,
        }
        let (ok, error) = match result {
            LoopResult::Success { .. } => (true, None),
            LoopResult::Exhausted { .. } => (false, Some("max iterations exceeded")),
            LoopResult::Aborted => (false, Some("aborted")),
            LoopResult::Failed(_) => (false, Some("terminal error")),
        };
        let report = FinalReport {
            ok,
            iterations: self.iterations,
            strategy: self.strategy,
            strategy_changes: self.strategy_changes,
            branch: &self.context.branch_name,
            error,
        };
        if let Ok(json) = serde_json::to_vec_pretty(&report) {
            let _ = std::fs::write(self.final_report_path(), json);
        }
    }
}

/// Wrap a verification step in the declarative sandbox.
fn wrap_in_sandbox(
    step: VerifyStep,
    backend: SandboxBackend,
    allow_network: bool,
    cwd: &Path,
) -> VerifyStep {
    match backend {
        SandboxBackend::None => step,
        SandboxBackend::Bwrap => {
            let mut args = vec![
                "--dev-bind".to_string(),
                "/".to_string(),
                "/".to_string(),
                "--chdir".to_string(),
                cwd.display().to_string(),
            ];
            if !allow_network {
                args.push("--unshare-net".to_string());
            }
            args.push(step.cmd.clone());
            args.extend(step.args.iter().cloned());
            VerifyStep {
                name: step.name,
                cmd: "bwrap".to_string(),
                args,
                timeout_secs: step.timeout_secs,
                depends_on_previous: step.depends_on_previous,
            }
        }
    }
}

fn skipped_report(step: &VerifyStep, note: &str) -> StepReport {
    StepReport {
        name: step.name.clone(),
        cmd: step.cmd.clone(),
        args: step.args.clone(),
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        ok: false,
        skipped: true,
        notes: vec![note.to_string()],
    }
}

fn signature_of(report: &Option<StepReport>) -> String {
    report.as_ref().map(|r| r.signature()).unwrap_or_else(|| "ok".to_string())
}

fn report_summary(report: &StepReport) -> String {
    if report.ok {
        return format!("{}: ok", report.name);
    }
    if report.skipped {
        return format!("{}: skipped ({})", report.name, report.notes.join(", "));
    }
    let mut text = format!(
        "{}: exit {:?}\n{}\n{}",
        report.name, report.exit_code, report.stdout, report.stderr
    );
    text = truncate(&text, 2_000);
    text
}

fn truncate(s: &str, n: usize) -> String {
    let mut end = s.len().min(n);
    while end < s.len() && !s.is_char_boundary(end) {
        end += 1;
    }
    s[..end].to_string()
}

fn is_safe_commit_path(path: &str) -> bool {
    for component in path.split('/') {
        if component.starts_with("._") {
            return false;
        }
        if UNSAFE_COMMIT_DIRS.contains(&component) {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
