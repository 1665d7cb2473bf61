// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered verification runner.
//!
//! Runs a recipe's steps through the command runner and produces a
//! structured report. A failed step only short-circuits the steps that
//! declare a dependency on their predecessors; independent steps still run.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::command::{run, CommandSpec, ExecError};

/// One verification step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyStep {
    /// Stable step name ("install", "lint", "test").
    pub name: String,
    pub cmd: String,
    pub args: Vec<String>,
    #[serde(default = "default_step_timeout_secs")]
    pub timeout_secs: u64,
    /// Skip this step when an earlier step already failed.
    #[serde(default)]
    pub depends_on_previous: bool,
}

fn default_step_timeout_secs() -> u64 {
    600
}

impl VerifyStep {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs: default_step_timeout_secs(),
            depends_on_previous: false,
        }
    }

    pub fn dependent(mut self) -> Self {
        self.depends_on_previous = true;
        self
    }
}

/// An ordered verification recipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRecipe {
    pub enabled: bool,
    pub steps: Vec<VerifyStep>,
}

/// Outcome of a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub cmd: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub ok: bool,
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl StepReport {
    fn skipped(step: &VerifyStep, note: impl Into<String>) -> Self {
        Self {
            name: step.name.clone(),
            cmd: step.cmd.clone(),
            args: step.args.clone(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            ok: false,
            skipped: true,
            notes: vec![note.into()],
        }
    }

    /// Compact failure signature: stable across retries of the same failure,
    /// different for different failures.
    pub fn signature(&self) -> String {
        if self.ok {
            return "ok".to_string();
        }
        if self.skipped {
            return format!("skipped:{}", self.notes.join(","));
        }
        let mut hasher = Sha256::new();
        hasher.update(self.cmd.as_bytes());
        hasher.update([0]);
        hasher.update(format!("{:?}", self.exit_code).as_bytes());
        hasher.update([0]);
        // Tail of the output is where compilers/test runners summarize.
        hasher.update(tail(&self.stderr, 400).as_bytes());
        hasher.update(tail(&self.stdout, 400).as_bytes());
        let digest = hasher.finalize();
        format!("{:02x}{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2], digest[3])
    }
}

/// Last `n` bytes of `s`, adjusted forward to a char boundary.
fn tail(s: &str, n: usize) -> &str {
    let mut start = s.len().saturating_sub(n);
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Full recipe report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub enabled: bool,
    pub results: Vec<StepReport>,
}

impl VerifyReport {
    pub fn ok(&self) -> bool {
        self.enabled && self.results.iter().all(|r| r.ok)
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Run one step on its own and return its report.
pub async fn run_recipe_step(
    step: &VerifyStep,
    cwd: &Path,
    env: &HashMap<String, String>,
    cancel: &CancellationToken,
) -> Result<StepReport, ExecError> {
    let recipe = VerifyRecipe { enabled: true, steps: vec![step.clone()] };
    let mut report = run_recipe(&recipe, cwd, env, cancel).await?;
    report
        .results
        .pop()
        .ok_or_else(|| ExecError::Io(std::io::Error::other("empty step report")))
}

/// Run a recipe in `cwd`. Cancellation kills the current step and skips
/// the rest.
pub async fn run_recipe(
    recipe: &VerifyRecipe,
    cwd: &Path,
    env: &HashMap<String, String>,
    cancel: &CancellationToken,
) -> Result<VerifyReport, ExecError> {
    if !recipe.enabled {
        return Ok(VerifyReport { enabled: false, results: Vec::new() });
    }

    let mut results = Vec::with_capacity(recipe.steps.len());
    let mut failed = false;
    for step in &recipe.steps {
        if failed && step.depends_on_previous {
            results.push(StepReport::skipped(step, "previous step failed"));
            continue;
        }
        if cancel.is_cancelled() {
            results.push(StepReport::skipped(step, "cancelled"));
            continue;
        }

        let mut spec = CommandSpec::new(&step.cmd)
            .args(step.args.clone())
            .cwd(cwd)
            .timeout(Duration::from_secs(step.timeout_secs));
        for (key, value) in env {
            spec = spec.env(key.clone(), value.clone());
        }
        let outcome = run(spec, cancel).await?;

        let mut notes = Vec::new();
        if outcome.timed_out {
            notes.push(format!("timed out after {}s", step.timeout_secs));
        } else if outcome.killed {
            notes.push("cancelled".to_string());
        }
        if outcome.stdout_truncated || outcome.stderr_truncated {
            notes.push("output truncated".to_string());
        }

        let ok = outcome.ok();
        results.push(StepReport {
            name: step.name.clone(),
            cmd: step.cmd.clone(),
            args: step.args.clone(),
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            ok,
            skipped: false,
            notes,
        });
        if !ok {
            failed = true;
        }
    }

    Ok(VerifyReport { enabled: true, results })
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
