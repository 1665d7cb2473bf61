// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verification recipe detection.

use std::path::Path;

use ads_exec::VerifyStep;
use serde::{Deserialize, Serialize};

/// Install / lint / test steps for one repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapRecipe {
    pub install: Option<VerifyStep>,
    pub lint: Option<VerifyStep>,
    pub test: Option<VerifyStep>,
}

impl BootstrapRecipe {
    pub fn is_empty(&self) -> bool {
        self.install.is_none() && self.lint.is_none() && self.test.is_none()
    }
}

/// Inspect the worktree and pick a stack-appropriate recipe.
pub fn detect_recipe(worktree: &Path) -> BootstrapRecipe {
    if worktree.join("package.json").exists() {
        let install = if worktree.join("package-lock.json").exists() {
            VerifyStep::new("install", "npm", &["ci"])
        } else {
            VerifyStep::new("install", "npm", &["install"])
        };
        return BootstrapRecipe {
            install: Some(install),
            lint: Some(VerifyStep::new("lint", "npm", &["run", "lint", "--if-present"])),
            test: Some(VerifyStep::new("test", "npm", &["run", "test", "--if-present"])),
        };
    }
    if worktree.join("pyproject.toml").exists() || worktree.join("requirements.txt").exists() {
        let install = if worktree.join("requirements.txt").exists() {
            VerifyStep::new("install", "pip", &["install", "-r", "requirements.txt"])
        } else {
            VerifyStep::new("install", "pip", &["install", "-e", "."])
        };
        return BootstrapRecipe {
            install: Some(install),
            lint: Some(VerifyStep::new("lint", "ruff", &["check", "."])),
            test: Some(VerifyStep::new("test", "pytest", &["-q"])),
        };
    }
    if worktree.join("Cargo.toml").exists() {
        return BootstrapRecipe {
            install: Some(VerifyStep::new("install", "cargo", &["fetch"])),
            lint: Some(VerifyStep::new("lint", "cargo", &["check", "--quiet"])),
            test: Some(VerifyStep::new("test", "cargo", &["test", "--quiet"])),
        };
    }
    BootstrapRecipe::default()
}

#[cfg(test)]
#[path = "recipe_tests.rs"]
mod tests;
