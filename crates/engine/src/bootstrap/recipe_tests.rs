// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn touch(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), "{}").unwrap();
}

#[test]
fn node_repo_uses_npm() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "package.json");
    let recipe = detect_recipe(dir.path());
    assert_eq!(recipe.install.unwrap().cmd, "npm");
    assert_eq!(recipe.lint.unwrap().args[1], "lint");
}

#[test]
fn lockfile_prefers_npm_ci() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "package.json");
    touch(dir.path(), "package-lock.json");
    let recipe = detect_recipe(dir.path());
    assert_eq!(recipe.install.unwrap().args, vec!["ci"]);
}

#[test]
fn python_repo_uses_pip_ruff_pytest() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "pyproject.toml");
    let recipe = detect_recipe(dir.path());
    assert_eq!(recipe.install.unwrap().cmd, "pip");
    assert_eq!(recipe.lint.unwrap().cmd, "ruff");
    assert_eq!(recipe.test.unwrap().cmd, "pytest");
}

#[test]
fn rust_repo_uses_cargo() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "Cargo.toml");
    let recipe = detect_recipe(dir.path());
    assert_eq!(recipe.test.unwrap().cmd, "cargo");
}

#[test]
fn unknown_repo_yields_empty_recipe() {
    let dir = tempfile::tempdir().unwrap();
    assert!(detect_recipe(dir.path()).is_empty());
}
