// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

fn recipe(steps: Vec<VerifyStep>) -> VerifyRecipe {
    VerifyRecipe { enabled: true, steps }
}

#[tokio::test]
async fn disabled_recipe_runs_nothing() {
    let recipe = VerifyRecipe { enabled: false, steps: vec![VerifyStep::new("x", "false", &[])] };
    let dir = tempfile::tempdir().unwrap();
    let report = run_recipe(&recipe, dir.path(), &HashMap::new(), &cancel()).await.unwrap();
    assert!(!report.enabled);
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn all_green_report() {
    let dir = tempfile::tempdir().unwrap();
    let recipe = recipe(vec![
        VerifyStep::new("install", "true", &[]),
        VerifyStep::new("lint", "echo", &["lint ok"]),
    ]);
    let report = run_recipe(&recipe, dir.path(), &HashMap::new(), &cancel()).await.unwrap();
    assert!(report.ok());
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.step("lint").unwrap().stdout.trim(), "lint ok");
}

#[tokio::test]
async fn dependent_steps_are_skipped_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let recipe = recipe(vec![
        VerifyStep::new("install", "false", &[]),
        VerifyStep::new("lint", "echo", &["ran anyway"]),
        VerifyStep::new("test", "echo", &["should skip"]).dependent(),
    ]);
    let report = run_recipe(&recipe, dir.path(), &HashMap::new(), &cancel()).await.unwrap();
    assert!(!report.ok());

    let lint = report.step("lint").unwrap();
    assert!(!lint.skipped, "independent step must still run");
    assert!(lint.ok);

    let test = report.step("test").unwrap();
    assert!(test.skipped);
    assert_eq!(test.notes, vec!["previous step failed"]);
}

#[tokio::test]
async fn failure_signatures_are_stable_and_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let failing = recipe(vec![VerifyStep::new("test", "sh", &["-c", "echo boom >&2; exit 1"])]);

    let a = run_recipe(&failing, dir.path(), &HashMap::new(), &cancel()).await.unwrap();
    let b = run_recipe(&failing, dir.path(), &HashMap::new(), &cancel()).await.unwrap();
    assert_eq!(a.results[0].signature(), b.results[0].signature());

    let different = recipe(vec![VerifyStep::new("test", "sh", &["-c", "echo other >&2; exit 2"])]);
    let c = run_recipe(&different, dir.path(), &HashMap::new(), &cancel()).await.unwrap();
    assert_ne!(a.results[0].signature(), c.results[0].signature());

    let green = recipe(vec![VerifyStep::new("test", "true", &[])]);
    let d = run_recipe(&green, dir.path(), &HashMap::new(), &cancel()).await.unwrap();
    assert_eq!(d.results[0].signature(), "ok");
}

#[tokio::test]
async fn cancelled_recipe_skips_remaining_steps() {
    let dir = tempfile::tempdir().unwrap();
    let token = cancel();
    token.cancel();
    let recipe = recipe(vec![VerifyStep::new("lint", "echo", &["never"])]);
    let report = run_recipe(&recipe, dir.path(), &HashMap::new(), &token).await.unwrap();
    assert!(report.results[0].skipped);
    assert_eq!(report.results[0].notes, vec!["cancelled"]);
}
