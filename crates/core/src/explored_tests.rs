// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn tracker() -> ExploredTracker {
    ExploredTracker::new(10, DedupeMode::Consecutive)
}

#[parameterized(
    ls = { "ls -la src", ExploredCategory::List },
    rg = { "rg TODO src/", ExploredCategory::Search },
    grep_piped = { "cd src && grep -r foo .", ExploredCategory::Search },
    cat = { "cat Cargo.toml", ExploredCategory::Read },
    sed_inplace = { "sed -i s/a/b/ file.txt", ExploredCategory::Write },
    sed_print = { "sed -n 1,10p file.txt", ExploredCategory::Read },
    other = { "cargo build", ExploredCategory::Execute },
)]
fn command_classification(command: &str, expected: ExploredCategory) {
    let (category, _) = classify_command(command);
    assert_eq!(category, expected);
}

#[parameterized(
    read = { "read", ExploredCategory::Read },
    write = { "write", ExploredCategory::Write },
    apply_patch = { "apply_patch", ExploredCategory::Write },
    vsearch = { "vsearch", ExploredCategory::Search },
    exec = { "exec", ExploredCategory::Execute },
    agent = { "agent", ExploredCategory::Agent },
    unknown = { "mystery", ExploredCategory::Tool },
)]
fn tool_classification(tool: &str, expected: ExploredCategory) {
    let (category, _) = classify_tool(tool, "");
    assert_eq!(category, expected);
}

#[test]
fn size_never_exceeds_max_items() {
    let mut tracker = ExploredTracker::new(3, DedupeMode::None);
    for i in 0..10 {
        tracker.record(ExploredCategory::Execute, format!("cmd {}", i), i, "test");
    }
    assert_eq!(tracker.len(), 3);
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot[0].summary, "cmd 7");
    assert_eq!(snapshot[2].summary, "cmd 9");
}

#[test]
fn consecutive_duplicates_collapse_with_count() {
    let mut tracker = tracker();
    for _ in 0..4 {
        tracker.record(ExploredCategory::Search, "rg foo".into(), 1, "test");
    }
    assert_eq!(tracker.len(), 1);
    let entry = &tracker.snapshot()[0];
    assert_eq!(entry.count, 4);
    assert_eq!(entry.display_summary(), "rg foo ×4");
}

#[test]
fn no_adjacent_pair_shares_category_and_summary() {
    let mut tracker = tracker();
    tracker.record(ExploredCategory::Search, "rg a".into(), 1, "t");
    tracker.record(ExploredCategory::Search, "rg a".into(), 2, "t");
    tracker.record(ExploredCategory::Search, "rg b".into(), 3, "t");
    tracker.record(ExploredCategory::Search, "rg a".into(), 4, "t");
    let snapshot = tracker.snapshot();
    for pair in snapshot.windows(2) {
        assert!(
            pair[0].category != pair[1].category || pair[0].summary != pair[1].summary,
            "adjacent duplicates survived"
        );
    }
}

#[test]
fn none_mode_keeps_duplicates() {
    let mut tracker = ExploredTracker::new(10, DedupeMode::None);
    tracker.record(ExploredCategory::Search, "rg a".into(), 1, "t");
    tracker.record(ExploredCategory::Search, "rg a".into(), 2, "t");
    assert_eq!(tracker.len(), 2);
}

#[test]
fn consecutive_reads_merge_with_fanout_cap() {
    let mut tracker = tracker();
    for name in ["a.rs", "b.rs", "c.rs", "d.rs", "e.rs"] {
        tracker.record(ExploredCategory::Read, name.into(), 1, "t");
    }
    assert_eq!(tracker.len(), 1);
    let entry = &tracker.snapshot()[0];
    assert_eq!(entry.display_summary(), "a.rs, b.rs, c.rs (+2 more)");
}

#[test]
fn ingest_command_completion() {
    let mut tracker = tracker();
    let event = AgentEvent::ItemCompleted {
        item: ThreadItem::CommandExecution {
            id: "i1".into(),
            command: "rg needle".into(),
            status: crate::event::CommandStatus::Completed,
            exit_code: Some(0),
            aggregated_output: String::new(),
        },
    };
    tracker.ingest_event(&event, 5, "codex");
    assert_eq!(tracker.len(), 1);
    assert_eq!(tracker.snapshot()[0].category, ExploredCategory::Search);
    assert_eq!(tracker.snapshot()[0].source, "codex");
}

#[test]
fn ingest_file_change_records_writes() {
    let mut tracker = tracker();
    let event = AgentEvent::ItemCompleted {
        item: ThreadItem::FileChange {
            id: "i2".into(),
            changes: vec![
                crate::event::FileChangeEntry {
                    kind: crate::event::FileChangeKind::Update,
                    path: "src/main.rs".into(),
                },
                crate::event::FileChangeEntry {
                    kind: crate::event::FileChangeKind::Add,
                    path: "src/new.rs".into(),
                },
            ],
        },
    };
    tracker.ingest_event(&event, 7, "codex");
    assert_eq!(tracker.len(), 2);
    assert!(tracker.snapshot().iter().all(|e| e.category == ExploredCategory::Write));
}

#[test]
fn streaming_updates_are_ignored() {
    let mut tracker = tracker();
    let event = AgentEvent::ItemUpdated {
        item: ThreadItem::Reasoning { id: "r".into(), text: "thinking".into() },
        delta: Some("thinking".into()),
    };
    tracker.ingest_event(&event, 1, "codex");
    assert!(tracker.is_empty());
}
