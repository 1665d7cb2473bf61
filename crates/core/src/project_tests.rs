// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn derive_is_deterministic() {
    let a = ProjectId::derive(Path::new("/tmp/ws"));
    let b = ProjectId::derive(Path::new("/tmp/ws"));
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 12);
}

#[test]
fn different_roots_differ() {
    let a = ProjectId::derive(Path::new("/tmp/ws-a"));
    let b = ProjectId::derive(Path::new("/tmp/ws-b"));
    assert_ne!(a, b);
}

#[test]
fn session_id_is_prefixed() {
    let sid = derive_project_session_id(Path::new("/tmp/ws"));
    assert!(sid.starts_with("proj:"));
    assert_eq!(sid.len(), "proj:".len() + 12);
}

#[test]
fn canonical_resolves_symlinks() {
    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("real");
    std::fs::create_dir(&real).unwrap();
    let link = dir.path().join("link");
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let canon_real = canonical_workspace_root(&real).unwrap();
        let canon_link = canonical_workspace_root(&link).unwrap();
        assert_eq!(canon_real, canon_link);
        assert_eq!(ProjectId::derive(&canon_real), ProjectId::derive(&canon_link));
    }
}
