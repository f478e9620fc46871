//! Integration tests for `FileTree::from_fs` and the rule engine acting on a
//! real directory tree (spec.md §3-4.C), exercised only through the crate's
//! public API.

use std::fs;

use syncrypto::{FileRule, FileRuleSet, RuleAction};

#[test]
fn scan_builds_pathnames_with_forward_slashes_regardless_of_nesting() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("a/b")).unwrap();
    fs::write(dir.path().join("a/b/c.txt"), b"hi").unwrap();
    fs::write(dir.path().join("top.txt"), b"hello").unwrap();

    let tree = syncrypto::FileTree::from_fs(dir.path(), None).unwrap();
    assert!(tree.has("a"));
    assert!(tree.has("a/b"));
    assert!(tree.has("a/b/c.txt"));
    assert!(tree.has("top.txt"));
    assert_eq!(tree.get("a").unwrap().isdir, true);
    assert_eq!(tree.get("a/b/c.txt").unwrap().isdir, false);
}

#[test]
fn scan_respects_rule_set_exclusions() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("filename_sync"), b"1").unwrap();
    fs::write(dir.path().join("filename_not_sync"), b"2").unwrap();

    let mut rules = FileRuleSet::new();
    rules.add_rule(FileRule::new("name", "match", "*_not_sync", RuleAction::Exclude).unwrap());

    let tree = syncrypto::FileTree::from_fs(dir.path(), Some(&rules)).unwrap();
    assert!(tree.has("filename_sync"));
    assert!(!tree.has("filename_not_sync"));
}

#[test]
fn scan_never_visits_metadata_directories() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".syncrypto")).unwrap();
    fs::write(dir.path().join(".syncrypto/rules"), b"# rules").unwrap();
    fs::create_dir_all(dir.path().join("_syncrypto")).unwrap();
    fs::write(dir.path().join("_syncrypto/filetree"), b"junk").unwrap();
    fs::write(dir.path().join("visible.txt"), b"ok").unwrap();

    let tree = syncrypto::FileTree::from_fs(dir.path(), None).unwrap();
    assert!(tree.has("visible.txt"));
    assert!(tree.pathnames().all(|p| !p.starts_with(".syncrypto") && !p.starts_with("_syncrypto")));
}

#[test]
fn small_files_get_digests_large_files_do_not() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("small.txt"), vec![0u8; 100]).unwrap();
    fs::write(dir.path().join("big.bin"), vec![0u8; 20_000]).unwrap();

    let tree = syncrypto::FileTree::from_fs(dir.path(), None).unwrap();
    assert!(tree.get("small.txt").unwrap().digest.is_some());
    assert!(tree.get("big.bin").unwrap().digest.is_none());
}
