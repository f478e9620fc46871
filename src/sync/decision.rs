//! The three-way diff: per-pathname action selection from the plaintext,
//! encrypted and snapshot trees.

use crate::filetree::{FileEntry, FileRuleSet, RuleAction};

/// What to do with one pathname this sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Encrypt,
    Decrypt,
    RemovePlain,
    RemoveEncrypted,
    Same,
    Conflict,
    Ignore,
}

/// Two entries are `equal` when both are directories, or both are files
/// whose digests agree (if both are known) or whose size and truncated
/// mtime agree (when a digest is missing on either side, e.g. large files).
fn equal(a: &FileEntry, b: &FileEntry) -> bool {
    if a.isdir && b.isdir {
        return true;
    }
    if a.isdir != b.isdir {
        return false;
    }
    match (a.digest, b.digest) {
        (Some(da), Some(db)) => da == db,
        _ => a.size == b.size && a.mtime == b.mtime,
    }
}

fn is_ignored(rule_set: &FileRuleSet, plain: Option<&FileEntry>, encrypted: Option<&FileEntry>) -> bool {
    let plain_ignored = plain.map(|p| rule_set.test(p) != RuleAction::Include).unwrap_or(false);
    let encrypted_ignored = encrypted
        .map(|e| rule_set.test(e) != RuleAction::Include)
        .unwrap_or(false);
    plain_ignored || encrypted_ignored
}

/// Decides the action for one pathname. A brand-new encrypted folder starts
/// with an empty encrypted tree, so every plaintext entry lands in the
/// `(Some(p), None)` arm below with no snapshot to match against, which
/// already resolves to `Encrypt` — matching the "first sync against a
/// brand-new encrypted folder" case in spec.md's table without a separate
/// guard.
pub fn compare_file(
    rule_set: &FileRuleSet,
    plain: Option<&FileEntry>,
    encrypted: Option<&FileEntry>,
    snapshot: Option<&FileEntry>,
) -> SyncAction {
    if is_ignored(rule_set, plain, encrypted) {
        return SyncAction::Ignore;
    }

    match (plain, encrypted) {
        (Some(p), Some(e)) => {
            if equal(p, e) {
                return SyncAction::Same;
            }
            let p_matches_snapshot = snapshot.map(|s| equal(p, s)).unwrap_or(false);
            let e_matches_snapshot = snapshot.map(|s| equal(e, s)).unwrap_or(false);
            match (p_matches_snapshot, e_matches_snapshot) {
                (false, true) => SyncAction::Encrypt,
                (true, false) => SyncAction::Decrypt,
                (true, true) => SyncAction::Same,
                (false, false) => SyncAction::Conflict,
            }
        }
        (Some(p), None) => {
            let unchanged_since_snapshot = snapshot.map(|s| equal(p, s)).unwrap_or(false);
            if unchanged_since_snapshot {
                SyncAction::RemovePlain
            } else {
                SyncAction::Encrypt
            }
        }
        (None, Some(e)) => {
            let unchanged_since_snapshot = snapshot.map(|s| equal(e, s)).unwrap_or(false);
            if unchanged_since_snapshot {
                SyncAction::RemoveEncrypted
            } else {
                SyncAction::Decrypt
            }
        }
        (None, None) => SyncAction::Same,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pathname: &str, isdir: bool, digest: Option<[u8; 16]>, mtime: i64, size: u64) -> FileEntry {
        FileEntry {
            pathname: pathname.into(),
            fs_pathname: pathname.into(),
            isdir,
            size,
            mtime,
            ctime: mtime,
            mode: None,
            digest,
            salt: None,
        }
    }

    #[test]
    fn equal_entries_are_same() {
        let rules = FileRuleSet::new();
        let p = entry("a", false, Some([1; 16]), 10, 5);
        let e = entry("a", false, Some([1; 16]), 99, 5);
        assert_eq!(
            compare_file(&rules, Some(&p), Some(&e), None),
            SyncAction::Same
        );
    }

    #[test]
    fn only_plain_changed_since_snapshot_encrypts() {
        let rules = FileRuleSet::new();
        let p = entry("a", false, Some([2; 16]), 20, 5);
        let e = entry("a", false, Some([1; 16]), 10, 5);
        let s = entry("a", false, Some([1; 16]), 10, 5);
        assert_eq!(
            compare_file(&rules, Some(&p), Some(&e), Some(&s)),
            SyncAction::Encrypt
        );
    }

    #[test]
    fn only_encrypted_changed_since_snapshot_decrypts() {
        let rules = FileRuleSet::new();
        let p = entry("a", false, Some([1; 16]), 10, 5);
        let e = entry("a", false, Some([2; 16]), 20, 5);
        let s = entry("a", false, Some([1; 16]), 10, 5);
        assert_eq!(
            compare_file(&rules, Some(&p), Some(&e), Some(&s)),
            SyncAction::Decrypt
        );
    }

    #[test]
    fn both_changed_since_snapshot_conflicts() {
        let rules = FileRuleSet::new();
        let p = entry("a", false, Some([2; 16]), 20, 5);
        let e = entry("a", false, Some([3; 16]), 30, 5);
        let s = entry("a", false, Some([1; 16]), 10, 5);
        assert_eq!(
            compare_file(&rules, Some(&p), Some(&e), Some(&s)),
            SyncAction::Conflict
        );
    }

    #[test]
    fn only_plain_present_new_since_snapshot_encrypts() {
        let rules = FileRuleSet::new();
        let p = entry("a", false, Some([1; 16]), 10, 5);
        assert_eq!(
            compare_file(&rules, Some(&p), None, None),
            SyncAction::Encrypt
        );
    }

    #[test]
    fn only_plain_present_unchanged_since_snapshot_removes_plain() {
        let rules = FileRuleSet::new();
        let p = entry("a", false, Some([1; 16]), 10, 5);
        let s = entry("a", false, Some([1; 16]), 10, 5);
        assert_eq!(
            compare_file(&rules, Some(&p), None, Some(&s)),
            SyncAction::RemovePlain
        );
    }

    #[test]
    fn only_encrypted_present_unchanged_since_snapshot_removes_encrypted() {
        let rules = FileRuleSet::new();
        let e = entry("a", false, Some([1; 16]), 10, 5);
        let s = entry("a", false, Some([1; 16]), 10, 5);
        assert_eq!(
            compare_file(&rules, None, Some(&e), Some(&s)),
            SyncAction::RemoveEncrypted
        );
    }

    #[test]
    fn plain_only_with_no_snapshot_encrypts() {
        // A brand-new encrypted folder starts with an empty tree and no
        // snapshot, so every plaintext entry lands here and encrypts —
        // this is the real mechanism behind "first sync forces encrypt".
        let rules = FileRuleSet::new();
        let p = entry("a", false, Some([1; 16]), 10, 5);
        assert_eq!(
            compare_file(&rules, Some(&p), None, None),
            SyncAction::Encrypt
        );
    }

    #[test]
    fn ignore_wins_when_either_side_is_excluded() {
        let mut rules = FileRuleSet::new();
        rules.add_rule(
            crate::filetree::FileRule::new("name", "match", "*.tmp", RuleAction::Exclude).unwrap(),
        );
        let p = entry("a.tmp", false, Some([1; 16]), 10, 5);
        assert_eq!(
            compare_file(&rules, Some(&p), None, None),
            SyncAction::Ignore
        );
    }
}
