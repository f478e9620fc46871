//! Trash path allocation. Displaced files are moved rather than deleted, so
//! a clobbered version stays recoverable.

use std::path::{Path, PathBuf};

use chrono::Local;

/// Generates an ISO-8601-like timestamp with `:` replaced by `_` (so it is
/// safe as a single path component on filesystems that disallow `:`),
/// suitable for use once per sync as the shared trash-run directory name.
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%dT%H_%M_%S%.f").to_string()
}

/// Finds the first unused `<trash_root>/<timestamp>[.N]` directory,
/// appending a numeric suffix on collision (two syncs started within the
/// same sub-second tick, or a clock rollback).
pub fn allocate_trash_run_dir(trash_root: &Path, timestamp: &str) -> PathBuf {
    let mut candidate = trash_root.join(timestamp);
    let mut suffix = 0u32;
    while candidate.exists() {
        suffix += 1;
        candidate = trash_root.join(format!("{timestamp}.{suffix}"));
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_no_colons() {
        assert!(!timestamp_now().contains(':'));
    }

    #[test]
    fn allocate_run_dir_avoids_existing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let first = allocate_trash_run_dir(dir.path(), "2026-01-01T00_00_00");
        std::fs::create_dir_all(&first).unwrap();
        let second = allocate_trash_run_dir(dir.path(), "2026-01-01T00_00_00");
        assert_ne!(first, second);
        assert!(second.ends_with("2026-01-01T00_00_00.1"));
    }
}
