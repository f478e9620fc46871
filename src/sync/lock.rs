//! Cross-process advisory exclusion rooted at each synced folder.
//!
//! A sync acquires the encrypted folder's lock first, then the plaintext
//! folder's — that order is invariant and must never be reversed, since two
//! processes racing to sync the same pair in opposite orders could deadlock.

use std::fs::{self, File};
use std::path::Path;

use fs2::FileExt;

use crate::error::Result;

const LOCK_FILE_NAME: &str = ".syncrypto.lock";

/// An exclusive lock rooted at one folder, held for the duration of a sync.
/// Released on drop.
pub struct FolderLock {
    file: File,
}

impl FolderLock {
    /// Blocks until an exclusive lock on `<folder>/.syncrypto.lock` is
    /// acquired. There is no timeout; contention simply waits.
    pub fn acquire(folder: &Path) -> Result<Self> {
        fs::create_dir_all(folder)?;
        let file = File::create(folder.join(LOCK_FILE_NAME))?;
        file.lock_exclusive()?;
        Ok(FolderLock { file })
    }
}

impl Drop for FolderLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Acquires both folder locks in the mandated order: encrypted folder
/// first, then the plaintext folder.
pub struct SyncLocks {
    #[allow(dead_code)]
    encrypted: FolderLock,
    #[allow(dead_code)]
    plain: FolderLock,
}

impl SyncLocks {
    pub fn acquire(encrypted_root: &Path, plain_root: &Path) -> Result<Self> {
        let encrypted = FolderLock::acquire(encrypted_root)?;
        let plain = FolderLock::acquire(plain_root)?;
        Ok(SyncLocks { encrypted, plain })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_and_releases_both_locks() {
        let enc = tempfile::tempdir().unwrap();
        let plain = tempfile::tempdir().unwrap();
        {
            let _locks = SyncLocks::acquire(enc.path(), plain.path()).unwrap();
        }
        // Lock files are dropped; a second acquisition must not block.
        let _locks = SyncLocks::acquire(enc.path(), plain.path()).unwrap();
    }
}
