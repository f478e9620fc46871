//! Assigns opaque on-disk pathnames to encrypted-tree entries so the
//! encrypted folder never reveals plaintext filenames.

use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::filetree::{FileEntry, FileTree};

/// Logical pathnames under this prefix are surfaced in the encrypted folder
/// as `_syncrypto/...` rather than digest-derived paths, so the plaintext
/// side's own rule file is reachable there.
const METADATA_PREFIX: &str = ".syncrypto/";

const MAX_PREFIX_LEN: usize = 32; // full hex-encoded MD5 digest

/// Assigns `entry`'s `fs_pathname` within `encrypted_tree`, mutating
/// `entry` in place. The parent directory of a nested entry must already
/// have an assigned `fs_pathname` in `encrypted_tree`.
///
/// For a pathname under `.syncrypto/`, the mapping is the fixed
/// `_` + remainder rather than a digest prefix. Otherwise the candidate is
/// the shortest unused prefix of `hex(md5(basename))`, starting at two
/// characters, optionally parented under the directory's own
/// `fs_pathname`.
pub fn assign_fs_pathname(entry: &mut FileEntry, encrypted_tree: &FileTree) -> Result<()> {
    if let Some(rest) = entry.pathname.strip_prefix(METADATA_PREFIX) {
        entry.fs_pathname = format!("_{rest}");
        return Ok(());
    }

    let (parent, basename) = entry.split();
    let digest = hex::encode(Md5::digest(basename.as_bytes()));

    let parent_fs_pathname = if parent.is_empty() {
        None
    } else {
        Some(
            encrypted_tree
                .get(parent)
                .map(|p| p.fs_pathname.clone())
                .ok_or_else(|| {
                    Error::GenerateEncryptedFilePathError(entry.pathname.clone())
                })?,
        )
    };

    for len in 2..=MAX_PREFIX_LEN {
        let prefix = &digest[..len];
        let candidate = match &parent_fs_pathname {
            Some(p) => format!("{p}/{prefix}"),
            None => prefix.to_string(),
        };
        if !encrypted_tree.has_fs_pathname(&candidate) {
            entry.fs_pathname = candidate;
            return Ok(());
        }
    }

    Err(Error::GenerateEncryptedFilePathError(entry.pathname.clone()))
}
