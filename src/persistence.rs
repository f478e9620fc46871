//! Persists the encrypted tree (through the crypto codec) and the snapshot
//! tree (zlib-compressed only, never encrypted — it is obscured, not secret)
//! to their fixed locations next to each folder's metadata directory.

use std::fs;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crypto::{compress_fd, decompress_fd, decrypt_fd, encrypt_fd, COMPRESS};
use crate::error::Result;
use crate::filetree::FileTree;

/// `<encrypted_root>/_syncrypto/filetree`
pub fn encrypted_tree_path(encrypted_root: &Path) -> PathBuf {
    encrypted_root.join("_syncrypto").join("filetree")
}

/// `<plain_root>/.syncrypto/trash`
pub fn plain_trash_root(plain_root: &Path) -> PathBuf {
    plain_root.join(".syncrypto").join("trash")
}

/// `<encrypted_root>/_syncrypto/trash`
pub fn encrypted_trash_root(encrypted_root: &Path) -> PathBuf {
    encrypted_root.join("_syncrypto").join("trash")
}

/// `<plain_root>/.syncrypto/rules`
pub fn rule_file_path(plain_root: &Path) -> PathBuf {
    plain_root.join(".syncrypto").join("rules")
}

#[derive(Serialize, Deserialize)]
struct EncryptedTreeDoc {
    #[serde(flatten)]
    tree: FileTree,
    snapshot_tree_name: String,
}

#[derive(Serialize, Deserialize)]
struct SnapshotTreeDoc {
    #[serde(flatten)]
    tree: FileTree,
    trash_name: String,
}

/// Encrypts `tree` (plus `snapshot_tree_name`, so a reader can locate the
/// matching snapshot) through the codec and writes it to
/// `<encrypted_root>/_syncrypto/filetree`.
pub fn save_encrypted_tree(
    encrypted_root: &Path,
    tree: &FileTree,
    snapshot_tree_name: &str,
    password: &[u8],
) -> Result<()> {
    let path = encrypted_tree_path(encrypted_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let doc = EncryptedTreeDoc {
        tree: tree.clone(),
        snapshot_tree_name: snapshot_tree_name.to_string(),
    };
    let json = serde_json::to_vec(&doc)?;
    let mut entry = crate::filetree::FileEntry {
        pathname: ".tmp".into(),
        fs_pathname: ".tmp".into(),
        isdir: false,
        size: 0,
        mtime: 0,
        ctime: 0,
        mode: None,
        digest: None,
        salt: None,
    };
    let mut out = fs::File::create(&path)?;
    encrypt_fd(json.as_slice(), &mut out, &mut entry, COMPRESS, password)?;
    Ok(())
}

/// Reads and decrypts `<encrypted_root>/_syncrypto/filetree`. Returns an
/// empty tree (with an empty snapshot name, `is_new = true`) if the file
/// does not exist yet — a brand-new encrypted folder. If the file exists
/// but fails to decrypt or parse, that's surfaced as `Error::DecryptError`
/// rather than silently treated as "new": a wrong password must not cause
/// the engine to reinitialize and overwrite the existing containers (spec.md
/// §8 scenario 6).
pub fn load_encrypted_tree(encrypted_root: &Path, password: &[u8]) -> Result<(FileTree, String, bool)> {
    let path = encrypted_tree_path(encrypted_root);
    if !path.exists() {
        return Ok((FileTree::new(), String::new(), true));
    }
    let mut file = fs::File::open(&path)?;
    let mut plain = Vec::new();
    decrypt_fd(&mut file, &mut plain, password)?;
    let doc: EncryptedTreeDoc = serde_json::from_slice(&plain)?;
    Ok((doc.tree, doc.snapshot_tree_name, false))
}

/// Default snapshot-tree name: `hex(md5(encrypted_root))`.
pub fn default_snapshot_name(encrypted_root: &Path) -> String {
    hex::encode(Md5::digest(encrypted_root.to_string_lossy().as_bytes()))
}

/// When the encrypted folder is brand-new, a default-named snapshot file
/// might already exist from an unrelated prior history talking to a
/// different encrypted folder at the same path. Salting the name with the
/// current time avoids silently adopting that stale snapshot. Returns the
/// name to use.
pub fn disambiguated_snapshot_name(plain_root: &Path, encrypted_root: &Path, encrypted_folder_is_new: bool) -> String {
    let default_name = default_snapshot_name(encrypted_root);
    if !encrypted_folder_is_new {
        return default_name;
    }
    let default_path = plain_root.join(".syncrypto").join(format!("{default_name}.filetree"));
    if !default_path.exists() {
        return default_name;
    }
    let mut salt = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut salt);
    let salted = format!(
        "{}{}",
        encrypted_root.to_string_lossy(),
        hex::encode(salt)
    );
    hex::encode(Md5::digest(salted.as_bytes()))
}

fn snapshot_tree_path(plain_root: &Path, snapshot_tree_name: &str) -> PathBuf {
    plain_root
        .join(".syncrypto")
        .join(format!("{snapshot_tree_name}.filetree"))
}

/// zlib-compresses `tree` (plus `trash_name`) to
/// `<plain_root>/.syncrypto/<snapshot_tree_name>.filetree`. Never encrypted.
pub fn save_snapshot_tree(
    plain_root: &Path,
    snapshot_tree_name: &str,
    tree: &FileTree,
    trash_name: &str,
) -> Result<()> {
    let path = snapshot_tree_path(plain_root, snapshot_tree_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let doc = SnapshotTreeDoc {
        tree: tree.clone(),
        trash_name: trash_name.to_string(),
    };
    let json = serde_json::to_vec(&doc)?;
    let mut out = fs::File::create(&path)?;
    compress_fd(json.as_slice(), &mut out)?;
    Ok(())
}

/// Reads and decompresses the snapshot tree. Returns an empty tree if it
/// does not exist yet or fails to parse (a corrupted snapshot is treated as
/// "nothing is known", forcing a full reconciliation against the current
/// encrypted tree on the next sync).
pub fn load_snapshot_tree(plain_root: &Path, snapshot_tree_name: &str) -> FileTree {
    let path = snapshot_tree_path(plain_root, snapshot_tree_name);
    if !path.exists() {
        return FileTree::new();
    }
    let result = fs::File::open(&path).and_then(|f| {
        let mut json = Vec::new();
        decompress_fd(f, &mut json)?;
        serde_json::from_slice::<SnapshotTreeDoc>(&json).map_err(std::io::Error::other)
    });
    result.map(|doc| doc.tree).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypted_tree_roundtrips_through_codec() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = FileTree::new();
        tree.set(
            "a.txt",
            crate::filetree::FileEntry {
                pathname: "a.txt".into(),
                fs_pathname: "3f".into(),
                isdir: false,
                size: 3,
                mtime: 1,
                ctime: 1,
                mode: None,
                digest: Some([0u8; 16]),
                salt: Some([1u8; 12]),
            },
        );

        save_encrypted_tree(dir.path(), &tree, "snapshot123", b"pw").unwrap();
        let (loaded, name, is_new) = load_encrypted_tree(dir.path(), b"pw").unwrap();
        assert!(!is_new);
        assert_eq!(name, "snapshot123");
        assert!(loaded.has("a.txt"));
    }

    #[test]
    fn missing_encrypted_tree_reports_new() {
        let dir = tempfile::tempdir().unwrap();
        let (tree, _, is_new) = load_encrypted_tree(dir.path(), b"pw").unwrap();
        assert!(is_new);
        assert!(tree.is_empty());
    }

    #[test]
    fn wrong_password_surfaces_as_decrypt_error_not_new() {
        let dir = tempfile::tempdir().unwrap();
        let tree = FileTree::new();
        save_encrypted_tree(dir.path(), &tree, "snap", b"correct horse").unwrap();
        let err = load_encrypted_tree(dir.path(), b"wrong password").unwrap_err();
        assert!(matches!(err, crate::error::Error::DecryptError(_)));
    }

    #[test]
    fn snapshot_tree_roundtrips_without_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = FileTree::new();
        tree.set(
            "a.txt",
            crate::filetree::FileEntry {
                pathname: "a.txt".into(),
                fs_pathname: "a.txt".into(),
                isdir: false,
                size: 3,
                mtime: 1,
                ctime: 1,
                mode: None,
                digest: None,
                salt: None,
            },
        );
        save_snapshot_tree(dir.path(), "abc123", &tree, "2026-01-01T00_00_00").unwrap();
        let loaded = load_snapshot_tree(dir.path(), "abc123");
        assert!(loaded.has("a.txt"));
    }

    #[test]
    fn disambiguation_only_salts_when_stale_default_name_exists() {
        let dir = tempfile::tempdir().unwrap();
        let encrypted_root = Path::new("/some/encrypted/root");
        let name = disambiguated_snapshot_name(dir.path(), encrypted_root, true);
        assert_eq!(name, default_snapshot_name(encrypted_root));

        let stale_path = dir
            .path()
            .join(".syncrypto")
            .join(format!("{name}.filetree"));
        fs::create_dir_all(stale_path.parent().unwrap()).unwrap();
        fs::write(&stale_path, b"stale").unwrap();

        let salted = disambiguated_snapshot_name(dir.path(), encrypted_root, true);
        assert_ne!(salted, name);
    }

    #[test]
    fn disambiguation_is_noop_when_folder_is_not_new() {
        let dir = tempfile::tempdir().unwrap();
        let encrypted_root = Path::new("/some/encrypted/root");
        let name = disambiguated_snapshot_name(dir.path(), encrypted_root, false);
        assert_eq!(name, default_snapshot_name(encrypted_root));
    }
}
