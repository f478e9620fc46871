//! The sync engine: drives the three-way diff across every pathname,
//! materialises the chosen actions to both filesystems, and manages trash
//! and metadata persistence.

pub mod decision;
pub mod lock;
pub mod trash;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::crypto::{self, Password};
use crate::error::{Error, Result};
use crate::filetree::{FileEntry, FileRuleSet, FileTree};
use crate::mapper;
use crate::persistence;
use crate::sync::decision::{compare_file, SyncAction};
use crate::sync::lock::SyncLocks;

const DEFAULT_RULES: &str = include_str!("default_rules.txt");

/// The engine's constructor inputs. Corresponds to the typed configuration
/// a driver (the CLI, or any other embedder) builds and feeds into the
/// core rather than the core parsing argv itself.
pub struct SyncEngine {
    encrypted_root: PathBuf,
    plain_root: PathBuf,
    password: Password,
    rule_set: FileRuleSet,
}

impl SyncEngine {
    /// Creates both folders if missing, rejects either one containing the
    /// other side's marker directory, and loads the rule file (writing a
    /// default one, seeded with common OS/editor noise patterns, if the
    /// plaintext folder has none yet).
    pub fn new(
        encrypted_root: impl Into<PathBuf>,
        plain_root: impl Into<PathBuf>,
        password: Password,
        mut rule_set: Option<FileRuleSet>,
        rule_file: Option<PathBuf>,
    ) -> Result<Self> {
        let encrypted_root = encrypted_root.into();
        let plain_root = plain_root.into();

        ensure_folder(&encrypted_root)?;
        ensure_folder(&plain_root)?;

        if encrypted_root.join(".syncrypto").is_dir() {
            return Err(Error::InvalidFolder(format!(
                "{} looks like a plaintext folder (contains .syncrypto/)",
                encrypted_root.display()
            )));
        }
        if plain_root.join("_syncrypto").is_dir() {
            return Err(Error::InvalidFolder(format!(
                "{} looks like an encrypted folder (contains _syncrypto/)",
                plain_root.display()
            )));
        }

        let mut rule_set = rule_set.take().unwrap_or_default();
        let rule_path = rule_file.unwrap_or_else(|| persistence::rule_file_path(&plain_root));
        if !rule_path.exists() {
            if let Some(parent) = rule_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&rule_path, DEFAULT_RULES)?;
        }
        let contents = fs::read_to_string(&rule_path)?;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            rule_set.add_rule(FileRuleSet::parse_line(line)?);
        }

        Ok(SyncEngine {
            encrypted_root,
            plain_root,
            password,
            rule_set,
        })
    }

    /// Runs one full sync: scan, diff, apply, persist. Returns the action
    /// taken for every pathname seen, in the order applied.
    pub fn sync_folder(&self) -> Result<Vec<(String, SyncAction)>> {
        let _locks = SyncLocks::acquire(&self.encrypted_root, &self.plain_root)?;

        info!(
            "starting sync between encrypted folder {} and plaintext folder {}",
            self.encrypted_root.display(),
            self.plain_root.display()
        );

        let mut plain_tree = FileTree::from_fs(&self.plain_root, Some(&self.rule_set))?;
        let (mut encrypted_tree, loaded_snapshot_name, encrypted_folder_is_new) =
            persistence::load_encrypted_tree(&self.encrypted_root, self.password.as_bytes())?;

        let snapshot_tree_name = if encrypted_folder_is_new {
            persistence::disambiguated_snapshot_name(&self.plain_root, &self.encrypted_root, true)
        } else if loaded_snapshot_name.is_empty() {
            persistence::default_snapshot_name(&self.encrypted_root)
        } else {
            loaded_snapshot_name
        };
        let snapshot_tree = persistence::load_snapshot_tree(&self.plain_root, &snapshot_tree_name);

        debug!("encrypted_tree:\n{encrypted_tree}");
        debug!("plain_tree:\n{plain_tree}");
        debug!("snapshot_tree:\n{snapshot_tree}");

        let mut pathnames: BTreeSet<String> = BTreeSet::new();
        pathnames.extend(plain_tree.pathnames().cloned());
        pathnames.extend(encrypted_tree.pathnames().cloned());

        let mut encrypted_remove_list = Vec::new();
        let mut plain_remove_list = Vec::new();
        let mut skip_prefixes: Vec<String> = Vec::new();
        let mut results = Vec::new();

        for pathname in pathnames {
            if skip_prefixes
                .iter()
                .any(|p| pathname == *p || pathname.starts_with(&format!("{p}/")))
            {
                continue;
            }

            let plain = plain_tree.get(&pathname).cloned();
            let encrypted = encrypted_tree.get(&pathname).cloned();
            let snapshot = snapshot_tree.get(&pathname).cloned();

            let action = compare_file(
                &self.rule_set,
                plain.as_ref(),
                encrypted.as_ref(),
                snapshot.as_ref(),
            );
            debug!("{pathname}: {action:?}");

            match action {
                SyncAction::RemoveEncrypted => encrypted_remove_list.push(pathname.clone()),
                SyncAction::RemovePlain => plain_remove_list.push(pathname.clone()),
                SyncAction::Encrypt => {
                    self.encrypt_one(&pathname, &mut plain_tree, &mut encrypted_tree)?;
                }
                SyncAction::Decrypt => {
                    self.decrypt_one(&pathname, &mut plain_tree, &mut encrypted_tree)?;
                }
                SyncAction::Conflict => {
                    let (p, e) = (plain.as_ref().unwrap(), encrypted.as_ref().unwrap());
                    if p.isdir != e.isdir {
                        // Directory side wins; descendants are settled by
                        // this one decision for the rest of the run.
                        skip_prefixes.push(pathname.clone());
                        if e.isdir {
                            self.decrypt_one(&pathname, &mut plain_tree, &mut encrypted_tree)?;
                        } else {
                            self.encrypt_one(&pathname, &mut plain_tree, &mut encrypted_tree)?;
                        }
                    } else {
                        self.resolve_conflict(&pathname, p)?;
                        self.decrypt_one(&pathname, &mut plain_tree, &mut encrypted_tree)?;
                    }
                }
                SyncAction::Ignore => {
                    if encrypted_tree.has(&pathname) {
                        encrypted_remove_list.push(pathname.clone());
                    }
                }
                SyncAction::Same => {}
            }
            results.push((pathname, action));
        }

        let trash_timestamp = trash::timestamp_now();
        for pathname in &encrypted_remove_list {
            self.delete_from_encrypted(pathname, &mut encrypted_tree, &trash_timestamp)?;
        }
        for pathname in &plain_remove_list {
            self.delete_from_plain(pathname, &mut plain_tree, &trash_timestamp)?;
        }

        revise_folder_mtimes(&encrypted_tree, &self.encrypted_root)?;
        revise_folder_mtimes(&plain_tree, &self.plain_root)?;

        persistence::save_encrypted_tree(
            &self.encrypted_root,
            &encrypted_tree,
            &snapshot_tree_name,
            self.password.as_bytes(),
        )?;
        persistence::save_snapshot_tree(
            &self.plain_root,
            &snapshot_tree_name,
            &encrypted_tree,
            &trash_timestamp,
        )?;

        info!(
            "finished sync between encrypted folder {} and plaintext folder {}",
            self.encrypted_root.display(),
            self.plain_root.display()
        );

        Ok(results)
    }

    /// Decrypts every file in the encrypted tree with the current password
    /// and re-encrypts it in place with `new_password`, then rewrites the
    /// persisted encrypted tree. Fails without touching anything when the
    /// two passwords are equal.
    pub fn change_password(&mut self, new_password: Password) -> Result<()> {
        change_password_in_place(&self.encrypted_root, self.password.as_bytes(), new_password.as_bytes())?;
        self.password = new_password;
        Ok(())
    }

    pub fn encrypted_root(&self) -> &Path {
        &self.encrypted_root
    }

    pub fn plain_root(&self) -> &Path {
        &self.plain_root
    }

    fn encrypt_one(
        &self,
        pathname: &str,
        plain_tree: &mut FileTree,
        encrypted_tree: &mut FileTree,
    ) -> Result<()> {
        let plain_entry = plain_tree.get(pathname).expect("decided entries exist").clone();
        let plain_path = plain_entry.fs_path(&self.plain_root);

        let mut encrypted_entry = match encrypted_tree.get(pathname) {
            Some(existing) => existing.clone(),
            None => {
                let mut fresh = plain_entry.clone();
                mapper::assign_fs_pathname(&mut fresh, encrypted_tree)?;
                fresh
            }
        };
        let encrypted_path = encrypted_entry.fs_path(&self.encrypted_root);

        if plain_entry.isdir {
            fs::create_dir_all(&encrypted_path)?;
        } else {
            if encrypted_path.is_dir() {
                fs::remove_dir_all(&encrypted_path)?;
            }
            if let Some(parent) = encrypted_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut src = fs::File::open(&plain_path)?;
            let mut dst = fs::File::create(&encrypted_path)?;
            crypto::encrypt_fd(
                &mut src,
                &mut dst,
                &mut encrypted_entry,
                crypto::COMPRESS,
                self.password.as_bytes(),
            )?;
        }
        encrypted_entry.copy_attr_from(&plain_entry);
        apply_metadata(&encrypted_path, &encrypted_entry)?;
        info!("encrypted {} to {}", plain_entry.fs_pathname, encrypted_entry.fs_pathname);
        encrypted_tree.set(pathname.to_string(), encrypted_entry);
        Ok(())
    }

    fn decrypt_one(
        &self,
        pathname: &str,
        plain_tree: &mut FileTree,
        encrypted_tree: &mut FileTree,
    ) -> Result<()> {
        let encrypted_entry = encrypted_tree.get(pathname).expect("decided entries exist").clone();
        let encrypted_path = encrypted_entry.fs_path(&self.encrypted_root);

        let mut plain_entry = match plain_tree.get(pathname) {
            Some(existing) => existing.clone(),
            None => {
                let mut fresh = encrypted_entry.clone();
                fresh.fs_pathname = fresh.pathname.clone();
                fresh
            }
        };
        let plain_path = plain_entry.fs_path(&self.plain_root);

        if encrypted_entry.isdir {
            fs::create_dir_all(&plain_path)?;
        } else {
            if plain_path.is_dir() {
                fs::remove_dir_all(&plain_path)?;
            }
            if let Some(parent) = plain_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut src = fs::File::open(&encrypted_path)?;
            let mut dst = fs::File::create(&plain_path)?;
            crypto::decrypt_fd(&mut src, &mut dst, self.password.as_bytes())?;
        }
        plain_entry.copy_attr_from(&encrypted_entry);
        apply_metadata(&plain_path, &plain_entry)?;
        info!("decrypted {} to {}", encrypted_entry.fs_pathname, plain_entry.fs_pathname);
        plain_tree.set(pathname.to_string(), plain_entry);
        Ok(())
    }

    /// Moves the existing plaintext file aside to `<name>.conflict<.ext>`
    /// (or `<name>.conflict.<N><.ext>` on collision) before the decrypt
    /// that follows overwrites the original path.
    fn resolve_conflict(&self, pathname: &str, plain_entry: &FileEntry) -> Result<()> {
        let plain_path = plain_entry.fs_path(&self.plain_root);
        if !plain_path.exists() {
            return Ok(());
        }
        let conflict_path = conflict_sibling_path(&plain_path)?;
        fs::rename(&plain_path, &conflict_path)?;
        warn!(
            "conflict on {pathname}: kept plaintext version as {}",
            conflict_path.display()
        );
        Ok(())
    }

    fn delete_from_encrypted(
        &self,
        pathname: &str,
        tree: &mut FileTree,
        timestamp: &str,
    ) -> Result<()> {
        let entry = tree.remove(pathname).expect("listed in removal set");
        let fs_path = entry.fs_path(&self.encrypted_root);
        if fs_path.exists() {
            let trash_root = persistence::encrypted_trash_root(&self.encrypted_root);
            move_to_trash(&fs_path, &trash_root, timestamp, &entry.fs_pathname)?;
        }
        Ok(())
    }

    fn delete_from_plain(&self, pathname: &str, tree: &mut FileTree, timestamp: &str) -> Result<()> {
        let entry = tree.remove(pathname).expect("listed in removal set");
        let fs_path = entry.fs_path(&self.plain_root);
        if fs_path.exists() {
            let trash_root = persistence::plain_trash_root(&self.plain_root);
            move_to_trash(&fs_path, &trash_root, timestamp, &entry.fs_pathname)?;
        }
        Ok(())
    }
}

/// Re-encrypts every container under `encrypted_root` from `password` to
/// `new_password` and rewrites the persisted encrypted tree, without
/// touching a plaintext folder at all — the original's `Syncrypto` only
/// sets up its plaintext side when one is given, and a password rotation
/// never needs one (`original_source/syncrypto/core.py`'s `change_password`
/// only walks `self.encrypted_folder`).
pub fn change_password_in_place(encrypted_root: &Path, password: &[u8], new_password: &[u8]) -> Result<()> {
    if new_password == password {
        return Err(Error::ChangeTheSamePassword);
    }

    let (mut encrypted_tree, snapshot_tree_name, is_new) =
        persistence::load_encrypted_tree(encrypted_root, password)?;
    let snapshot_tree_name = if is_new || snapshot_tree_name.is_empty() {
        persistence::default_snapshot_name(encrypted_root)
    } else {
        snapshot_tree_name
    };

    let pathnames: Vec<String> = encrypted_tree.files().map(|f| f.pathname.clone()).collect();
    for pathname in pathnames {
        let entry = encrypted_tree.get(&pathname).expect("just listed").clone();
        let fs_path = entry.fs_path(encrypted_root);

        let mut plaintext = Vec::new();
        let mut in_fd = fs::File::open(&fs_path)?;
        crypto::decrypt_fd(&mut in_fd, &mut plaintext, password)?;

        let mut new_entry = entry.clone();
        new_entry.salt = None;
        let mut out_fd = fs::File::create(&fs_path)?;
        crypto::encrypt_fd(plaintext.as_slice(), &mut out_fd, &mut new_entry, 0, new_password)?;
        encrypted_tree.set(pathname, new_entry);
        info!("re-encrypted {}", fs_path.display());
    }

    persistence::save_encrypted_tree(encrypted_root, &encrypted_tree, &snapshot_tree_name, new_password)?;
    Ok(())
}

/// Validates that `encrypted_root` is laid out as an encrypted folder
/// (creating it if missing) without requiring or touching a plaintext
/// folder — used by CLI paths that only operate on the encrypted side
/// (`--print-encrypted-tree`, `--change-password`).
pub fn ensure_encrypted_folder(encrypted_root: &Path) -> Result<()> {
    ensure_folder(encrypted_root)?;
    if encrypted_root.join(".syncrypto").is_dir() {
        return Err(Error::InvalidFolder(format!(
            "{} looks like a plaintext folder (contains .syncrypto/)",
            encrypted_root.display()
        )));
    }
    Ok(())
}

fn ensure_folder(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::InvalidFolder(format!(
                "{} exists and is not a directory",
                path.display()
            )));
        }
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

fn move_to_trash(fs_path: &Path, trash_root: &Path, timestamp: &str, fs_pathname: &str) -> Result<()> {
    let run_dir = trash::allocate_trash_run_dir(trash_root, timestamp);
    let dest = run_dir.join(fs_pathname.replace('/', std::path::MAIN_SEPARATOR_STR));
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(fs_path, dest)?;
    Ok(())
}

fn conflict_sibling_path(original: &Path) -> Result<PathBuf> {
    let parent = original.parent().unwrap_or_else(|| Path::new(""));
    let stem = original.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = original.extension().and_then(|s| s.to_str());

    for n in 0.. {
        let name = match (n, ext) {
            (0, Some(ext)) => format!("{stem}.conflict.{ext}"),
            (0, None) => format!("{stem}.conflict"),
            (n, Some(ext)) => format!("{stem}.conflict.{n}.{ext}"),
            (n, None) => format!("{stem}.conflict.{n}"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    unreachable!("0.. never terminates without returning")
}

fn apply_metadata(path: &Path, entry: &FileEntry) -> Result<()> {
    let mtime = filetime::FileTime::from_unix_time(entry.mtime, 0);
    filetime::set_file_mtime(path, mtime)?;

    #[cfg(unix)]
    if let Some(mode) = entry.mode {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

/// Rewrites every directory entry's on-disk mtime to its recorded value, so
/// that materialising child files (which bumps the parent's mtime) doesn't
/// make an otherwise-unchanged directory look modified on the next sync.
fn revise_folder_mtimes(tree: &FileTree, root: &Path) -> Result<()> {
    for entry in tree.folders() {
        let path = entry.fs_path(root);
        if path.is_dir() {
            let mtime = filetime::FileTime::from_unix_time(entry.mtime, 0);
            filetime::set_file_mtime(&path, mtime)?;
        }
    }
    Ok(())
}
