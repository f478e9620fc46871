//! `FileTree`: a flat `pathname -> FileEntry` map. Directory structure is
//! implicit in the pathnames; there is no nested node type.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filetree::entry::FileEntry;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileTree {
    table: BTreeMap<String, FileEntry>,
}

impl FileTree {
    pub fn new() -> Self {
        FileTree::default()
    }

    pub fn pathnames(&self) -> impl Iterator<Item = &String> {
        self.table.keys()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.table.values().filter(|e| !e.isdir)
    }

    pub fn folders(&self) -> impl Iterator<Item = &FileEntry> {
        self.table.values().filter(|e| e.isdir)
    }

    pub fn get(&self, pathname: &str) -> Option<&FileEntry> {
        self.table.get(pathname)
    }

    pub fn set(&mut self, pathname: impl Into<String>, entry: FileEntry) {
        self.table.insert(pathname.into(), entry);
    }

    pub fn remove(&mut self, pathname: &str) -> Option<FileEntry> {
        self.table.remove(pathname)
    }

    pub fn has(&self, pathname: &str) -> bool {
        self.table.contains_key(pathname)
    }

    /// Linear scan; acceptable because trees are small relative to content.
    pub fn has_fs_pathname(&self, fs_pathname: &str) -> bool {
        self.table.values().any(|e| e.fs_pathname == fs_pathname)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl fmt::Display for FileTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.table.values() {
            let kind = if entry.isdir { "directory" } else { "file" };
            writeln!(
                f,
                "{kind} {} : {} {}",
                entry.pathname, entry.mtime, entry.fs_pathname
            )?;
        }
        Ok(())
    }
}
