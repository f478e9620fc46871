//! Recursive filesystem scan building a `FileTree`.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::Result;
use crate::filetree::entry::FileEntry;
use crate::filetree::rules::{FileRuleSet, RuleAction};
use crate::filetree::tree::FileTree;

/// Names skipped unconditionally during a scan, on either side of a sync.
const SKIPPED_NAMES: [&str; 2] = [".syncrypto", "_syncrypto"];

impl FileTree {
    /// Recursively scans `root`, building pathnames relative to it with `/`
    /// separators regardless of host convention. `.syncrypto`/`_syncrypto`
    /// and `.`/`..` are never visited. When `rule_set` is given, entries
    /// whose action is not `include` are omitted from the resulting tree.
    pub fn from_fs(root: &Path, rule_set: Option<&FileRuleSet>) -> Result<FileTree> {
        let mut tree = FileTree::new();

        let walker = WalkDir::new(root).min_depth(1).into_iter().filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|name| !SKIPPED_NAMES.contains(&name))
                .unwrap_or(true)
        });

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            let relative = path
                .strip_prefix(root)
                .expect("walkdir yields paths under root");
            let pathname = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if pathname.is_empty() {
                continue;
            }

            let file_entry = FileEntry::from_file(path, &pathname)?;
            match rule_set {
                Some(rules) if rules.test(&file_entry) != RuleAction::Include => continue,
                _ => tree.set(pathname, file_entry),
            }
        }

        Ok(tree)
    }
}
