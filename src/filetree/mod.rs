//! The file-tree model: entries, the flat tree, the rule engine, and the
//! filesystem scanner that builds a tree from disk.

pub mod entry;
pub mod rules;
pub mod scan;
pub mod tree;

pub use entry::FileEntry;
pub use rules::{FileRule, FileRuleSet, RuleAction};
pub use tree::FileTree;
