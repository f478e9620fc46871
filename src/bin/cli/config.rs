//! `SyncConfig`: the typed configuration a driver builds and feeds into the
//! core, per spec.md §1's "treat argument parsing as the driver that feeds
//! a typed configuration struct into the core".

use std::path::PathBuf;

use syncrypto::{FileRuleSet, Password};

/// Everything `SyncEngine::new` needs, gathered from CLI flags plus
/// whatever interactive prompting resolved the password to.
pub struct SyncConfig {
    pub encrypted_folder: PathBuf,
    pub plain_folder: PathBuf,
    pub password: Password,
    pub rule_set: Option<FileRuleSet>,
    pub rule_file: Option<PathBuf>,
}
