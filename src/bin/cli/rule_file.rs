//! Builds the rule set contributed by repeated `--rule` command-line flags.

use syncrypto::{FileRuleSet, Result};

/// Parses each `--rule` string (one `action: attr op value` line each, same
/// grammar as a line of `.syncrypto/rules`) into a rule set the engine
/// merges with whatever the on-disk rule file already contains.
pub fn rule_set_from_flags(rules: &[String]) -> Result<FileRuleSet> {
    let mut set = FileRuleSet::new();
    for raw in rules {
        set.add_rule(FileRuleSet::parse_line(raw)?);
    }
    Ok(set)
}
