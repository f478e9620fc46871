//! Integration tests for the rule-file grammar and rule-set evaluation
//! (spec.md §4.C), exercised through the crate's public API only.

use syncrypto::{FileEntry, FileRule, FileRuleSet, RuleAction};

fn entry(pathname: &str, size: u64, mtime: i64) -> FileEntry {
    FileEntry {
        pathname: pathname.into(),
        fs_pathname: pathname.into(),
        isdir: false,
        size,
        mtime,
        ctime: mtime,
        mode: None,
        digest: None,
        salt: None,
    }
}

#[test]
fn parse_file_skips_comments_and_blank_lines() {
    let rules = FileRuleSet::parse_file(
        "\n# a comment\nexclude: name eq Thumb.db\n\n# another\nexclude: name match *.swp\n",
    )
    .unwrap();
    assert_eq!(rules.test(&entry("Thumb.db", 10, 0)), RuleAction::Exclude);
    assert_eq!(rules.test(&entry("notes.swp", 10, 0)), RuleAction::Exclude);
    assert_eq!(rules.test(&entry("keep.txt", 10, 0)), RuleAction::Include);
}

#[test]
fn regexp_rule_is_anchored_both_ends() {
    let rules =
        FileRuleSet::parse_file("ignore: path regexp build/.*\\.o\n").unwrap();
    assert_eq!(rules.test(&entry("build/main.o", 1, 0)), RuleAction::Ignore);
    // Anchored at both ends: a path merely containing the pattern as a
    // substring must not match.
    assert_eq!(
        rules.test(&entry("src/build/main.o.bak", 1, 0)),
        RuleAction::Include
    );
}

#[test]
fn size_rule_with_suffix_compares_in_bytes() {
    let rules = FileRuleSet::parse_file("exclude: size gt 1m\n").unwrap();
    assert_eq!(
        rules.test(&entry("big.bin", 2 * 1024 * 1024, 0)),
        RuleAction::Exclude
    );
    assert_eq!(
        rules.test(&entry("small.bin", 1024, 0)),
        RuleAction::Include
    );
}

#[test]
fn mtime_rule_parses_local_datetime() {
    let rules = FileRuleSet::parse_file("ignore: mtime lt 2020-01-01 00:00:00\n").unwrap();
    assert_eq!(rules.test(&entry("ancient", 1, 0)), RuleAction::Ignore);
    assert_eq!(
        rules.test(&entry("recent", 1, 1_900_000_000)),
        RuleAction::Include
    );
}

#[test]
fn first_matching_rule_wins_over_later_ones() {
    let mut rules = FileRuleSet::new();
    rules.add_rule(FileRule::new("name", "match", "*.tmp", RuleAction::Exclude).unwrap());
    rules.add_rule(FileRule::new("name", "eq", "keep.tmp", RuleAction::Include).unwrap());
    assert_eq!(rules.test(&entry("keep.tmp", 1, 0)), RuleAction::Exclude);
}

#[test]
fn invalid_rule_line_is_rejected() {
    assert!(FileRuleSet::parse_file("this is not a rule\n").is_err());
}

#[test]
fn invalid_regex_is_rejected() {
    let err = FileRuleSet::parse_file("exclude: path regexp [unterminated\n").unwrap_err();
    assert!(matches!(
        err,
        syncrypto::Error::InvalidRegularExpression(_, _)
    ));
}
