//! The rule engine: ordered include/exclude/ignore predicates evaluated
//! against a `FileEntry`.

use chrono::{NaiveDateTime, TimeZone};
use regex::Regex;

use crate::error::{Error, Result};
use crate::filetree::entry::FileEntry;

/// What a matching rule decides for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Include,
    Exclude,
    Ignore,
}

impl RuleAction {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "include" => Some(RuleAction::Include),
            "exclude" => Some(RuleAction::Exclude),
            "ignore" => Some(RuleAction::Ignore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Match,
    Regexp,
}

impl RuleOp {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "eq" | "=" | "==" => RuleOp::Eq,
            "ne" | "!=" | "<>" => RuleOp::Ne,
            "lt" | "<" => RuleOp::Lt,
            "lte" | "<=" => RuleOp::Lte,
            "gt" | ">" => RuleOp::Gt,
            "gte" | ">=" => RuleOp::Gte,
            "match" => RuleOp::Match,
            "regexp" => RuleOp::Regexp,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attr {
    Path,
    Name,
    Size,
    Ctime,
    Mtime,
}

impl Attr {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "path" => Attr::Path,
            "name" => Attr::Name,
            "size" => Attr::Size,
            "ctime" => Attr::Ctime,
            "mtime" => Attr::Mtime,
            _ => return None,
        })
    }
}

#[derive(Debug)]
enum RuleValue {
    Text(String),
    Number(i64),
    Regex(Regex),
}

/// One parsed `attribute op value -> action` predicate.
#[derive(Debug)]
pub struct FileRule {
    attr: Attr,
    op: RuleOp,
    value: RuleValue,
    action: RuleAction,
}

impl FileRule {
    pub fn new(attr: &str, op: &str, value: &str, action: RuleAction) -> Result<Self> {
        let attr = Attr::parse(attr)
            .ok_or_else(|| Error::InvalidRuleString(format!("unsupported attribute {attr:?}")))?;
        let op = RuleOp::parse(op)
            .ok_or_else(|| Error::InvalidRuleString(format!("unsupported operator {op:?}")))?;

        let value = match attr {
            Attr::Size => RuleValue::Number(parse_size(value)?),
            Attr::Ctime | Attr::Mtime => RuleValue::Number(parse_local_datetime(value)?),
            _ if op == RuleOp::Regexp => RuleValue::Regex(compile_anchored_regex(value)?),
            _ => RuleValue::Text(value.to_string()),
        };

        Ok(FileRule { attr, op, value, action })
    }

    /// Returns this rule's action if `entry` matches its predicate.
    pub fn test(&self, entry: &FileEntry) -> Option<RuleAction> {
        let matched = match (&self.value, self.attr) {
            (RuleValue::Number(n), Attr::Size) => compare_num(entry.size as i64, *n, self.op),
            (RuleValue::Number(n), Attr::Ctime) => compare_num(entry.ctime, *n, self.op),
            (RuleValue::Number(n), Attr::Mtime) => compare_num(entry.mtime, *n, self.op),
            (RuleValue::Regex(re), _) => re.is_match(self.attr_text(entry)),
            (RuleValue::Text(text), _) => compare_text(self.attr_text(entry), text, self.op),
            _ => false,
        };
        matched.then_some(self.action)
    }

    fn attr_text<'e>(&self, entry: &'e FileEntry) -> &'e str {
        match self.attr {
            Attr::Name => entry.name(),
            _ => &entry.pathname,
        }
    }
}

fn compare_num(a: i64, b: i64, op: RuleOp) -> bool {
    match op {
        RuleOp::Eq => a == b,
        RuleOp::Ne => a != b,
        RuleOp::Lt => a < b,
        RuleOp::Lte => a <= b,
        RuleOp::Gt => a > b,
        RuleOp::Gte => a >= b,
        _ => false,
    }
}

fn compare_text(a: &str, b: &str, op: RuleOp) -> bool {
    match op {
        RuleOp::Eq => a == b,
        RuleOp::Ne => a != b,
        RuleOp::Lt => a < b,
        RuleOp::Lte => a <= b,
        RuleOp::Gt => a > b,
        RuleOp::Gte => a >= b,
        RuleOp::Match => glob::Pattern::new(b).map(|p| p.matches(a)).unwrap_or(false),
        RuleOp::Regexp => unreachable!("regexp values are pre-compiled"),
    }
}

fn parse_size(raw: &str) -> Result<i64> {
    let lower = raw.to_lowercase();
    let bad = || Error::InvalidRuleString(format!("invalid size value {raw:?}"));
    let (digits, shift) = match lower.chars().last() {
        Some('g') => (&lower[..lower.len() - 1], 30),
        Some('m') => (&lower[..lower.len() - 1], 20),
        Some('k') => (&lower[..lower.len() - 1], 10),
        _ => (lower.as_str(), 0),
    };
    let n: i64 = digits.parse().map_err(|_| bad())?;
    Ok(n << shift)
}

fn parse_local_datetime(raw: &str) -> Result<i64> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map_err(|_| Error::InvalidRuleString(format!("invalid datetime {raw:?}")))?;
    let local = chrono::Local
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| Error::InvalidRuleString(format!("ambiguous local datetime {raw:?}")))?;
    Ok(local.timestamp())
}

fn compile_anchored_regex(raw: &str) -> Result<Regex> {
    let mut pattern = raw.to_string();
    if !pattern.starts_with('^') {
        pattern.insert(0, '^');
    }
    if !pattern.ends_with('$') {
        pattern.push('$');
    }
    Regex::new(&pattern)
        .map_err(|e| Error::InvalidRegularExpression(raw.to_string(), e.to_string()))
}

/// An ordered list of rules plus a default action for anything none of them
/// match.
#[derive(Debug)]
pub struct FileRuleSet {
    rules: Vec<FileRule>,
    default_action: RuleAction,
}

impl Default for FileRuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FileRuleSet {
    pub fn new() -> Self {
        FileRuleSet {
            rules: Vec::new(),
            default_action: RuleAction::Include,
        }
    }

    pub fn add_rule(&mut self, rule: FileRule) {
        self.rules.push(rule);
    }

    /// First-match-wins evaluation; falls back to the set's default action
    /// (`include`) when nothing fires.
    pub fn test(&self, entry: &FileEntry) -> RuleAction {
        for rule in &self.rules {
            if let Some(action) = rule.test(entry) {
                return action;
            }
        }
        self.default_action
    }

    /// Parses one rule line, accepting either grammar:
    /// `action: attr op value` or `attr op value` (action supplied
    /// separately, used when loading a `--rule` CLI flag together with an
    /// explicit action).
    pub fn parse_line(line: &str) -> Result<FileRule> {
        let trimmed = line.trim();
        if let Some((action_part, rest)) = trimmed.split_once(':') {
            let action = RuleAction::parse(action_part.trim()).ok_or_else(|| {
                Error::InvalidRuleString(format!("unknown action {action_part:?}"))
            })?;
            let (attr, op, value) = split_predicate(rest)?;
            return FileRule::new(&attr, &op, &value, action);
        }
        Err(Error::InvalidRuleString(trimmed.to_string()))
    }

    /// Loads every non-empty, non-`#`-comment line of a rule file into a new
    /// set with the default action `include`.
    pub fn parse_file(contents: &str) -> Result<Self> {
        let mut set = FileRuleSet::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            set.add_rule(Self::parse_line(line)?);
        }
        Ok(set)
    }
}

fn split_predicate(rest: &str) -> Result<(String, String, String)> {
    let trimmed = rest.trim();
    let mut parts = trimmed.splitn(3, char::is_whitespace);
    let attr = parts
        .next()
        .ok_or_else(|| Error::InvalidRuleString(rest.to_string()))?;
    let remainder = trimmed[attr.len()..].trim_start();
    let mut rem_parts = remainder.splitn(2, char::is_whitespace);
    let op = rem_parts
        .next()
        .ok_or_else(|| Error::InvalidRuleString(rest.to_string()))?;
    let value = remainder[op.len()..].trim();
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    Ok((attr.to_string(), op.to_string(), value.to_string()))
}
