//! Ignore rules applied before an event is recorded.
//!
//! Rules form an ordered chain: the first rule that matches excludes the
//! command, and a command that matches nothing is tracked.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// Commands ignored by default. Each is matched as a whole first word, so
/// `cd` and `cd ..` are ignored but `cdk deploy` is not.
pub const DEFAULT_IGNORED_COMMANDS: &[&str] = &[
    "cd",
    "ls",
    "pwd",
    "clear",
    "cls",
    "exit",
    "history",
    "timetrace",
];

/// The rules seeded into a fresh store: `exact <word>` and `prefix "<word> "`
/// for every default command.
pub fn default_ignore_rules() -> Vec<IgnoreRule> {
    DEFAULT_IGNORED_COMMANDS
        .iter()
        .flat_map(|word| {
            [
                IgnoreRule::Exact((*word).to_string()),
                IgnoreRule::Prefix(format!("{word} ")),
            ]
        })
        .collect()
}

/// How a rule's pattern is compared against a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Prefix,
    Exact,
    Regex,
}

impl RuleKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Exact => "exact",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prefix" => Ok(Self::Prefix),
            "exact" => Ok(Self::Exact),
            "regex" => Ok(Self::Regex),
            _ => Err(ValidationError::InvalidRuleKind {
                value: s.to_string(),
            }),
        }
    }
}

/// A predicate excluding matching commands from capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "lowercase")]
pub enum IgnoreRule {
    /// Matches commands starting with the text. Trailing whitespace is part
    /// of the pattern, so `"git "` matches `git status` but not `gitk`.
    Prefix(String),
    /// Matches commands equal to the text.
    Exact(String),
    /// Matches commands containing a match of the pattern (unanchored).
    Regex(String),
}

impl IgnoreRule {
    /// Builds a rule, rejecting blank patterns and regexes that don't compile.
    ///
    /// Commands are trimmed before matching, so exact patterns are trimmed
    /// and prefix patterns lose leading whitespace only. Regexes are kept as given.
    pub fn new(kind: RuleKind, pattern: &str) -> Result<Self, ValidationError> {
        if pattern.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "ignore pattern",
            });
        }
        let rule = match kind {
            RuleKind::Prefix => Self::Prefix(pattern.trim_start().to_string()),
            RuleKind::Exact => Self::Exact(pattern.trim().to_string()),
            RuleKind::Regex => {
                Regex::new(pattern).map_err(|err| ValidationError::InvalidRegex {
                    pattern: pattern.to_string(),
                    message: err.to_string(),
                })?;
                Self::Regex(pattern.to_string())
            }
        };
        Ok(rule)
    }

    pub const fn kind(&self) -> RuleKind {
        match self {
            Self::Prefix(_) => RuleKind::Prefix,
            Self::Exact(_) => RuleKind::Exact,
            Self::Regex(_) => RuleKind::Regex,
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            Self::Prefix(p) | Self::Exact(p) | Self::Regex(p) => p,
        }
    }
}

impl fmt::Display for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.pattern())
    }
}

#[derive(Debug)]
enum Matcher {
    Prefix(String),
    Exact(String),
    Regex(Regex),
}

/// Compiled, ordered rule chain.
#[derive(Debug)]
pub struct IgnoreFilter {
    rules: Vec<(IgnoreRule, Matcher)>,
}

impl IgnoreFilter {
    /// Compiles rules in order.
    ///
    /// A stored regex that no longer compiles is skipped with a warning so a
    /// single bad rule cannot stop tracking altogether.
    pub fn new(rules: impl IntoIterator<Item = IgnoreRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter_map(|rule| {
                let matcher = match &rule {
                    IgnoreRule::Prefix(p) => Matcher::Prefix(p.clone()),
                    IgnoreRule::Exact(p) => Matcher::Exact(p.clone()),
                    IgnoreRule::Regex(p) => match Regex::new(p) {
                        Ok(re) => Matcher::Regex(re),
                        Err(err) => {
                            tracing::warn!(pattern = %p, error = %err, "skipping invalid ignore regex");
                            return None;
                        }
                    },
                };
                Some((rule, matcher))
            })
            .collect();
        Self { rules }
    }

    /// Returns the first rule matching the command.
    pub fn first_match(&self, command: &str) -> Option<&IgnoreRule> {
        let command = command.trim();
        self.rules
            .iter()
            .find(|(_, matcher)| match matcher {
                Matcher::Prefix(p) => command.starts_with(p.as_str()),
                Matcher::Exact(p) => command == p,
                Matcher::Regex(re) => re.is_match(command),
            })
            .map(|(rule, _)| rule)
    }

    /// Whether the command should be excluded from capture.
    ///
    /// Blank commands are always excluded.
    pub fn should_ignore(&self, command: &str) -> bool {
        command.trim().is_empty() || self.first_match(command).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(rules: &[(RuleKind, &str)]) -> IgnoreFilter {
        IgnoreFilter::new(
            rules
                .iter()
                .map(|(kind, pattern)| IgnoreRule::new(*kind, pattern).unwrap()),
        )
    }

    #[test]
    fn empty_filter_tracks_everything() {
        let f = IgnoreFilter::new([]);
        assert!(f.is_empty());
        assert!(!f.should_ignore("cargo test"));
    }

    #[test]
    fn blank_command_is_ignored() {
        assert!(IgnoreFilter::new([]).should_ignore("   "));
    }

    #[test]
    fn prefix_matches_start_only() {
        let f = filter(&[(RuleKind::Prefix, "git st")]);
        assert!(f.should_ignore("git status"));
        assert!(f.should_ignore("  git stash"));
        assert!(!f.should_ignore("echo git status"));
    }

    #[test]
    fn prefix_keeps_trailing_space() {
        let rule = IgnoreRule::new(RuleKind::Prefix, "git ").unwrap();
        assert_eq!(rule.pattern(), "git ");

        let f = IgnoreFilter::new([rule]);
        assert!(f.should_ignore("git status"));
        assert!(!f.should_ignore("gitk --all"));
        assert!(!f.should_ignore("git"));
    }

    #[test]
    fn defaults_match_whole_first_word() {
        let f = IgnoreFilter::new(default_ignore_rules());
        for command in ["cd", "cd ..", "ls", "ls -la", "  pwd", "clear", "timetrace report"] {
            assert!(f.should_ignore(command), "{command}");
        }
        for command in ["cdk deploy", "lsof -i :8080", "clearml-agent daemon", "lsblk", "exiftool a.jpg"] {
            assert!(!f.should_ignore(command), "{command}");
        }
    }

    #[test]
    fn default_rules_pair_exact_and_prefix() {
        let rules = default_ignore_rules();
        assert_eq!(rules.len(), DEFAULT_IGNORED_COMMANDS.len() * 2);
        assert_eq!(rules[0], IgnoreRule::Exact("cd".to_string()));
        assert_eq!(rules[1], IgnoreRule::Prefix("cd ".to_string()));
    }

    #[test]
    fn exact_requires_equality() {
        let f = filter(&[(RuleKind::Exact, "make")]);
        assert!(f.should_ignore("make"));
        assert!(!f.should_ignore("make test"));
    }

    #[test]
    fn regex_is_unanchored_unless_pattern_anchors() {
        let f = filter(&[(RuleKind::Regex, r"sleep \d+")]);
        assert!(f.should_ignore("echo hi && sleep 5"));

        let anchored = filter(&[(RuleKind::Regex, r"^sleep \d+$")]);
        assert!(anchored.should_ignore("sleep 5"));
        assert!(!anchored.should_ignore("echo hi && sleep 5"));
    }

    #[test]
    fn first_match_wins_in_insertion_order() {
        let f = filter(&[
            (RuleKind::Regex, "^npm"),
            (RuleKind::Prefix, "npm run"),
        ]);
        let rule = f.first_match("npm run dev").unwrap();
        assert_eq!(rule.kind(), RuleKind::Regex);
    }

    #[test]
    fn invalid_regex_rejected_on_creation() {
        let err = IgnoreRule::new(RuleKind::Regex, "(unclosed").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRegex { .. }));
    }

    #[test]
    fn invalid_stored_regex_is_skipped() {
        let f = IgnoreFilter::new([
            IgnoreRule::Regex("(unclosed".to_string()),
            IgnoreRule::Exact("ls".to_string()),
        ]);
        assert_eq!(f.len(), 1);
        assert!(f.should_ignore("ls"));
    }

    #[test]
    fn blank_pattern_rejected() {
        assert!(IgnoreRule::new(RuleKind::Prefix, "  ").is_err());
    }

    #[test]
    fn rule_kind_parses() {
        assert_eq!("exact".parse::<RuleKind>().unwrap(), RuleKind::Exact);
        assert!("glob".parse::<RuleKind>().is_err());
    }

    #[test]
    fn rule_serializes_as_tagged_variant() {
        let rule = IgnoreRule::Prefix("cd".to_string());
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(json, r#"{"kind":"prefix","pattern":"cd"}"#);
    }
}
