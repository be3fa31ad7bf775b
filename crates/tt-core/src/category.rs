//! Broad command categories derived from command text.
//!
//! Categorization is keyword based and deterministic: the first token picks a
//! tool family, and keywords anywhere in the command refine it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical command categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    Git,
    Container,
    Testing,
    Build,
    Lint,
    Node,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Self; 7] = [
        Self::Git,
        Self::Container,
        Self::Testing,
        Self::Build,
        Self::Lint,
        Self::Node,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Container => "container",
            Self::Testing => "testing",
            Self::Build => "build",
            Self::Lint => "lint",
            Self::Node => "node",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown category strings.
#[derive(Debug, Clone)]
pub struct UnknownCategory(String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

const NODE_TOOLS: &[&str] = &["npm", "pnpm", "yarn"];
const JVM_DOTNET_TOOLS: &[&str] = &["mvn", "gradle", "dotnet"];
const TEST_RUNNERS: &[&str] = &["pytest", "tox", "nosetests"];
const BUILD_KEYWORDS: &[&str] = &["build", "compile", "package", "bundle"];
const TEST_KEYWORDS: &[&str] = &["test", "tests"];
const LINT_KEYWORDS: &[&str] = &[
    "lint", "format", "fmt", "ruff", "flake8", "black", "prettier", "eslint", "clippy",
];

/// Returns the broad category for a command string.
pub fn categorize(command: &str) -> Category {
    let Some(first) = command.split_whitespace().next() else {
        return Category::Other;
    };
    let first = first.trim_matches(|c| c == '\'' || c == '"');
    let low = command.to_lowercase();

    match first {
        "git" => return Category::Git,
        "docker" | "podman" => return Category::Container,
        _ => {}
    }

    if NODE_TOOLS.contains(&first) {
        // Subcommands are separate words: `npm test`, `yarn lint`.
        let has_word = |words: &[&str]| words.iter().any(|k| low.contains(&format!(" {k}")));
        return if has_word(TEST_KEYWORDS) {
            Category::Testing
        } else if has_word(LINT_KEYWORDS) {
            Category::Lint
        } else if has_word(BUILD_KEYWORDS) {
            Category::Build
        } else {
            Category::Node
        };
    }

    let contains = |words: &[&str]| words.iter().any(|k| low.contains(k));
    if JVM_DOTNET_TOOLS.contains(&first) {
        return if contains(TEST_KEYWORDS) {
            Category::Testing
        } else {
            Category::Build
        };
    }
    if TEST_RUNNERS.contains(&first) {
        return Category::Testing;
    }
    if contains(LINT_KEYWORDS) {
        Category::Lint
    } else if contains(TEST_KEYWORDS) {
        Category::Testing
    } else if contains(BUILD_KEYWORDS) {
        Category::Build
    } else {
        Category::Other
    }
}
