//! Persisted ignore rules.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tt_core::{IgnoreFilter, IgnoreRule, RuleKind};

use crate::{Database, DbError, format_timestamp, parse_timestamp, storage_precision};

/// An ignore rule with its storage metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRule {
    pub id: i64,
    #[serde(flatten)]
    pub rule: IgnoreRule,
    pub created_at: DateTime<Utc>,
}

/// Result of adding a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRuleOutcome {
    pub rule: StoredRule,
    /// An identical rule already existed; the new one changes nothing.
    pub redundant: bool,
}

impl Database {
    /// All rules in evaluation order.
    ///
    /// Rows with an unknown kind are skipped with a warning.
    pub fn ignore_rules(&self) -> Result<Vec<StoredRule>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, kind, pattern, created_at FROM ignore_rules ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut rules = Vec::new();
        for row in rows {
            let (id, kind, pattern, created_at) = row?;
            let rule = match kind.parse::<RuleKind>() {
                Ok(RuleKind::Prefix) => IgnoreRule::Prefix(pattern),
                Ok(RuleKind::Exact) => IgnoreRule::Exact(pattern),
                Ok(RuleKind::Regex) => IgnoreRule::Regex(pattern),
                Err(err) => {
                    tracing::warn!(rule_id = id, error = %err, "skipping stored ignore rule");
                    continue;
                }
            };
            let created_at = parse_timestamp(&created_at).unwrap_or_else(|reason| {
                tracing::warn!(rule_id = id, %reason, "ignore rule has invalid created_at");
                DateTime::<Utc>::UNIX_EPOCH
            });
            rules.push(StoredRule {
                id,
                rule,
                created_at,
            });
        }
        Ok(rules)
    }

    /// Compiles the stored rules into a filter.
    pub fn ignore_filter(&self) -> Result<IgnoreFilter, DbError> {
        Ok(IgnoreFilter::new(
            self.ignore_rules()?.into_iter().map(|stored| stored.rule),
        ))
    }

    /// Appends a rule to the end of the chain.
    ///
    /// Duplicates are stored but flagged as redundant.
    pub fn add_ignore_rule(
        &mut self,
        kind: RuleKind,
        pattern: &str,
    ) -> Result<AddRuleOutcome, DbError> {
        let rule = IgnoreRule::new(kind, pattern)?;
        let created_at = storage_precision(Utc::now());
        let outcome = self.write(|tx| {
            let redundant: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM ignore_rules WHERE kind = ? AND pattern = ?)",
                (rule.kind().as_str(), rule.pattern()),
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO ignore_rules (kind, pattern, created_at) VALUES (?, ?, ?)",
                (rule.kind().as_str(), rule.pattern(), format_timestamp(created_at)),
            )?;
            Ok(AddRuleOutcome {
                rule: StoredRule {
                    id: tx.last_insert_rowid(),
                    rule: rule.clone(),
                    created_at,
                },
                redundant,
            })
        })?;
        tracing::info!(rule = %outcome.rule.rule, redundant = outcome.redundant, "ignore rule added");
        Ok(outcome)
    }

    /// Removes every rule of `kind` with exactly this pattern.
    ///
    /// Returns how many were removed; zero is not an error.
    pub fn remove_ignore_rules(&mut self, kind: RuleKind, pattern: &str) -> Result<usize, DbError> {
        let pattern = match kind {
            RuleKind::Prefix => pattern.trim_start(),
            RuleKind::Exact => pattern.trim(),
            RuleKind::Regex => pattern,
        };
        let removed = self.write(|tx| {
            Ok(tx.execute(
                "DELETE FROM ignore_rules WHERE kind = ? AND pattern = ?",
                (kind.as_str(), pattern),
            )?)
        })?;
        tracing::info!(%kind, pattern, removed, "ignore rules removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreOptions;
    use tt_core::{ValidationError, default_ignore_rules};

    fn empty_db() -> Database {
        Database::open_in_memory_with(&StoreOptions {
            seed_default_ignores: false,
            ..StoreOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn defaults_are_seeded_as_whole_words() {
        let db = Database::open_in_memory().unwrap();
        let rules: Vec<IgnoreRule> = db.ignore_rules().unwrap().into_iter().map(|r| r.rule).collect();
        assert_eq!(rules, default_ignore_rules());

        let filter = db.ignore_filter().unwrap();
        assert!(filter.should_ignore("ls -la"));
        assert!(filter.should_ignore("cd"));
        assert!(!filter.should_ignore("cargo test"));
        assert!(!filter.should_ignore("cdk deploy"));
        assert!(!filter.should_ignore("lsof -i :8080"));
        assert!(!filter.should_ignore("clearml-agent daemon"));
    }

    #[test]
    fn rules_keep_insertion_order() {
        let mut db = empty_db();
        db.add_ignore_rule(RuleKind::Regex, "^npm").unwrap();
        db.add_ignore_rule(RuleKind::Exact, "make").unwrap();

        let kinds: Vec<RuleKind> = db
            .ignore_rules()
            .unwrap()
            .iter()
            .map(|r| r.rule.kind())
            .collect();
        assert_eq!(kinds, vec![RuleKind::Regex, RuleKind::Exact]);
    }

    #[test]
    fn duplicate_rule_is_flagged_redundant() {
        let mut db = empty_db();
        assert!(!db.add_ignore_rule(RuleKind::Prefix, "git").unwrap().redundant);
        assert!(db.add_ignore_rule(RuleKind::Prefix, " git").unwrap().redundant);
        assert!(!db.add_ignore_rule(RuleKind::Prefix, "git ").unwrap().redundant);
        assert!(!db.add_ignore_rule(RuleKind::Exact, "git").unwrap().redundant);
    }

    #[test]
    fn invalid_regex_is_not_stored() {
        let mut db = empty_db();
        let err = db.add_ignore_rule(RuleKind::Regex, "(oops").unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::InvalidRegex { .. })
        ));
        assert!(db.ignore_rules().unwrap().is_empty());
    }

    #[test]
    fn remove_deletes_all_copies() {
        let mut db = empty_db();
        db.add_ignore_rule(RuleKind::Exact, "make").unwrap();
        db.add_ignore_rule(RuleKind::Exact, "make").unwrap();
        db.add_ignore_rule(RuleKind::Prefix, "make").unwrap();

        assert_eq!(db.remove_ignore_rules(RuleKind::Exact, "make").unwrap(), 2);
        assert_eq!(db.remove_ignore_rules(RuleKind::Exact, "make").unwrap(), 0);
        assert_eq!(db.ignore_rules().unwrap().len(), 1);
    }

    #[test]
    fn prefix_with_trailing_space_round_trips() {
        let mut db = empty_db();
        let outcome = db.add_ignore_rule(RuleKind::Prefix, "git ").unwrap();
        assert_eq!(outcome.rule.rule.pattern(), "git ");

        let filter = db.ignore_filter().unwrap();
        assert!(filter.should_ignore("git status"));
        assert!(!filter.should_ignore("gitk --all"));

        assert_eq!(db.remove_ignore_rules(RuleKind::Prefix, "git").unwrap(), 0);
        assert_eq!(db.remove_ignore_rules(RuleKind::Prefix, "git ").unwrap(), 1);
    }

    #[test]
    fn unknown_stored_kind_is_skipped() {
        let db = empty_db();
        db.conn
            .execute(
                "INSERT INTO ignore_rules (kind, pattern, created_at) VALUES ('glob', '*', '2026-01-28T09:00:00.000Z')",
                [],
            )
            .unwrap();
        assert!(db.ignore_rules().unwrap().is_empty());
    }
}
