//! Ignore rule commands.

use std::io::Write;

use anyhow::Result;
use tt_core::RuleKind;
use tt_db::Database;

pub fn list<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    let rules = db.ignore_rules()?;
    if rules.is_empty() {
        writeln!(writer, "No ignore rules; every command is tracked.")?;
        return Ok(());
    }
    writeln!(writer, "Ignore rules (first match wins):")?;
    // Quoted so a trailing space in a prefix stays visible
    for stored in &rules {
        writeln!(
            writer,
            "  {:>3}  {:<6}  {:?}",
            stored.id,
            stored.rule.kind().as_str(),
            stored.rule.pattern()
        )?;
    }
    Ok(())
}

pub fn add<W: Write>(writer: &mut W, db: &mut Database, kind: RuleKind, pattern: &str) -> Result<()> {
    let outcome = db.add_ignore_rule(kind, pattern)?;
    writeln!(
        writer,
        "Added ignore {kind}: {:?}",
        outcome.rule.rule.pattern()
    )?;
    if outcome.redundant {
        writeln!(writer, "Note: an identical rule already existed; this one changes nothing.")?;
    }
    Ok(())
}

pub fn remove<W: Write>(
    writer: &mut W,
    db: &mut Database,
    kind: RuleKind,
    pattern: &str,
) -> Result<()> {
    match db.remove_ignore_rules(kind, pattern)? {
        0 => writeln!(writer, "No ignore {kind} rule matched {pattern:?}.")?,
        1 => writeln!(writer, "Removed ignore {kind}: {pattern:?}")?,
        n => writeln!(writer, "Removed {n} ignore {kind} rules: {pattern:?}")?,
    }
    Ok(())
}
