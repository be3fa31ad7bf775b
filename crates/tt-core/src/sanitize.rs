//! Command text sanitization.
//!
//! Commands are persisted verbatim unless they look like they carry
//! credentials. Flags such as `--token` have their values replaced, and long
//! token-like arguments are dropped entirely.

use std::borrow::Cow;

const SECRET_FLAGS: &[&str] = &[
    "--password",
    "--pass",
    "--token",
    "--apikey",
    "--api-key",
    "--secret",
    "--client-secret",
    "--access-token",
    "--refresh-token",
    "--bearer",
];

const REDACTED: &str = "<redacted>";

/// Minimum length for a bare argument to be treated as a secret blob.
const SECRET_BLOB_MIN_LEN: usize = 40;

/// Redacts secrets from argv-style arguments and joins them with spaces.
///
/// Arguments containing whitespace or quotes are single-quoted so the joined
/// text still reads as one shell command.
pub fn sanitize_args<S: AsRef<str>>(args: &[S]) -> String {
    let mut out: Vec<String> = Vec::with_capacity(args.len());
    let mut iter = args.iter().map(AsRef::as_ref);

    while let Some(arg) = iter.next() {
        if let Some((flag, _)) = arg.split_once('=') {
            if SECRET_FLAGS.contains(&flag) {
                out.push(format!("{flag}={REDACTED}"));
                continue;
            }
        }
        if SECRET_FLAGS.contains(&arg) {
            out.push(arg.to_string());
            if iter.next().is_some() {
                out.push(REDACTED.to_string());
            }
            continue;
        }
        if looks_like_secret_blob(arg) {
            out.push(REDACTED.to_string());
            continue;
        }
        out.push(quote(arg));
    }

    out.join(" ")
}

/// Redacts secrets from a command line that is only available as text.
///
/// The text is split on whitespace, so quoting inside the original command
/// is not preserved for redacted parts.
pub fn sanitize_command_line(command: &str) -> String {
    let mut words: Vec<Cow<'_, str>> = Vec::new();
    let mut redact_next = false;
    let mut changed = false;

    for word in command.split_whitespace() {
        if redact_next {
            words.push(Cow::Borrowed(REDACTED));
            redact_next = false;
            changed = true;
            continue;
        }
        if let Some((flag, _)) = word.split_once('=') {
            if SECRET_FLAGS.contains(&flag) {
                words.push(Cow::Owned(format!("{flag}={REDACTED}")));
                changed = true;
                continue;
            }
        }
        if SECRET_FLAGS.contains(&word) {
            redact_next = true;
        } else if looks_like_secret_blob(word) {
            words.push(Cow::Borrowed(REDACTED));
            changed = true;
            continue;
        }
        words.push(Cow::Borrowed(word));
    }

    // No secrets found: keep the original spacing.
    if !changed {
        return command.trim().to_string();
    }
    words.join(" ")
}

/// Truncates text to at most `max_len` characters, ending with `...`.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let keep = max_len.saturating_sub(3);
    format!("{}...", text.chars().take(keep).collect::<String>())
}

fn looks_like_secret_blob(arg: &str) -> bool {
    if arg.len() < SECRET_BLOB_MIN_LEN {
        return false;
    }
    if !arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return false;
    }
    let has_digit = arg.chars().any(|c| c.is_ascii_digit());
    let has_alpha = arg.chars().any(|c| c.is_ascii_alphabetic());
    has_digit && has_alpha
}

fn quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    if arg
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '$' | '`' | '\\'))
    {
        return format!("'{}'", arg.replace('\'', r"'\''"));
    }
    arg.to_string()
}
