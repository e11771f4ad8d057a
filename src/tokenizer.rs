//! Command-string tokenization
//!
//! Turns a raw, possibly multi-shell-flavored curl command into a flat token
//! list: line continuations from Bash (`\`), CMD (`^`) and PowerShell
//! (`` ` ``) are normalized, a leading `curl` is stripped, environment
//! variable references are expanded, and the remainder is split with a
//! quote-aware scanner.
//!
//! Unterminated quotes are handled permissively: the token accumulated so
//! far is emitted rather than raising. Pasted commands are frequently
//! truncated mid-quote and still worth executing.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::errors::{Error, ParseReason, Result};

/// Environment reference syntaxes, longest pattern first so `$env:NAME`
/// is never half-matched as `$env`.
static ENV_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"%([A-Za-z_][A-Za-z0-9_]*)%|\$env:([A-Za-z_][A-Za-z0-9_]*)|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("env reference pattern is valid")
});

/// Split a raw command string into argument tokens.
///
/// Fails with `EmptyCommand` on blank input and `MissingUrl` for a bare
/// `curl` with nothing after it. Environment references are resolved from
/// the process environment; unresolved names stay literal.
pub fn tokenize(raw: &str) -> Result<Vec<String>> {
    tokenize_with_env(raw, &|name| std::env::var(name).ok())
}

/// [`tokenize`] with an injectable variable lookup, for tests and embedders.
pub fn tokenize_with_env(
    raw: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Err(Error::MalformedCommand {
            reason: ParseReason::EmptyCommand,
        });
    }

    let normalized = normalize_lines(raw);
    let stripped = strip_curl_prefix(&normalized)?;
    let expanded = expand_env_refs(&stripped, lookup);
    Ok(split_tokens(&expanded))
}

/// Replace continuation markers and line-break runs with single spaces.
///
/// A trailing `\`, `^` or `` ` `` immediately before a line break is the
/// Bash/CMD/PowerShell continuation convention; bare line breaks (and the
/// indentation that follows them) collapse to one space as well.
fn normalize_lines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if matches!(c, '\\' | '^' | '`') && matches!(chars.peek(), Some('\n') | Some('\r')) {
            if chars.next() == Some('\r') && chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push(' ');
            continue;
        }
        if c == '\n' || c == '\r' {
            while matches!(chars.peek(), Some(' ' | '\t' | '\n' | '\r')) {
                chars.next();
            }
            out.push(' ');
            continue;
        }
        out.push(c);
    }

    out
}

/// Strip a leading literal `curl ` (case-insensitive) if present.
fn strip_curl_prefix(s: &str) -> Result<String> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("curl") {
        return Err(Error::MalformedCommand {
            reason: ParseReason::MissingUrl,
        });
    }
    if trimmed
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("curl "))
    {
        Ok(trimmed[5..].trim_start().to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Expand `%NAME%`, `$env:NAME`, `${NAME}` and `$NAME` references.
/// Unresolved variables are left as literal text.
pub(crate) fn expand_env_refs(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    ENV_REF
        .replace_all(input, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Quote-aware token scanner.
///
/// Quote characters are consumed, never emitted, and toggle state rather
/// than producing tokens, so `--data 'a b'` yields one token. A doubled
/// `""` inside a double-quoted token is an embedded literal quote
/// (Windows-shell convention). A backslash escapes `"`, `'` and `\` in any
/// state; before any other character it is kept literally to tolerate
/// Windows path separators.
fn split_tokens(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote = Quote::None;
    // Set when the token had an opening quote, so `-d ''` yields an empty
    // token instead of disappearing.
    let mut saw_quote = false;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(&next @ ('"' | '\'' | '\\')) => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push('\\'),
            },
            '\'' if quote == Quote::None => {
                quote = Quote::Single;
                saw_quote = true;
            }
            '\'' if quote == Quote::Single => quote = Quote::None,
            '"' if quote == Quote::None => {
                quote = Quote::Double;
                saw_quote = true;
            }
            '"' if quote == Quote::Double => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    quote = Quote::None;
                }
            }
            c if c.is_whitespace() && quote == Quote::None => {
                if !current.is_empty() || saw_quote {
                    tokens.push(std::mem::take(&mut current));
                }
                saw_quote = false;
            }
            other => current.push(other),
        }
    }

    // An unterminated quote still emits whatever accumulated.
    if !current.is_empty() || saw_quote {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn tok(raw: &str) -> Vec<String> {
        tokenize_with_env(raw, &no_env).unwrap()
    }

    #[test]
    fn test_empty_command() {
        let err = tokenize_with_env("   \n ", &no_env).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedCommand {
                reason: ParseReason::EmptyCommand
            }
        ));
    }

    #[test]
    fn test_bare_curl_is_missing_url() {
        let err = tokenize_with_env("curl", &no_env).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedCommand {
                reason: ParseReason::MissingUrl
            }
        ));
    }

    #[test]
    fn test_strips_leading_curl_case_insensitive() {
        assert_eq!(tok("CURL https://example.test"), vec!["https://example.test"]);
        assert_eq!(tok("https://example.test"), vec!["https://example.test"]);
    }

    #[test]
    fn test_single_quotes_keep_spaces() {
        assert_eq!(
            tok("curl --data 'a b' http://x"),
            vec!["--data", "a b", "http://x"]
        );
    }

    #[test]
    fn test_double_quotes_and_embedded_single() {
        assert_eq!(
            tok(r#"curl -H "X-Note: it's fine" http://x"#),
            vec!["-H", "X-Note: it's fine", "http://x"]
        );
    }

    #[test]
    fn test_doubled_quote_inside_double_quotes() {
        assert_eq!(tok(r#"curl -d "say ""hi""" http://x"#), vec!["-d", r#"say "hi""#, "http://x"]);
    }

    #[test]
    fn test_escaped_quote_outside_quotes() {
        assert_eq!(tok(r#"curl -d \"x\" http://x"#), vec!["-d", r#""x""#, "http://x"]);
    }

    #[test]
    fn test_backslash_before_other_chars_is_literal() {
        assert_eq!(tok(r"curl -o C:\temp\out.bin http://x"), vec!["-o", r"C:\temp\out.bin", "http://x"]);
    }

    #[test]
    fn test_bash_line_continuation() {
        assert_eq!(
            tok("curl -H 'A: 1' \\\n  -H 'B: 2' \\\n  http://x"),
            vec!["-H", "A: 1", "-H", "B: 2", "http://x"]
        );
    }

    #[test]
    fn test_cmd_and_powershell_continuations() {
        assert_eq!(tok("curl -s ^\r\n http://x"), vec!["-s", "http://x"]);
        assert_eq!(tok("curl -s `\n http://x"), vec!["-s", "http://x"]);
    }

    #[test]
    fn test_bare_newline_collapses() {
        assert_eq!(tok("curl -s\n   http://x"), vec!["-s", "http://x"]);
    }

    #[test]
    fn test_env_expansion_all_syntaxes() {
        let lookup = |name: &str| (name == "HOST").then(|| "example.test".to_string());
        for raw in [
            "curl http://%HOST%/a",
            "curl http://$env:HOST/a",
            "curl http://${HOST}/a",
            "curl http://$HOST/a",
        ] {
            assert_eq!(
                tokenize_with_env(raw, &lookup).unwrap(),
                vec!["http://example.test/a"],
                "failed for {raw}"
            );
        }
    }

    #[test]
    fn test_unresolved_env_left_literal() {
        assert_eq!(tok("curl http://${NOPE}/a"), vec!["http://${NOPE}/a"]);
        assert_eq!(tok("curl http://%NOPE%/a"), vec!["http://%NOPE%/a"]);
    }

    #[test]
    fn test_unterminated_quote_is_permissive() {
        assert_eq!(tok("curl -d 'a=1 http://x"), vec!["-d", "a=1 http://x"]);
    }

    #[test]
    fn test_empty_quoted_token_survives() {
        assert_eq!(tok("curl -d '' http://x"), vec!["-d", "", "http://x"]);
    }

    #[test]
    fn test_idempotent_tokenize() {
        let raw = "curl -X POST -d 'a b' http://x";
        assert_eq!(tok(raw), tok(raw));
    }
}
