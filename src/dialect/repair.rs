//! Text rewrites for known upstream quoting defects. Both run on decoded text
//! before tokenization and leave everything outside the repaired spans intact.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// A quoted field whose content holds a quote that may not be escaped. The
/// closing `;` is left unmatched so the next field can start a match.
static WRONG_QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#";"([^;\r\n]+"[^;\r\n]*)""#).expect("static regex"));

/// Doubles the quotes of `;"...";` spans that contain a bare `"`.
///
/// A span is rewritten only when splitting its content on `""` leaves a part
/// that still holds a quote, so correctly escaped fields stay untouched.
pub fn fix_wrong_quotes(text: &str) -> Cow<'_, str> {
    WRONG_QUOTE.replace_all(text, |caps: &Captures| {
        let whole = &caps[0];
        let closed = caps
            .get(0)
            .is_some_and(|m| text[m.end()..].starts_with(';'));
        let content = &caps[1];
        if closed && content.split("\"\"").any(|part| part.contains('"')) {
            format!(";\"{}\"", content.replace('"', "\"\""))
        } else {
            whole.to_string()
        }
    })
}

/// Wraps lines that hold `";"` separators but lack their outer quotes.
///
/// Only the missing quote is added on each side; line endings are kept.
pub fn wrap_quoted_lines(text: &str) -> Cow<'_, str> {
    if !text.contains("\";\"") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 64);
    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let ending = &line[body.len()..];
        if body.contains("\";\"") {
            if !body.starts_with('"') {
                out.push('"');
            }
            out.push_str(body);
            if !body.ends_with('"') {
                out.push('"');
            }
        } else {
            out.push_str(body);
        }
        out.push_str(ending);
    }
    Cow::Owned(out)
}
