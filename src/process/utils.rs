use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Placeholder values the authority writes for missing data.
pub const NULL_SENTINELS: [&str; 4] = ["#NULO", "#NULO#", "#NE", "#NE#"];

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new("[0-9]+").expect("static regex"));

/// Trim whitespace and clear null sentinels.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if NULL_SENTINELS.contains(&trimmed) {
        ""
    } else {
        trimmed
    }
}

/// Compatibility-decomposes `text` and drops every non-ASCII code point.
pub fn unaccent(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}

/// The base normalization every canonical value goes through: trimmed,
/// sentinel-cleared, accent-stripped and uppercased.
pub fn normalize_value(raw: &str) -> String {
    let cleaned = clean_str(raw);
    if cleaned.is_ascii() {
        return cleaned.to_ascii_uppercase();
    }
    unaccent(cleaned).to_ascii_uppercase()
}

/// Concatenation of every ASCII digit run in `value`.
pub fn digits(value: &str) -> String {
    DIGIT_RUNS
        .find_iter(value)
        .map(|m| m.as_str())
        .collect::<String>()
}
