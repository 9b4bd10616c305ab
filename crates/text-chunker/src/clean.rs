use once_cell::sync::Lazy;
use regex::Regex;

// Word characters, whitespace and sentence punctuation survive; every other symbol becomes a space.
static DISALLOWED_SYMBOLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s.,;:!?()\[\]\-]").expect("Invalid symbol filter pattern"));

/// Normalize raw document text before chunking.
///
/// 1. Collapse whitespace runs (including newlines and tabs) to a single space
/// 2. Drop characters outside ASCII
/// 3. Replace symbols outside `. , ; : ! ? ( ) [ ] -` with a space
/// 4. Trim both ends
///
/// Total over any input; empty input yields an empty string.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let ascii: String = collapsed.chars().filter(char::is_ascii).collect();
    let filtered = DISALLOWED_SYMBOLS.replace_all(&ascii, " ");
    filtered.trim().to_string()
}
