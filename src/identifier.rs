//! Identifier extraction: the default identifier regex, a per-filetype
//! override table, and the single-line scans for "identifier under cursor"
//! and "identifier before cursor".

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// `[^\W\d]\w*` under Unicode word semantics: a word character that is not
/// a digit, followed by any number of word characters. `regex`'s `\w` is
/// Unicode-aware by default, matching the original's Unicode regex engine.
const DEFAULT_IDENTIFIER_PATTERN: &str = r"[^\W\d]\w*";

fn default_identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DEFAULT_IDENTIFIER_PATTERN).unwrap())
}

fn filetype_overrides() -> &'static HashMap<&'static str, Regex> {
    static MAP: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();
    MAP.get_or_init(HashMap::new)
}

/// Resolves the identifier regex for `filetype`, falling back to
/// [`DEFAULT_IDENTIFIER_PATTERN`] when there is no override.
pub fn identifier_regex_for_filetype(filetype: &str) -> &'static Regex {
    filetype_overrides().get(filetype).unwrap_or_else(|| default_identifier_regex())
}

/// Extracts every identifier match from `contents`, using `filetypes[0]`'s
/// regex (or the default). Preserves match order; does not deduplicate —
/// callers needing unique candidates are responsible for that.
pub fn identifiers_from_buffer(contents: &str, filetype: &str) -> Vec<String> {
    let regex = identifier_regex_for_filetype(filetype);
    regex.find_iter(contents).map(|m| m.as_str().to_string()).collect()
}

/// The identifier match spanning `index` (0-based char-count offset into
/// `line`): the first match whose end exceeds `index`. Matches never
/// overlap, so the first one that reaches past `index` is also the only one
/// that could contain it.
pub fn identifier_under_cursor(line: &str, column_num: usize, filetype: &str) -> String {
    let regex = identifier_regex_for_filetype(filetype);
    let index = column_num.saturating_sub(1);
    for m in regex.find_iter(line) {
        if m.end() > index {
            return m.as_str().to_string();
        }
    }
    String::new()
}

/// The identifier match closest to (but entirely before) `index`: the last
/// match whose end is `<= index`. Matches are yielded left to right with
/// strictly increasing ends, so scanning stops as soon as one reaches past
/// `index` — everything after it would too.
pub fn identifier_before_cursor(line: &str, column_num: usize, filetype: &str) -> String {
    let regex = identifier_regex_for_filetype(filetype);
    let index = column_num.saturating_sub(1);
    let mut last = String::new();
    for m in regex.find_iter(line) {
        if m.end() > index {
            break;
        }
        last = m.as_str().to_string();
    }
    last
}

pub fn is_identifier(s: &str, filetype: &str) -> bool {
    let regex = identifier_regex_for_filetype(filetype);
    regex.find(s).map(|m| m.start() == 0 && m.end() == s.len()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_identifiers_ignoring_punctuation() {
        let ids = identifiers_from_buffer("foo.bar(baz_123, 456)", "python");
        assert_eq!(ids, vec!["foo", "bar", "baz_123"]);
    }

    #[test]
    fn identifier_does_not_start_with_digit() {
        let ids = identifiers_from_buffer("123abc abc123", "python");
        assert_eq!(ids, vec!["abc", "abc123"]);
    }

    #[test]
    fn under_cursor_returns_identifier_spanning_index() {
        let got = identifier_under_cursor("foo.bar", 5, "python");
        assert_eq!(got, "bar");
    }

    #[test]
    fn before_cursor_returns_identifier_ending_at_or_before_index() {
        let got = identifier_before_cursor("foo.bar", 4, "python");
        assert_eq!(got, "foo");
    }

    #[test]
    fn before_cursor_returns_the_closest_match_not_the_first() {
        let got = identifier_before_cursor("foo.bar.baz", 12, "python");
        assert_eq!(got, "baz");
    }

    #[test]
    fn is_identifier_requires_full_match() {
        assert!(is_identifier("foo_bar", "python"));
        assert!(!is_identifier("123abc", "python"));
        assert!(!is_identifier("foo bar", "python"));
    }
}
