//! Text positioning: maps a `SimpleRequest` position into the semantic
//! quantities every completer needs — the identifier-boundary-aware query
//! and its start column, byte and codepoint variants alike.
//!
//! `column_num` on the wire is a 1-based byte offset; identifier regexes
//! and "longest identifier ending at" math want codepoint offsets, so most
//! of this module is conversion plumbing around a single lazily computed
//! chain, mirroring the distilled-from implementation's `Lazy<T>` fields.

use std::cell::RefCell;

use crate::identifier::identifier_regex_for_filetype;
use crate::types::SimpleRequest;

/// Lazily memoized, single-assignment cache cell — the Rust analogue of the
/// distilled-from implementation's `Lazy<T>` helper type.
struct Lazy<T> {
    value: RefCell<Option<T>>,
}

impl<T: Clone> Lazy<T> {
    fn new() -> Self {
        Self { value: RefCell::new(None) }
    }

    fn get_or_init(&self, builder: impl FnOnce() -> T) -> T {
        if self.value.borrow().is_none() {
            *self.value.borrow_mut() = Some(builder());
        }
        self.value.borrow().as_ref().unwrap().clone()
    }
}

/// Wraps a `SimpleRequest` with the derived positional fields a completer
/// needs, computed once and cached on first access.
pub struct RequestWrap<'a> {
    req: &'a SimpleRequest,
    lines: Lazy<std::rc::Rc<Vec<String>>>,
    line_bytes: Lazy<std::rc::Rc<String>>,
    line_chars: Lazy<std::rc::Rc<Vec<char>>>,
    first_filetype: Lazy<std::rc::Rc<String>>,
    column_codepoint: Lazy<usize>,
    start_codepoint: Lazy<usize>,
    start_column: Lazy<usize>,
}

impl<'a> RequestWrap<'a> {
    pub fn new(req: &'a SimpleRequest) -> Self {
        Self {
            req,
            lines: Lazy::new(),
            line_bytes: Lazy::new(),
            line_chars: Lazy::new(),
            first_filetype: Lazy::new(),
            column_codepoint: Lazy::new(),
            start_codepoint: Lazy::new(),
            start_column: Lazy::new(),
        }
    }

    /// Splits the current file's contents on `\n`. An empty buffer yields a
    /// single empty line, matching how a freshly opened empty file reads.
    pub fn lines(&self) -> std::rc::Rc<Vec<String>> {
        self.lines.get_or_init(|| {
            let contents = self
                .req
                .current_file()
                .map(|f| f.contents.as_str())
                .unwrap_or("");
            std::rc::Rc::new(split_lines(contents))
        })
    }

    /// The raw UTF-8 bytes of `req.line_num`'s line, or `""` if out of range.
    pub fn line_bytes(&self) -> std::rc::Rc<String> {
        self.line_bytes.get_or_init(|| {
            let lines = self.lines();
            let idx = self.req.line_num.checked_sub(1);
            let line = idx
                .and_then(|i| lines.get(i))
                .cloned()
                .unwrap_or_default();
            std::rc::Rc::new(line)
        })
    }

    fn line_chars(&self) -> std::rc::Rc<Vec<char>> {
        self.line_chars
            .get_or_init(|| std::rc::Rc::new(self.line_bytes().chars().collect()))
    }

    /// `file_data[filepath].filetypes[0]`, or `""` if there is no such file.
    pub fn first_filetype(&self) -> std::rc::Rc<String> {
        self.first_filetype
            .get_or_init(|| std::rc::Rc::new(self.req.first_filetype().to_string()))
    }

    pub fn column_num(&self) -> usize {
        self.req.column_num
    }

    /// Codepoint count of the line up to (but not including) the cursor.
    /// `column_num` is a 1-based byte offset, so the byte prefix is
    /// `column_num - 1` bytes; this is that prefix's codepoint length, plus
    /// one to keep the same 1-based convention as `column_num` itself.
    pub fn column_codepoint(&self) -> usize {
        self.column_codepoint.get_or_init(|| {
            let bytes = self.line_bytes();
            let prefix_len = (self.req.column_num.saturating_sub(1)).min(bytes.len());
            let prefix = &bytes.as_str()[..byte_floor(&bytes, prefix_len)];
            prefix.chars().count() + 1
        })
    }

    /// 1-based codepoint index of the start of the longest identifier match
    /// ending exactly at `column_codepoint() - 1` (0-based codepoint cursor),
    /// the *StartOfLongestIdentifierEndingAt* algorithm. Only characters
    /// before the cursor are ever examined, so re-invoking completion from
    /// the middle of a longer token still sees just its leading fragment.
    /// Returns `column_codepoint()` (an empty identifier) when no match ends
    /// there.
    pub fn start_codepoint(&self) -> usize {
        self.start_codepoint.get_or_init(|| {
            let cursor = self.column_codepoint().saturating_sub(1);
            let chars = self.line_chars();
            let prefix_len = cursor.min(chars.len());
            let prefix: String = chars[..prefix_len].iter().collect();
            let regex = identifier_regex_for_filetype(&self.first_filetype());

            let last_match = regex.find_iter(&prefix).last();
            match last_match {
                Some(m) if prefix[m.end()..].chars().count() == 0 => {
                    let start_char = prefix[..m.start()].chars().count();
                    start_char + 1
                }
                _ => self.column_codepoint(),
            }
        })
    }

    /// Byte-offset equivalent of `start_codepoint()`, 1-based.
    pub fn start_column(&self) -> usize {
        self.start_column.get_or_init(|| {
            let chars = self.line_chars();
            let prefix_chars = self.start_codepoint().saturating_sub(1).min(chars.len());
            let prefix: String = chars[..prefix_chars].iter().collect();
            prefix.len() + 1
        })
    }

    /// The query text as codepoints, i.e. the identifier fragment before the
    /// cursor (possibly empty).
    pub fn query(&self) -> String {
        let chars = self.line_chars();
        let start = self.start_codepoint().saturating_sub(1).min(chars.len());
        let end = self.column_codepoint().saturating_sub(1).min(chars.len());
        if start >= end {
            return String::new();
        }
        chars[start..end].iter().collect()
    }

    /// Same text as `query()`, but the original UTF-8 byte slice rather
    /// than a fresh `String` built from codepoints.
    pub fn query_bytes(&self) -> String {
        let bytes = self.line_bytes();
        let start = self.start_column().saturating_sub(1).min(bytes.len());
        let end = self.column_num().saturating_sub(1).min(bytes.len());
        if start >= end {
            return String::new();
        }
        byte_slice(&bytes, start, end).to_string()
    }
}

/// Splits on `\n` only (no CRLF normalisation — a trailing `\r` stays part
/// of the line, matching how an editor's raw buffer is transmitted).
fn split_lines(contents: &str) -> Vec<String> {
    if contents.is_empty() {
        return vec![String::new()];
    }
    contents.split('\n').map(|s| s.to_string()).collect()
}

/// Rounds `n` down to the nearest valid UTF-8 char boundary in `s`, so a
/// byte offset landing mid-codepoint (a malformed `column_num`) never panics.
fn byte_floor(s: &str, mut n: usize) -> usize {
    n = n.min(s.len());
    while n > 0 && !s.is_char_boundary(n) {
        n -= 1;
    }
    n
}

fn byte_slice(s: &str, start: usize, end: usize) -> &str {
    let start = byte_floor(s, start);
    let end = byte_floor(s, end.max(start));
    &s[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileData, SimpleRequest};
    use std::collections::HashMap;

    fn request(contents: &str, line_num: usize, column_num: usize) -> SimpleRequest {
        let mut file_data = HashMap::new();
        file_data.insert(
            "foo.py".to_string(),
            FileData { filetypes: vec!["python".to_string()], contents: contents.to_string() },
        );
        SimpleRequest {
            line_num,
            column_num,
            filepath: "foo.py".to_string(),
            file_data,
            working_directory: String::new(),
            extra_conf_data: serde_json::Value::Null,
            force_semantic: None,
        }
    }

    #[test]
    fn query_is_identifier_prefix_before_cursor() {
        let req = request("foo.ba", 1, 7);
        let wrap = RequestWrap::new(&req);
        assert_eq!(wrap.query(), "ba");
        assert_eq!(wrap.query_bytes(), "ba");
    }

    #[test]
    fn cursor_at_start_of_line_has_empty_query() {
        let req = request("foobar", 1, 1);
        let wrap = RequestWrap::new(&req);
        assert_eq!(wrap.query(), "");
        assert_eq!(wrap.start_column(), 1);
    }

    #[test]
    fn cursor_past_identifier_boundary_has_empty_query() {
        let req = request("foo.bar ", 1, 9);
        let wrap = RequestWrap::new(&req);
        assert_eq!(wrap.query(), "");
    }

    #[test]
    fn multibyte_line_uses_codepoint_not_byte_width() {
        // "héllo_" — 'é' is 2 bytes, 1 codepoint.
        let req = request("héllo_wo", 1, 10);
        let wrap = RequestWrap::new(&req);
        assert_eq!(wrap.query(), "héllo_wo");
    }

    #[test]
    fn cursor_mid_token_only_sees_the_leading_fragment() {
        let req = request("foobar", 1, 4);
        let wrap = RequestWrap::new(&req);
        assert_eq!(wrap.query(), "foo");
    }

    #[test]
    fn out_of_range_line_num_yields_empty_line() {
        let req = request("abc", 5, 1);
        let wrap = RequestWrap::new(&req);
        assert_eq!(wrap.line_bytes().as_str(), "");
        assert_eq!(wrap.query(), "");
    }
}
