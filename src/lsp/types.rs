//! Conversions between this server's wire types and `lsp-types`' LSP wire
//! types.
//!
//! LSP positions are 0-based UTF-16 code-unit offsets; this server's
//! positions are 1-based UTF-8 byte offsets. We approximate the UTF-16
//! count with a codepoint count, which is exact for the entire Basic
//! Multilingual Plane and differs only for astral-plane characters
//! (surrogate pairs) — an acceptable approximation for completion
//! positioning, recorded as an open-question resolution in DESIGN.md.

use lsp_types::{Position as LspPosition, Url};

pub fn file_uri(path: &str) -> Option<Url> {
    if path.starts_with('/') {
        Url::from_file_path(path).ok()
    } else {
        let cwd = std::env::current_dir().ok()?;
        Url::from_file_path(cwd.join(path)).ok()
    }
}

/// Converts a 1-based byte `(line_num, column_num)` pair plus the line's
/// text into an LSP `Position`.
pub fn to_lsp_position(line_num: usize, column_num: usize, line_text: &str) -> LspPosition {
    let byte_prefix_len = (column_num.saturating_sub(1)).min(line_text.len());
    let mut boundary = byte_prefix_len;
    while boundary > 0 && !line_text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    let character = line_text[..boundary].chars().count() as u32;
    LspPosition { line: (line_num.saturating_sub(1)) as u32, character }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_ascii_position() {
        let pos = to_lsp_position(3, 5, "foobar");
        assert_eq!(pos.line, 2);
        assert_eq!(pos.character, 4);
    }

    #[test]
    fn file_uri_handles_absolute_paths() {
        let uri = file_uri("/tmp/foo.cpp").unwrap();
        assert_eq!(uri.scheme(), "file");
    }
}
