//! Filter-and-sort: given a query and a list of candidates, keep the ones
//! for which the query is a subsequence and rank the survivors by how good
//! a match they are.
//!
//! Two call sites: the dispatcher ranking raw identifier strings, and the
//! `/filter_and_sort_candidates` endpoint ranking caller-supplied JSON
//! values (each optionally keyed by `sort_property` when candidates are
//! objects rather than bare strings).

use std::cmp::Ordering;

use rayon::prelude::*;
use serde_json::Value;

use crate::candidate::char_bitmask;
use crate::error::AppError;

/// One candidate as seen by the scorer: its display text plus whatever
/// identifies it back to the caller's original value.
pub struct Word<'a> {
    pub index: usize,
    pub text: &'a str,
}

/// The result of matching `query` as a subsequence of a candidate's text.
/// Ordered so that `a < b` means "a should sort before b" — i.e. `a` is the
/// better match — which lets callers `sort_unstable_by_key` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Score {
    /// True if the query matches a prefix of the candidate's first "word"
    /// (the run of characters up to the first delimiter or case boundary).
    prefix_of_word: bool,
    /// True if the query is an exact prefix of the whole candidate text.
    prefix_of_candidate: bool,
    /// How many matched characters land on a word-boundary (start of
    /// string, after a delimiter, or an upper-case letter following a
    /// lower-case one) — a CamelCase- or snake_case-aware match is a
    /// better match than one scattered mid-word.
    word_boundary_starts: usize,
    /// True if the first matched character's case matches the query's
    /// first character's case exactly (an exact-case match beats a
    /// case-insensitive one, all else equal).
    case_match_first: bool,
    /// `query.len() * PRECISION / candidate.len()`, fixed-point so the
    /// type stays `Ord`: a denser match (query is most of the candidate)
    /// ranks above a sparse one.
    density: u32,
    /// Original position in the input, ascending — the final, stable
    /// tiebreak so equally good matches keep their input order.
    insertion_index: usize,
}

const DENSITY_PRECISION: u32 = 1_000_000;

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .prefix_of_word
            .cmp(&self.prefix_of_word)
            .then_with(|| other.prefix_of_candidate.cmp(&self.prefix_of_candidate))
            .then_with(|| other.word_boundary_starts.cmp(&self.word_boundary_starts))
            .then_with(|| other.case_match_first.cmp(&self.case_match_first))
            .then_with(|| other.density.cmp(&self.density))
            .then_with(|| self.insertion_index.cmp(&other.insertion_index))
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn is_word_boundary(bytes: &[u8], pos: usize) -> bool {
    if pos == 0 {
        return true;
    }
    let prev = bytes[pos - 1];
    let cur = bytes[pos];
    match prev {
        b'_' | b'-' | b'.' | b'/' | b' ' => true,
        _ => prev.is_ascii_lowercase() && cur.is_ascii_uppercase(),
    }
}

/// Attempts to match `query` as a subsequence of `text`. Smart-case: if
/// `query` contains an uppercase letter the match is case-sensitive,
/// otherwise case is ignored entirely.
fn score(query: &str, text: &str, insertion_index: usize) -> Option<Score> {
    if query.is_empty() {
        return Some(Score {
            prefix_of_word: true,
            prefix_of_candidate: true,
            word_boundary_starts: 0,
            case_match_first: true,
            density: 0,
            insertion_index,
        });
    }

    let case_sensitive = query.bytes().any(|b| b.is_ascii_uppercase());
    let qb = query.as_bytes();
    let tb = text.as_bytes();

    let eq = |a: u8, b: u8| if case_sensitive { a == b } else { a.eq_ignore_ascii_case(&b) };

    let mut qi = 0;
    let mut first_match_pos = None;
    let mut word_boundary_starts = 0;
    for (pos, &b) in tb.iter().enumerate() {
        if qi < qb.len() && eq(b, qb[qi]) {
            if first_match_pos.is_none() {
                first_match_pos = Some(pos);
            }
            if is_word_boundary(tb, pos) {
                word_boundary_starts += 1;
            }
            qi += 1;
        }
    }
    if qi < qb.len() {
        return None;
    }

    let first_match_pos = first_match_pos.unwrap_or(0);
    let prefix_of_candidate = first_match_pos == 0 && tb.len() >= qb.len() && {
        let head = &tb[..qb.len()];
        head.iter().zip(qb.iter()).all(|(&a, &b)| eq(a, b))
    };

    let word_end = tb
        .iter()
        .position(|&b| matches!(b, b'_' | b'-' | b'.' | b'/' | b' '))
        .unwrap_or(tb.len());
    let prefix_of_word = first_match_pos == 0
        && word_end >= qb.len()
        && tb[..word_end.min(tb.len())]
            .get(..qb.len())
            .map(|head| head.iter().zip(qb.iter()).all(|(&a, &b)| eq(a, b)))
            .unwrap_or(false);

    let case_match_first = tb.first().zip(qb.first()).map(|(&a, &b)| a == b).unwrap_or(false);

    let density = ((qb.len() as u64 * DENSITY_PRECISION as u64) / tb.len().max(1) as u64) as u32;

    Some(Score {
        prefix_of_word,
        prefix_of_candidate,
        word_boundary_starts,
        case_match_first,
        density,
        insertion_index,
    })
}

/// Filters and ranks `words` against `query`. `max_candidates == 0` means
/// "no limit" (return every surviving match). An empty query is a
/// passthrough: every candidate matches, ordered by `insertion_index`.
pub fn filter_and_sort<'a>(words: &[Word<'a>], query: &str, max_candidates: usize) -> Vec<usize> {
    let query_mask = char_bitmask(query);

    let mut scored: Vec<(usize, Score)> = words
        .par_iter()
        .filter_map(|w| {
            if !query.is_empty() && char_bitmask(w.text) & query_mask != query_mask {
                return None;
            }
            score(query, w.text, w.index).map(|s| (w.index, s))
        })
        .collect();

    if max_candidates != 0 && scored.len() > max_candidates {
        scored.select_nth_unstable_by(max_candidates - 1, |a, b| a.1.cmp(&b.1));
        scored.truncate(max_candidates);
    }
    scored.sort_unstable_by(|a, b| a.1.cmp(&b.1));
    scored.into_iter().map(|(idx, _)| idx).collect()
}

/// Extracts the text to score from a JSON candidate value: the value
/// itself if it's a string, or `value[sort_property]` when `sort_property`
/// is non-empty and the value is an object. Returns `None` (the candidate
/// is skipped, not rejected) if neither shape applies.
fn candidate_text<'a>(value: &'a Value, sort_property: &str) -> Option<&'a str> {
    if sort_property.is_empty() {
        return value.as_str();
    }
    value.get(sort_property).and_then(Value::as_str)
}

/// Implements `/filter_and_sort_candidates`: `candidates` may be bare
/// strings or JSON objects; `sort_property` names the object key to read
/// when they're objects (ignored, and must be `""`, when they're strings).
/// `sort_property` must itself be a JSON string — a non-string value is a
/// client error, not a silent coercion.
pub fn filter_and_sort_json(
    candidates: &[Value],
    sort_property: &Value,
    query: &str,
    max_candidates: usize,
) -> Result<Vec<Value>, AppError> {
    let sort_property = match sort_property {
        Value::String(s) => s.as_str(),
        Value::Null => "",
        _ => {
            return Err(AppError::BadRequest(
                "sort_property must be a string".to_string(),
            ))
        }
    };

    let texts: Vec<&str> = candidates
        .iter()
        .map(|c| candidate_text(c, sort_property).unwrap_or(""))
        .collect();
    let words: Vec<Word> =
        texts.iter().enumerate().map(|(index, &text)| Word { index, text }).collect();

    let order = filter_and_sort(&words, query, max_candidates);
    Ok(order.into_iter().map(|idx| candidates[idx].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words<'a>(texts: &[&'a str]) -> Vec<Word<'a>> {
        texts.iter().enumerate().map(|(index, &text)| Word { index, text }).collect()
    }

    #[test]
    fn empty_query_passes_through_in_original_order() {
        let w = words(&["zebra", "apple"]);
        let order = filter_and_sort(&w, "", 0);
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn non_subsequence_is_excluded() {
        let w = words(&["foobar"]);
        let order = filter_and_sort(&w, "xyz", 0);
        assert!(order.is_empty());
    }

    #[test]
    fn prefix_match_ranks_above_mid_word_match() {
        let w = words(&["xxfoo", "foobar"]);
        let order = filter_and_sort(&w, "foo", 0);
        assert_eq!(order[0], 1, "foobar is a prefix match and should rank first");
    }

    #[test]
    fn camel_case_boundary_beats_scattered_match() {
        let w = words(&["aSearchModule", "SearchModule"]);
        let order = filter_and_sort(&w, "SM", 0);
        assert_eq!(order[0], 1);
    }

    #[test]
    fn max_candidates_zero_means_unlimited() {
        let w = words(&["foo1", "foo2", "foo3"]);
        let order = filter_and_sort(&w, "foo", 0);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn max_candidates_limits_and_keeps_best() {
        let w = words(&["foo1", "foo2", "foobar"]);
        let order = filter_and_sort(&w, "foobar", 2);
        assert_eq!(order.len(), 1);
    }

    #[test]
    fn json_candidates_use_sort_property_key() {
        let candidates = vec![
            serde_json::json!({"text": "apple", "id": 1}),
            serde_json::json!({"text": "application", "id": 2}),
        ];
        let result = filter_and_sort_json(
            &candidates,
            &Value::String("text".to_string()),
            "app",
            0,
        )
        .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn non_string_sort_property_is_a_client_error() {
        let candidates = vec![serde_json::json!({"text": "apple"})];
        let err = filter_and_sort_json(&candidates, &Value::from(5), "app", 0);
        assert!(err.is_err());
    }
}
