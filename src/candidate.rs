//! Candidate interning: every distinct completion string is stored once,
//! alongside the structures the filter-and-sort engine needs to score it
//! (lowercased text and a 64-bit character bitmask for O(1) fast-reject),
//! so repeated queries against the same identifier set never redo that
//! work.

use std::sync::Arc;

use dashmap::DashMap;

/// A 64-bit bitmask of which of a small alphabet's characters appear
/// anywhere in `s`: lowercase letters get bits 0-25, digits bits 26-35,
/// `_`, `-`, `.` get bits 36-38. A query whose bitmask is not a subset of a
/// candidate's bitmask cannot possibly be a subsequence of it, so this lets
/// the filter-and-sort engine reject most candidates without scanning them.
pub fn char_bitmask(s: &str) -> u64 {
    let mut mask: u64 = 0;
    for b in s.bytes() {
        let idx = match b {
            b'a'..=b'z' => (b - b'a') as u32,
            b'A'..=b'Z' => (b.to_ascii_lowercase() - b'a') as u32,
            b'0'..=b'9' => (b - b'0') as u32 + 26,
            b'_' => 36,
            b'-' => 37,
            b'.' => 38,
            _ => continue,
        };
        mask |= 1u64 << idx;
    }
    mask
}

/// An interned completion string with its precomputed scoring inputs.
pub struct Candidate {
    pub text: Arc<str>,
    pub text_lower: Arc<str>,
    pub bitmask: u64,
}

impl Candidate {
    fn new(text: &str) -> Self {
        let text_lower = text.to_lowercase();
        Self {
            bitmask: char_bitmask(&text_lower),
            text: Arc::from(text),
            text_lower: Arc::from(text_lower.as_str()),
        }
    }

    /// Whether every byte of `query`'s bitmask is present in this
    /// candidate's bitmask — a necessary (not sufficient) condition for
    /// `query` to be a subsequence of this candidate's text.
    pub fn could_contain(&self, query_mask: u64) -> bool {
        self.bitmask & query_mask == query_mask
    }
}

/// Process-wide interning table mapping each distinct candidate string to
/// one shared `Candidate`, so the filter-and-sort engine and the
/// identifier database never pay to rebuild scoring structures for a
/// string they have already seen.
pub struct CandidateRepository {
    table: DashMap<Arc<str>, Arc<Candidate>>,
}

impl CandidateRepository {
    pub fn new() -> Self {
        Self { table: DashMap::new() }
    }

    /// Returns the interned `Candidate` for `text`, creating it on first
    /// use. Subsequent calls with an equal string return the same `Arc`.
    pub fn intern(&self, text: &str) -> Arc<Candidate> {
        if let Some(existing) = self.table.get(text) {
            return existing.clone();
        }
        let candidate = Arc::new(Candidate::new(text));
        self.table.entry(Arc::from(text)).or_insert(candidate).clone()
    }

    /// Interns every element of `texts`, in order, deduplicating against
    /// both the table and repeats within `texts` itself.
    pub fn intern_all<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Vec<Arc<Candidate>> {
        let mut seen = std::collections::HashSet::new();
        texts
            .into_iter()
            .filter(|t| seen.insert(*t))
            .map(|t| self.intern(t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for CandidateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_the_same_candidate_for_equal_strings() {
        let repo = CandidateRepository::new();
        let a = repo.intern("FooBar");
        let b = repo.intern("FooBar");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn bitmask_subset_check_rejects_impossible_queries() {
        let repo = CandidateRepository::new();
        let candidate = repo.intern("foo");
        let query_mask = char_bitmask("fooz");
        assert!(!candidate.could_contain(query_mask));
        assert!(candidate.could_contain(char_bitmask("fo")));
    }

    #[test]
    fn intern_all_deduplicates_repeats_within_input() {
        let repo = CandidateRepository::new();
        let interned = repo.intern_all(["a", "b", "a"]);
        assert_eq!(interned.len(), 2);
        assert_eq!(repo.len(), 2);
    }
}
