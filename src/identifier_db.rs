//! The lexical identifier completer: a database of identifiers seen in
//! every open buffer, bucketed per `(filetype, filepath)` so a file's
//! identifiers can be wholesale replaced on reparse without disturbing any
//! other file's contribution.
//!
//! Every identifier string is interned through the shared
//! [`CandidateRepository`] rather than stored as a fresh `String` per
//! occurrence — the same identifier recurring across a file (or across many
//! files) shares one allocation and one precomputed bitmask.

use std::sync::Arc;

use dashmap::DashMap;

use crate::candidate::{Candidate, CandidateRepository};
use crate::filter_sort::{filter_and_sort, Word};
use crate::identifier::identifiers_from_buffer;

/// One file's contribution to the identifier database: the full set of
/// identifiers last extracted from it, replaced atomically on each
/// `FileReadyToParse` reparse.
pub struct IdentifierDatabase {
    buckets: DashMap<(String, String), Vec<Arc<Candidate>>>,
}

impl IdentifierDatabase {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Replaces `(filetype, filepath)`'s bucket with `candidates`,
    /// discarding whatever identifiers that file previously contributed —
    /// the `FileReadyToParse` / reparse path.
    pub fn clear_for_file_and_add(
        &self,
        filetype: &str,
        filepath: &str,
        candidates: Vec<Arc<Candidate>>,
    ) {
        self.buckets.insert((filetype.to_string(), filepath.to_string()), candidates);
    }

    /// Extracts identifiers from `contents` using `filetype`'s regex,
    /// interns them through `repository`, and replaces `filepath`'s bucket
    /// with the result.
    pub fn reparse_buffer(
        &self,
        repository: &CandidateRepository,
        filetype: &str,
        filepath: &str,
        contents: &str,
    ) {
        let raw = identifiers_from_buffer(contents, filetype);
        let candidates = repository.intern_all(raw.iter().map(|s| s.as_str()));
        self.clear_for_file_and_add(filetype, filepath, candidates);
    }

    /// Interns and appends a single identifier to `filepath`'s bucket
    /// without disturbing the rest — the `InsertLeave` /
    /// `CurrentIdentifierFinished` path, where only the just-typed
    /// identifier is new.
    pub fn add_single_identifier(
        &self,
        repository: &CandidateRepository,
        filetype: &str,
        filepath: &str,
        candidate: String,
    ) {
        if candidate.is_empty() {
            return;
        }
        let interned = repository.intern(&candidate);
        self.buckets
            .entry((filetype.to_string(), filepath.to_string()))
            .or_default()
            .push(interned);
    }

    /// Ranks every identifier across every file whose filetype matches
    /// `filetype`, plus every file bucketed under the "any filetype" empty
    /// string (or every file outright, if `filetype` itself is empty),
    /// against `query`, deduplicated, most relevant first.
    pub fn results_for_query_and_type(
        &self,
        query: &str,
        filetype: &str,
        max_candidates: usize,
    ) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut all: Vec<Arc<Candidate>> = Vec::new();
        for entry in self.buckets.iter() {
            let (entry_filetype, _filepath) = entry.key();
            if !filetype.is_empty() && entry_filetype != filetype && !entry_filetype.is_empty() {
                continue;
            }
            for candidate in entry.value() {
                if seen.insert(candidate.text.clone()) {
                    all.push(candidate.clone());
                }
            }
        }

        let words: Vec<Word> =
            all.iter().enumerate().map(|(index, c)| Word { index, text: c.text.as_ref() }).collect();
        let order = filter_and_sort(&words, query, max_candidates);
        order.into_iter().map(|idx| all[idx].text.to_string()).collect()
    }
}

impl Default for IdentifierDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reparse_replaces_the_files_bucket() {
        let repo = CandidateRepository::new();
        let db = IdentifierDatabase::new();
        db.reparse_buffer(&repo, "python", "a.py", "foo bar");
        db.reparse_buffer(&repo, "python", "a.py", "baz");
        let results = db.results_for_query_and_type("", "python", 0);
        assert_eq!(results, vec!["baz".to_string()]);
    }

    #[test]
    fn results_are_filtered_by_filetype() {
        let repo = CandidateRepository::new();
        let db = IdentifierDatabase::new();
        db.reparse_buffer(&repo, "python", "a.py", "foo");
        db.reparse_buffer(&repo, "cpp", "a.cpp", "bar");
        assert_eq!(db.results_for_query_and_type("", "python", 0), vec!["foo".to_string()]);
        assert_eq!(db.results_for_query_and_type("", "cpp", 0), vec!["bar".to_string()]);
    }

    #[test]
    fn empty_filetype_searches_every_file() {
        let repo = CandidateRepository::new();
        let db = IdentifierDatabase::new();
        db.reparse_buffer(&repo, "python", "a.py", "foo");
        db.reparse_buffer(&repo, "cpp", "a.cpp", "bar");
        let mut results = db.results_for_query_and_type("", "", 0);
        results.sort();
        assert_eq!(results, vec!["bar".to_string(), "foo".to_string()]);
    }

    #[test]
    fn add_single_identifier_does_not_clear_existing_ones() {
        let repo = CandidateRepository::new();
        let db = IdentifierDatabase::new();
        db.reparse_buffer(&repo, "python", "a.py", "foo");
        db.add_single_identifier(&repo, "python", "a.py", "bar".to_string());
        let mut results = db.results_for_query_and_type("", "python", 0);
        results.sort();
        assert_eq!(results, vec!["bar".to_string(), "foo".to_string()]);
    }

    #[test]
    fn any_filetype_bucket_is_included_in_concrete_filetype_queries() {
        let repo = CandidateRepository::new();
        let db = IdentifierDatabase::new();
        db.reparse_buffer(&repo, "python", "a.py", "foo");
        db.reparse_buffer(&repo, "", "b.txt", "bar");
        let mut results = db.results_for_query_and_type("", "python", 0);
        results.sort();
        assert_eq!(results, vec!["bar".to_string(), "foo".to_string()]);
    }

    #[test]
    fn repeated_identifiers_share_one_interned_candidate() {
        let repo = CandidateRepository::new();
        let db = IdentifierDatabase::new();
        db.reparse_buffer(&repo, "python", "a.py", "foo foo foo");
        db.reparse_buffer(&repo, "python", "b.py", "foo bar");
        assert_eq!(repo.len(), 2);
    }
}
