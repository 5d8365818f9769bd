//! Document synchronisation bookkeeping: which files an `LspClient` has
//! told the child server about, and at what version/content, so a redundant
//! `didChange` for unchanged content is never sent.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;

/// What the child language server believes about one open document.
#[derive(Debug, Clone)]
pub struct OpenedFile {
    pub version: i32,
    pub content_hash: u64,
}

fn hash_contents(contents: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    contents.hash(&mut hasher);
    hasher.finish()
}

/// Tracks one `OpenedFile` per URI for a single `LspClient`.
pub struct DocumentSync {
    opened: DashMap<String, OpenedFile>,
}

/// The action `reconcile` determined is needed to bring the child server's
/// view of a document in line with the editor's.
pub enum SyncAction {
    /// The document was not open; send `didOpen` with this version.
    Open { version: i32 },
    /// The document was open with stale content; send `didChange` with
    /// this version.
    Change { version: i32 },
    /// The document was already open with this exact content; nothing to
    /// send.
    Unchanged,
}

impl DocumentSync {
    pub fn new() -> Self {
        Self { opened: DashMap::new() }
    }

    /// Decides what sync action `uri`/`contents` needs and, unless it's
    /// `Unchanged`, records the new state as if that action had been sent.
    pub fn reconcile(&self, uri: &str, contents: &str) -> SyncAction {
        let hash = hash_contents(contents);
        match self.opened.get(uri) {
            None => {
                self.opened.insert(uri.to_string(), OpenedFile { version: 1, content_hash: hash });
                SyncAction::Open { version: 1 }
            }
            Some(existing) if existing.content_hash == hash => SyncAction::Unchanged,
            Some(existing) => {
                let version = existing.version + 1;
                drop(existing);
                self.opened.insert(uri.to_string(), OpenedFile { version, content_hash: hash });
                SyncAction::Change { version }
            }
        }
    }

    pub fn close(&self, uri: &str) {
        self.opened.remove(uri);
    }

    pub fn is_open(&self, uri: &str) -> bool {
        self.opened.contains_key(uri)
    }

    /// Every URI currently believed open, for diffing against a fresh
    /// `file_data` map during bulk reconciliation.
    pub fn tracked_uris(&self) -> Vec<String> {
        self.opened.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for DocumentSync {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sync_opens_the_document() {
        let sync = DocumentSync::new();
        assert!(matches!(sync.reconcile("file:///a.cpp", "int main() {}"), SyncAction::Open { version: 1 }));
    }

    #[test]
    fn unchanged_content_is_not_resent() {
        let sync = DocumentSync::new();
        sync.reconcile("file:///a.cpp", "int main() {}");
        assert!(matches!(sync.reconcile("file:///a.cpp", "int main() {}"), SyncAction::Unchanged));
    }

    #[test]
    fn changed_content_bumps_the_version() {
        let sync = DocumentSync::new();
        sync.reconcile("file:///a.cpp", "int main() {}");
        match sync.reconcile("file:///a.cpp", "int main() { return 0; }") {
            SyncAction::Change { version } => assert_eq!(version, 2),
            _ => panic!("expected a Change action"),
        }
    }

    #[test]
    fn close_forgets_the_document() {
        let sync = DocumentSync::new();
        sync.reconcile("file:///a.cpp", "int main() {}");
        sync.close("file:///a.cpp");
        assert!(!sync.is_open("file:///a.cpp"));
        assert!(matches!(sync.reconcile("file:///a.cpp", "int main() {}"), SyncAction::Open { version: 1 }));
    }

    #[test]
    fn tracked_uris_lists_every_open_document() {
        let sync = DocumentSync::new();
        sync.reconcile("file:///a.cpp", "int main() {}");
        sync.reconcile("file:///b.cpp", "int x;");
        let mut uris = sync.tracked_uris();
        uris.sort();
        assert_eq!(uris, vec!["file:///a.cpp".to_string(), "file:///b.cpp".to_string()]);
    }
}
