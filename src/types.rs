//! Core wire and shared-state types for the completion server.
//!
//! `SimpleRequest` is the payload shape shared by almost every endpoint;
//! everything else in this module is process-wide state shared between the
//! HTTP handlers, the identifier completer, and the LSP clients.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::candidate::CandidateRepository;
use crate::config::ServerConfig;
use crate::identifier_db::IdentifierDatabase;
use crate::lsp::client::LspClient;

/// A 1-based line/column position within `filepath`. `column_num` is a
/// 1-based *byte* offset, never a codepoint offset (see GLOSSARY).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Position {
    pub line_num: usize,
    pub column_num: usize,
    pub filepath: String,
}

/// A single open buffer as seen by the editor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileData {
    /// Ordered filetypes; `filetypes[0]` is authoritative.
    pub filetypes: Vec<String>,
    pub contents: String,
}

/// The request body shared by most endpoints.
///
/// The distilled-from implementation is inconsistent about whether position
/// fields live at the top level or nested, and about `filepath` vs.
/// `file_path`. We settle on the flattened `filepath`/`column_num`/`line_num`
/// spelling and reject the alternates (open question, resolved in DESIGN.md).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimpleRequest {
    pub line_num: usize,
    pub column_num: usize,
    pub filepath: String,
    pub file_data: HashMap<String, FileData>,
    #[serde(default)]
    pub working_directory: String,
    #[serde(default)]
    pub extra_conf_data: serde_json::Value,
    /// Only meaningful on `/completions`; omitted entirely when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_semantic: Option<bool>,
}

impl SimpleRequest {
    pub fn position(&self) -> Position {
        Position {
            line_num: self.line_num,
            column_num: self.column_num,
            filepath: self.filepath.clone(),
        }
    }

    /// The `FileData` for `filepath`: `filepath` is required to be a key of
    /// `file_data` by every handler that reads buffer content.
    pub fn current_file(&self) -> Option<&FileData> {
        self.file_data.get(&self.filepath)
    }

    pub fn first_filetype(&self) -> &str {
        self.current_file()
            .and_then(|f| f.filetypes.first())
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

/// Event names recognised by `/event_notification`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EventName {
    FileReadyToParse,
    FileSave,
    BufferVisit,
    BufferUnload,
    InsertLeave,
    CurrentIdentifierFinished,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventNotificationRequest {
    #[serde(flatten)]
    pub request: SimpleRequest,
    pub event_name: EventName,
}

/// Process-wide state shared by every HTTP handler and background task.
///
/// Rarely-mutated state (`ServerConfig`) sits behind a reader/writer lock;
/// frequently-mutated per-key state sits behind concurrent maps so readers
/// never block each other.
pub struct ServerState {
    pub config: tokio::sync::RwLock<ServerConfig>,
    pub candidates: CandidateRepository,
    pub identifiers: IdentifierDatabase,
    /// One lazily spawned LSP client per filetype with a semantic engine
    /// (currently just `cpp`; `python` is reserved, see dispatcher).
    pub semantic_engines: DashMap<String, Arc<LspClient>>,
    pub started_at: std::time::Instant,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: tokio::sync::RwLock::new(config),
            candidates: CandidateRepository::new(),
            identifiers: IdentifierDatabase::new(),
            semantic_engines: DashMap::new(),
            started_at: std::time::Instant::now(),
        }
    }
}

/// Axum application state: a shared handle to `ServerState`.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<ServerState>,
}

/// Resolve which semantic engine binary (if any) a filetype should use.
pub fn semantic_binary_for_filetype(filetype: &str) -> Option<&'static str> {
    match filetype {
        "cpp" | "c" | "objc" | "objcpp" => Some("clangd"),
        _ => None,
    }
}

pub fn working_dir_or(req: &SimpleRequest) -> PathBuf {
    if req.working_directory.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(&req.working_directory)
    }
}
