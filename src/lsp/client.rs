//! The LSP client core: spawns a child language server, performs the
//! `initialize` handshake, and multiplexes concurrent requests over its
//! single stdin/stdout pipe pair.
//!
//! One `LspClient` is spawned per filetype with a semantic engine and
//! shared by every request for that filetype (see `dispatcher.rs`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use lsp_types::{CompletionItem, CompletionParams, Position as LspPosition};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin};
use tokio::sync::{oneshot, Mutex, RwLock};

use crate::error::AppError;
use crate::jsonrpc::{read_message, write_message, Message, Notification, Request, RequestId, Response};
use crate::lsp::types::{file_uri, to_lsp_position};
use crate::lsp::workspace::{DocumentSync, SyncAction};
use crate::types::FileData;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// The client-side lifecycle of a spawned language server.
///
/// `Unstarted` exists only before `LspClient::spawn` returns; callers only
/// ever observe `Initialising` onward. `Ready → Draining → Stopped` models
/// an orderly shutdown; `Failed` is terminal and reached from
/// `Initialising` (handshake failure) or `Ready` (the child process died).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unstarted,
    Initialising,
    Ready,
    Failed,
    Draining,
    Stopped,
}

struct PendingRequest {
    sender: oneshot::Sender<Result<serde_json::Value, crate::jsonrpc::ResponseError>>,
}

/// A running (or failed) language server process and everything needed to
/// talk to it: a serialised write half, a table of in-flight requests
/// awaiting their response, and the document-sync state for every open
/// file.
pub struct LspClient {
    pub filetype: String,
    state: RwLock<ClientState>,
    stdin: Mutex<ChildStdin>,
    next_id: AtomicI64,
    pending: DashMap<RequestId, PendingRequest>,
    documents: DocumentSync,
    _child: Mutex<Child>,
}

impl LspClient {
    /// Locates `binary` on `PATH`, spawns it, and starts the background
    /// pump task that reads its stdout. Performs the `initialize`
    /// handshake before returning; a handshake failure leaves the client
    /// in `Failed` state rather than erroring the spawn itself, so callers
    /// can still inspect `state()` for diagnostics.
    pub async fn spawn(
        binary: &str,
        filetype: &str,
        workspace_root: &std::path::Path,
    ) -> Result<Arc<Self>, AppError> {
        let path = which::which(binary).map_err(|e| {
            AppError::Internal(format!("could not locate '{binary}' on PATH: {e}"))
        })?;

        let mut child = tokio::process::Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let client = Arc::new(Self {
            filetype: filetype.to_string(),
            state: RwLock::new(ClientState::Unstarted),
            stdin: Mutex::new(stdin),
            next_id: AtomicI64::new(1),
            pending: DashMap::new(),
            documents: DocumentSync::new(),
            _child: Mutex::new(child),
        });

        let pump_client = client.clone();
        tokio::spawn(async move {
            pump_client.run_pump(BufReader::new(stdout)).await;
        });

        *client.state.write().await = ClientState::Initialising;
        let root_uri = file_uri(&workspace_root.to_string_lossy());
        let init_params = serde_json::json!({
            "processId": std::process::id(),
            "rootUri": root_uri.map(|u| u.to_string()),
            "capabilities": {},
        });

        match tokio::time::timeout(
            INITIALIZE_TIMEOUT,
            client.call("initialize", init_params),
        )
        .await
        {
            Ok(Ok(_)) => {
                client.notify("initialized", serde_json::json!({})).await.ok();
                *client.state.write().await = ClientState::Ready;
                tracing::info!(filetype, "language server ready");
            }
            Ok(Err(e)) => {
                tracing::warn!(filetype, error = %e, "language server initialize failed");
                *client.state.write().await = ClientState::Failed;
            }
            Err(_) => {
                tracing::warn!(filetype, "language server initialize timed out");
                *client.state.write().await = ClientState::Failed;
            }
        }

        Ok(client)
    }

    pub async fn state(&self) -> ClientState {
        *self.state.read().await
    }

    /// Reads and dispatches messages from the child's stdout until it
    /// closes the pipe or sends something we cannot parse. Runs for the
    /// lifetime of the process as a detached Tokio task.
    async fn run_pump<R: tokio::io::AsyncBufRead + Unpin>(self: Arc<Self>, mut reader: R) {
        loop {
            match read_message(&mut reader).await {
                Ok(Some(Message::Response(resp))) => {
                    if let Some((_, pending)) = self.pending.remove(&resp.id) {
                        let result = match resp.error {
                            Some(err) => Err(err),
                            None => Ok(resp.result.unwrap_or(serde_json::Value::Null)),
                        };
                        let _ = pending.sender.send(result);
                    }
                }
                Ok(Some(Message::Notification(n))) => {
                    tracing::debug!(method = %n.method, "notification from language server");
                }
                Ok(Some(Message::Request(req))) => {
                    tracing::debug!(method = %req.method, "inbound request from language server, ignoring");
                }
                Ok(None) => {
                    tracing::info!(filetype = %self.filetype, "language server closed its output");
                    *self.state.write().await = ClientState::Failed;
                    break;
                }
                Err(e) => {
                    tracing::warn!(filetype = %self.filetype, error = %e, "error reading language server output");
                    *self.state.write().await = ClientState::Failed;
                    break;
                }
            }
        }
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Sends a request and awaits its matching response, correlated by a
    /// monotonically increasing id, with a bounded timeout so a wedged
    /// child process cannot hang an HTTP handler forever.
    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let id = self.next_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), PendingRequest { sender: tx });

        let request = Message::Request(Request::new(id.clone(), method, params));
        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = write_message(&mut *stdin, &request).await {
                self.pending.remove(&id);
                return Err(AppError::Spawn(e));
            }
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(AppError::LspError(err.message)),
            Ok(Err(_)) => Err(AppError::Internal("language server dropped the request".into())),
            Err(_) => {
                self.pending.remove(&id);
                Err(AppError::Timeout)
            }
        }
    }

    async fn notify(&self, method: &str, params: serde_json::Value) -> Result<(), AppError> {
        let notification = Message::Notification(Notification::new(method, params));
        let mut stdin = self.stdin.lock().await;
        write_message(&mut *stdin, &notification).await.map_err(AppError::Spawn)
    }

    /// Brings the child server's view of `uri` in line with `contents`,
    /// sending `didOpen` or `didChange` only when the content actually
    /// differs from what was last synchronised.
    pub async fn sync_file(&self, path: &str, contents: &str) -> Result<(), AppError> {
        let Some(uri) = file_uri(path) else {
            return Err(AppError::BadRequest(format!("could not build a file URI for {path}")));
        };
        match self.documents.reconcile(uri.as_str(), contents) {
            SyncAction::Unchanged => Ok(()),
            SyncAction::Open { version } => {
                self.notify(
                    "textDocument/didOpen",
                    serde_json::json!({
                        "textDocument": {
                            "uri": uri.to_string(),
                            "languageId": self.filetype,
                            "version": version,
                            "text": contents,
                        }
                    }),
                )
                .await
            }
            SyncAction::Change { version } => {
                self.notify(
                    "textDocument/didChange",
                    serde_json::json!({
                        "textDocument": { "uri": uri.to_string(), "version": version },
                        "contentChanges": [{ "text": contents }],
                    }),
                )
                .await
            }
        }
    }

    /// Reconciles the *entire* editor-visible buffer set against this
    /// client's `OpenedFile` table: syncs every still-open file of this
    /// client's filetype, and sends `didClose` for every tracked document
    /// that no longer appears in `file_data` at all — covering the case
    /// where a file drops out of the editor's open-buffer set silently,
    /// without an explicit `BufferUnload` naming it.
    pub async fn sync_files(&self, file_data: &HashMap<String, FileData>) {
        let mut live_uris = std::collections::HashSet::new();
        for (path, file) in file_data {
            if file.filetypes.first().map(|f| f.as_str()) != Some(self.filetype.as_str()) {
                continue;
            }
            let Some(uri) = file_uri(path) else { continue };
            live_uris.insert(uri.to_string());
            if let Err(e) = self.sync_file(path, &file.contents).await {
                tracing::warn!(path, error = %e, "failed to sync file to language server");
            }
        }

        for uri in self.documents.tracked_uris() {
            if live_uris.contains(&uri) {
                continue;
            }
            self.documents.close(&uri);
            if let Err(e) = self
                .notify("textDocument/didClose", serde_json::json!({ "textDocument": { "uri": uri } }))
                .await
            {
                tracing::warn!(uri, error = %e, "failed to close stale document on language server");
            }
        }
    }

    pub async fn close_file(&self, path: &str) -> Result<(), AppError> {
        let Some(uri) = file_uri(path) else {
            return Ok(());
        };
        if !self.documents.is_open(uri.as_str()) {
            return Ok(());
        }
        self.documents.close(uri.as_str());
        self.notify(
            "textDocument/didClose",
            serde_json::json!({ "textDocument": { "uri": uri.to_string() } }),
        )
        .await
    }

    /// `textDocument/completion` at `(line_num, column_num)` in `path`,
    /// given `line_text` to compute the UTF-16-approximate LSP column.
    pub async fn completion(
        &self,
        path: &str,
        line_num: usize,
        column_num: usize,
        line_text: &str,
    ) -> Result<Vec<CompletionItem>, AppError> {
        if self.state().await != ClientState::Ready {
            return Err(AppError::EngineNotReady);
        }
        let Some(uri) = file_uri(path) else {
            return Err(AppError::BadRequest(format!("could not build a file URI for {path}")));
        };
        let position: LspPosition = to_lsp_position(line_num, column_num, line_text);
        let params = CompletionParams {
            text_document_position: lsp_types::TextDocumentPositionParams {
                text_document: lsp_types::TextDocumentIdentifier { uri },
                position,
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: None,
        };

        let value = self.call("textDocument/completion", serde_json::to_value(params)?).await?;
        Ok(parse_completion_response(value))
    }

    /// Sends `shutdown` then `exit`, transitioning `Ready → Draining →
    /// Stopped`. Best-effort: failures are logged, not propagated, since
    /// the caller is tearing this client down regardless.
    pub async fn shutdown(&self) {
        *self.state.write().await = ClientState::Draining;
        if let Err(e) = self.call("shutdown", serde_json::Value::Null).await {
            tracing::warn!(filetype = %self.filetype, error = %e, "shutdown request failed");
        }
        if let Err(e) = self.notify("exit", serde_json::Value::Null).await {
            tracing::warn!(filetype = %self.filetype, error = %e, "exit notification failed");
        }
        *self.state.write().await = ClientState::Stopped;
    }
}

fn parse_completion_response(value: serde_json::Value) -> Vec<CompletionItem> {
    if value.is_null() {
        return Vec::new();
    }
    if let Ok(list) = serde_json::from_value::<lsp_types::CompletionList>(value.clone()) {
        return list.items;
    }
    serde_json::from_value::<Vec<CompletionItem>>(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array_completion_response() {
        let value = serde_json::json!([{ "label": "foo" }, { "label": "bar" }]);
        let items = parse_completion_response(value);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "foo");
    }

    #[test]
    fn parses_completion_list_response() {
        let value = serde_json::json!({ "isIncomplete": false, "items": [{ "label": "foo" }] });
        let items = parse_completion_response(value);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn null_response_is_no_completions() {
        assert!(parse_completion_response(serde_json::Value::Null).is_empty());
    }
}
