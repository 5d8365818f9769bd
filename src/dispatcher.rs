//! The completion dispatcher: decides, per request, which completion
//! engine(s) to consult and how to merge their results.
//!
//! A filetype with a semantic engine tries that engine first; an empty or
//! failed semantic result falls back to the identifier engine, which is
//! always available. Both engines are gated by `min_num_of_chars_for_completion`
//! so a near-empty query doesn't trigger expensive work on every keystroke.

use serde::Serialize;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::request_wrap::RequestWrap;
use crate::types::{semantic_binary_for_filetype, working_dir_or, ServerState, SimpleRequest};

/// One completion candidate as returned to the editor.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionItemOut {
    pub insertion_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_menu_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl CompletionItemOut {
    fn identifier(text: String) -> Self {
        Self { insertion_text: text, extra_menu_info: None, detailed_info: None, kind: None }
    }

    fn from_lsp(item: lsp_types::CompletionItem) -> Self {
        Self {
            insertion_text: item.insert_text.unwrap_or(item.label),
            extra_menu_info: item.detail,
            detailed_info: item.documentation.map(|d| match d {
                lsp_types::Documentation::String(s) => s,
                lsp_types::Documentation::MarkupContent(m) => m.value,
            }),
            kind: item.kind.map(|k| format!("{k:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionsResponse {
    pub completions: Vec<CompletionItemOut>,
    pub completion_start_column: usize,
}

/// Returns the existing semantic engine for `filetype`, or spawns and
/// registers one. Two concurrent callers racing to spawn the same
/// filetype's engine both succeed; the second spawn's handle simply
/// replaces the first in the registry and the first process is left to be
/// reaped when its `Arc` is dropped — acceptable for a lazily-populated,
/// per-filetype cache that is never spawned at high frequency.
pub async fn get_or_spawn_engine(
    state: &ServerState,
    filetype: &str,
    req: &SimpleRequest,
) -> Result<std::sync::Arc<crate::lsp::LspClient>, AppError> {
    if let Some(existing) = state.semantic_engines.get(filetype) {
        return Ok(existing.clone());
    }
    let binary = semantic_binary_for_filetype(filetype)
        .ok_or_else(|| AppError::NoSemanticEngine(filetype.to_string()))?;
    let workspace_root = working_dir_or(req);
    let client = crate::lsp::LspClient::spawn(binary, filetype, &workspace_root).await?;
    state.semantic_engines.insert(filetype.to_string(), client.clone());
    Ok(client)
}

/// Implements `/completions`: resolves the query at the request's
/// position, consults the semantic engine (if any and not too-short a
/// query to bother), and falls back to the identifier engine.
pub async fn get_completions(
    state: &ServerState,
    req: &SimpleRequest,
) -> Result<CompletionsResponse, AppError> {
    let wrap = RequestWrap::new(req);
    let query = wrap.query();
    let filetype = wrap.first_filetype().to_string();
    let completion_start_column = wrap.start_column();

    let config = state.config.read().await.clone_relevant();

    let query_len = query.chars().count() as u32;
    if query_len < config.min_num_of_chars_for_completion && req.force_semantic != Some(true) {
        return Ok(CompletionsResponse { completions: Vec::new(), completion_start_column });
    }

    if let Some(engine_filetype) = semantic_binary_for_filetype(&filetype).map(|_| filetype.clone())
    {
        match get_or_spawn_engine(state, &engine_filetype, req).await {
            Ok(client) => {
                let line_text = wrap.line_bytes().to_string();
                match client.completion(&req.filepath, req.line_num, req.column_num, &line_text).await
                {
                    Ok(items) if !items.is_empty() => {
                        let completions =
                            items.into_iter().map(CompletionItemOut::from_lsp).collect();
                        return Ok(CompletionsResponse { completions, completion_start_column });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(filetype = %filetype, error = %e, "semantic completion failed, falling back to identifiers");
                    }
                }
            }
            Err(e) => {
                tracing::debug!(filetype = %filetype, error = %e, "semantic engine unavailable, falling back to identifiers");
            }
        }
    }

    let identifiers = state.identifiers.results_for_query_and_type(&query, &filetype, 0);
    let completions = identifiers
        .into_iter()
        .filter(|text| text.chars().count() as u32 >= config.min_num_identifier_candidate_chars)
        .map(CompletionItemOut::identifier)
        .collect();
    Ok(CompletionsResponse { completions, completion_start_column })
}

/// The handful of `ServerConfig` fields the dispatcher reads, cloned out
/// from behind the lock so the lock isn't held across the `.await`s below.
struct RelevantConfig {
    min_num_of_chars_for_completion: u32,
    min_num_identifier_candidate_chars: u32,
}

impl ServerConfig {
    fn clone_relevant(&self) -> RelevantConfig {
        RelevantConfig {
            min_num_of_chars_for_completion: self.min_num_of_chars_for_completion,
            min_num_identifier_candidate_chars: self.min_num_identifier_candidate_chars,
        }
    }
}
