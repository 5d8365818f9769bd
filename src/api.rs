//! HTTP handlers for the completion server.
//!
//! All request bodies share `SimpleRequest`'s shape; handlers resolve the
//! request's position via `RequestWrap` and hand off to the dispatcher,
//! the identifier database, or the filter-and-sort engine as appropriate.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatcher;
use crate::error::AppError;
use crate::filter_sort::filter_and_sort_json;
use crate::identifier::{identifier_before_cursor, identifier_under_cursor};
use crate::request_wrap::RequestWrap;
use crate::types::{
    semantic_binary_for_filetype, AppContext, EventName, EventNotificationRequest, SimpleRequest,
};

// ---------------------------------------------------------------------------
// Liveness / readiness / shutdown
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct IncludeSubserversQuery {
    #[serde(default)]
    include_subservers: bool,
}

pub async fn healthy() -> Json<bool> {
    Json(true)
}

/// Readiness additionally reflects whether every spawned semantic engine
/// has finished its handshake, when `include_subservers` is set.
pub async fn ready(
    State(ctx): State<AppContext>,
    Query(q): Query<IncludeSubserversQuery>,
) -> Json<bool> {
    let _ = ctx.state.config.read().await;
    if q.include_subservers {
        let clients: Vec<_> =
            ctx.state.semantic_engines.iter().map(|entry| entry.value().clone()).collect();
        for client in clients {
            if client.state().await != crate::lsp::ClientState::Ready {
                return Json(false);
            }
        }
    }
    Json(true)
}

pub async fn shutdown() -> Json<Value> {
    tracing::info!("shutdown requested, exiting");
    tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        std::process::exit(0);
    });
    Json(serde_json::json!({ "shutdown_ok": true }))
}

// ---------------------------------------------------------------------------
// /initialize
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub user_options: serde_json::Map<String, Value>,
}

pub async fn initialize(
    State(ctx): State<AppContext>,
    Json(req): Json<InitializeRequest>,
) -> Json<Value> {
    let mut config = ctx.state.config.write().await;
    config.merge_user_options(&req.user_options);
    Json(serde_json::json!({}))
}

// ---------------------------------------------------------------------------
// /completions
// ---------------------------------------------------------------------------

pub async fn completions(
    State(ctx): State<AppContext>,
    Json(req): Json<SimpleRequest>,
) -> Result<Json<dispatcher::CompletionsResponse>, AppError> {
    require_current_file(&req)?;
    let resp = dispatcher::get_completions(&ctx.state, &req).await?;
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// /event_notification
// ---------------------------------------------------------------------------

pub async fn event_notification(
    State(ctx): State<AppContext>,
    Json(body): Json<EventNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let req = &body.request;
    let Some(file) = req.current_file() else {
        return Ok(Json(serde_json::json!([])));
    };
    let filetype = file.filetypes.first().cloned().unwrap_or_default();

    match body.event_name {
        EventName::FileReadyToParse | EventName::FileSave | EventName::BufferVisit => {
            ctx.state.identifiers.reparse_buffer(
                &ctx.state.candidates,
                &filetype,
                &req.filepath,
                &file.contents,
            );
            if semantic_binary_for_filetype(&filetype).is_some() {
                if let Ok(client) = dispatcher::get_or_spawn_engine(&ctx.state, &filetype, req).await
                {
                    client.sync_files(&req.file_data).await;
                }
            }
        }
        EventName::BufferUnload => {
            let client = ctx.state.semantic_engines.get(filetype.as_str()).map(|e| e.value().clone());
            if let Some(client) = client {
                let _ = client.close_file(&req.filepath).await;
            }
        }
        EventName::InsertLeave => {
            let wrap = RequestWrap::new(req);
            let line = wrap.line_bytes();
            let word = identifier_under_cursor(line.as_str(), req.column_num, &filetype);
            if !word.is_empty() {
                ctx.state.identifiers.add_single_identifier(
                    &ctx.state.candidates,
                    &filetype,
                    &req.filepath,
                    word,
                );
            }
        }
        EventName::CurrentIdentifierFinished => {
            let wrap = RequestWrap::new(req);
            let line = wrap.line_bytes();
            let word = identifier_before_cursor(line.as_str(), req.column_num, &filetype);
            if !word.is_empty() {
                ctx.state.identifiers.add_single_identifier(
                    &ctx.state.candidates,
                    &filetype,
                    &req.filepath,
                    word,
                );
            }
        }
    }

    Ok(Json(serde_json::json!([])))
}

// ---------------------------------------------------------------------------
// /filter_and_sort_candidates
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct FilterAndSortRequest {
    pub candidates: Vec<Value>,
    #[serde(default)]
    pub sort_property: Value,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub max_candidates: usize,
}

pub async fn filter_and_sort_candidates(
    Json(req): Json<FilterAndSortRequest>,
) -> Result<Json<Vec<Value>>, AppError> {
    let result = filter_and_sort_json(
        &req.candidates,
        &req.sort_property,
        &req.query,
        req.max_candidates,
    )?;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Capability probes
// ---------------------------------------------------------------------------

pub async fn defined_subcommands() -> Json<Vec<&'static str>> {
    Json(vec![])
}

pub async fn semantic_completion_available(
    State(ctx): State<AppContext>,
    Json(req): Json<SimpleRequest>,
) -> Json<bool> {
    let filetype = req.first_filetype();
    if semantic_binary_for_filetype(filetype).is_none() {
        return Json(false);
    }
    let client = ctx.state.semantic_engines.get(filetype).map(|e| e.value().clone());
    let ready = match client {
        Some(c) => c.state().await == crate::lsp::ClientState::Ready,
        None => false,
    };
    Json(ready)
}

pub async fn signature_help_available() -> Json<&'static str> {
    Json("NO")
}

pub async fn detailed_diagnostic() -> Json<Value> {
    Json(serde_json::json!({ "message": "" }))
}

// ---------------------------------------------------------------------------
// Debug / diagnostics
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct DebugInfoResponse {
    pub uptime_seconds: u64,
    pub identifier_candidates_interned: usize,
    pub semantic_engines: Vec<String>,
    pub extra_conf: Value,
}

pub async fn debug_info(State(ctx): State<AppContext>) -> Json<DebugInfoResponse> {
    let config = ctx.state.config.read().await;
    Json(DebugInfoResponse {
        uptime_seconds: ctx.state.started_at.elapsed().as_secs(),
        identifier_candidates_interned: ctx.state.candidates.len(),
        semantic_engines: ctx.state.semantic_engines.iter().map(|e| e.key().clone()).collect(),
        extra_conf: Value::Object(config.raw.clone()),
    })
}

pub async fn receive_messages() -> Json<Vec<Value>> {
    Json(vec![])
}

pub async fn semantic_tokens() -> Json<Vec<Value>> {
    Json(vec![])
}

pub async fn inlay_hints() -> Json<Vec<Value>> {
    Json(vec![])
}

pub async fn run_completer_command() -> Result<Json<Value>, AppError> {
    Err(AppError::BadRequest("no completer subcommands are implemented".to_string()))
}

// ---------------------------------------------------------------------------
// Shared validation
// ---------------------------------------------------------------------------

fn require_current_file(req: &SimpleRequest) -> Result<(), AppError> {
    if req.current_file().is_none() {
        return Err(AppError::UnknownFile(req.filepath.clone()));
    }
    Ok(())
}
