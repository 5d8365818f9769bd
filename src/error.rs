//! The single error type returned by every HTTP handler.
//!
//! Client errors (bad input) render as `{"error": "..."}` with a 4xx
//! status; everything else is an internal error and renders the
//! `{exception, message, traceback}` shape the completion protocol expects,
//! so a crashing completer is visible to the editor instead of silently
//! returning nothing.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unknown filepath: {0}")]
    UnknownFile(String),

    #[error("no semantic completer available for filetype {0}")]
    NoSemanticEngine(String),

    #[error("semantic engine is not ready yet")]
    EngineNotReady,

    #[error("semantic engine process exited")]
    EngineStopped,

    #[error("request to semantic engine timed out")]
    Timeout,

    #[error("failed to spawn language server: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("language server returned an error: {0}")]
    LspError(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::UnknownFile(_) => StatusCode::BAD_REQUEST,
            AppError::NoSemanticEngine(_) => StatusCode::BAD_REQUEST,
            AppError::EngineNotReady => StatusCode::SERVICE_UNAVAILABLE,
            AppError::EngineStopped => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Spawn(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::LspError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(error = %self, %status, "request failed");

        let body = if self.is_client_error() {
            json!({ "error": self.to_string() })
        } else {
            json!({
                "exception": exception_name(&self),
                "message": self.to_string(),
                "traceback": "",
            })
        };

        (status, Json(body)).into_response()
    }
}

fn exception_name(err: &AppError) -> &'static str {
    match err {
        AppError::BadRequest(_) => "ValueError",
        AppError::UnknownFile(_) => "ValueError",
        AppError::NoSemanticEngine(_) => "ValueError",
        AppError::EngineNotReady => "RuntimeError",
        AppError::EngineStopped => "RuntimeError",
        AppError::Timeout => "TimeoutError",
        AppError::Spawn(_) => "OSError",
        AppError::LspError(_) => "RuntimeError",
        AppError::Json(_) => "ValueError",
        AppError::Internal(_) => "RuntimeError",
    }
}
