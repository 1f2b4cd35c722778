//! Inbox-wide endpoints: statistics and chat.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use tracing::warn;

use super::AppState;
use super::error::ApiError;
use crate::inbox::model::InboxStats;

pub async fn stats(State(state): State<AppState>) -> Result<Json<InboxStats>, ApiError> {
    Ok(Json(state.db.inbox_stats().await?))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    message: String,
    #[serde(default)]
    context: Option<String>,
}

/// Answer a question about the inbox. LLM failures are reported in the
/// `response` text with an `error_kind`, not as an HTTP error.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload?;

    let mut context = state.db.inbox_stats().await?.chat_context();
    if let Some(extra) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        context.push('\n');
        context.push_str(extra);
    }

    match state.chat.ask(&request.message, Some(&context)).await {
        Ok(answer) => Ok(Json(serde_json::json!({"response": answer}))),
        Err(e) => {
            warn!(error = %e, "Chat request failed");
            Ok(Json(serde_json::json!({
                "response": format!("Error processing chat: {e}"),
                "error_kind": e.kind(),
            })))
        }
    }
}
