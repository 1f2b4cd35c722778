//! Prompt template CRUD.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use tracing::info;

use super::AppState;
use super::error::ApiError;
use crate::inbox::model::{NewPrompt, Prompt, PromptUpdate};

pub async fn list_prompts(State(state): State<AppState>) -> Result<Json<Vec<Prompt>>, ApiError> {
    Ok(Json(state.db.list_prompts().await?))
}

pub async fn get_prompt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Prompt>, ApiError> {
    state
        .db
        .get_prompt(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Prompt"))
}

pub async fn create_prompt(
    State(state): State<AppState>,
    payload: Result<Json<NewPrompt>, JsonRejection>,
) -> Result<Json<Prompt>, ApiError> {
    let Json(new_prompt) = payload?;
    if new_prompt.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Prompt name must not be empty".into()));
    }
    let prompt = state.db.insert_prompt(&new_prompt).await?;
    info!(prompt_id = prompt.id, name = %prompt.name, "Prompt created via API");
    Ok(Json(prompt))
}

pub async fn update_prompt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<PromptUpdate>, JsonRejection>,
) -> Result<Json<Prompt>, ApiError> {
    let Json(update) = payload?;
    state
        .db
        .update_prompt(id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Prompt"))
}

pub async fn delete_prompt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.db.delete_prompt(id).await? {
        Ok(Json(serde_json::json!({"message": "Prompt deleted"})))
    } else {
        Err(ApiError::not_found("Prompt"))
    }
}
