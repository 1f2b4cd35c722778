//! Email endpoints, including AI processing.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use super::error::ApiError;
use crate::inbox::model::{Category, DEFAULT_TONE, Email, EmailFilter, NewEmail};
use crate::pipeline::{ProcessOutcome, TaskSelection};

#[derive(Debug, Deserialize)]
pub struct ListEmailsQuery {
    category: Option<String>,
    skip: Option<u32>,
    limit: Option<u32>,
}

pub async fn list_emails(
    State(state): State<AppState>,
    query: Result<Query<ListEmailsQuery>, QueryRejection>,
) -> Result<Json<Vec<Email>>, ApiError> {
    let Query(query) = query?;

    let category = match query.category.as_deref().filter(|c| !c.is_empty()) {
        Some(raw) => Some(
            raw.parse::<Category>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    let defaults = EmailFilter::default();
    let filter = EmailFilter {
        category,
        skip: query.skip.unwrap_or(defaults.skip),
        limit: query.limit.unwrap_or(defaults.limit),
    };

    Ok(Json(state.db.list_emails(filter).await?))
}

pub async fn get_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Email>, ApiError> {
    state
        .db
        .get_email(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Email"))
}

pub async fn create_email(
    State(state): State<AppState>,
    payload: Result<Json<NewEmail>, JsonRejection>,
) -> Result<Json<Email>, ApiError> {
    let Json(new_email) = payload?;
    let email = state.db.insert_email(&new_email).await?;
    info!(email_id = email.id, sender = %email.sender, "Email created");
    Ok(Json(email))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.db.mark_email_read(id).await? {
        Ok(Json(serde_json::json!({"message": "Email marked as read"})))
    } else {
        Err(ApiError::not_found("Email"))
    }
}

/// Body of `POST /api/emails/{id}/process`. Every field is optional, and so
/// is the body itself.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    tasks: Option<Vec<String>>,
    #[serde(default)]
    tone: Option<String>,
}

pub async fn process_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<ProcessOutcome>, ApiError> {
    let request: ProcessRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid process request: {e}")))?
    };

    let tasks = match &request.tasks {
        Some(names) => TaskSelection::from_names(names),
        None => TaskSelection::all(),
    };
    let tone = request
        .tone
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TONE);

    let outcome = state.orchestrator.process_by_id(id, &tasks, tone).await?;
    Ok(Json(outcome))
}
