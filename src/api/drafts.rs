//! Draft listing.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;
use crate::inbox::model::Draft;

#[derive(Debug, Deserialize)]
pub struct ListDraftsQuery {
    email_id: Option<i64>,
}

pub async fn list_drafts(
    State(state): State<AppState>,
    query: Result<Query<ListDraftsQuery>, QueryRejection>,
) -> Result<Json<Vec<Draft>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.db.list_drafts(query.email_id).await?))
}

pub async fn get_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Draft>, ApiError> {
    state
        .db
        .get_draft(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Draft"))
}
