//! REST API over the inbox store and processing pipeline.

pub mod drafts;
pub mod emails;
pub mod error;
pub mod inbox;
pub mod prompts;

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::llm::provider::LlmProvider;
use crate::pipeline::{EmailTaskOrchestrator, InboxChat};
use crate::store::Database;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub orchestrator: Arc<EmailTaskOrchestrator>,
    pub chat: Arc<InboxChat>,
}

impl AppState {
    pub fn new(db: Arc<dyn Database>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            orchestrator: Arc::new(EmailTaskOrchestrator::new(Arc::clone(&db), Arc::clone(&llm))),
            chat: Arc::new(InboxChat::new(llm)),
            db,
        }
    }
}

/// Build the Axum router with every route and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/emails", get(emails::list_emails).post(emails::create_email))
        .route("/api/emails/{id}", get(emails::get_email))
        .route("/api/emails/{id}/read", put(emails::mark_read))
        .route("/api/emails/{id}/process", post(emails::process_email))
        .route(
            "/api/prompts",
            get(prompts::list_prompts).post(prompts::create_prompt),
        )
        .route(
            "/api/prompts/{id}",
            get(prompts::get_prompt)
                .put(prompts::update_prompt)
                .delete(prompts::delete_prompt),
        )
        .route("/api/drafts", get(drafts::list_drafts))
        .route("/api/drafts/{id}", get(drafts::get_draft))
        .route("/api/chat", post(inbox::chat))
        .route("/api/stats", get(inbox::stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inbox-assist"
    }))
}
