//! `Database` trait: single async interface for all persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::inbox::model::{
    Draft, Email, EmailFilter, InboxStats, NewDraft, NewEmail, NewPrompt, Prompt, PromptType,
    PromptUpdate,
};

/// Backend-agnostic database trait covering emails, prompts and drafts.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Emails ──────────────────────────────────────────────────────

    /// Insert a new email with default analysis fields.
    async fn insert_email(&self, email: &NewEmail) -> Result<Email, DatabaseError>;

    /// Get an email by ID.
    async fn get_email(&self, id: i64) -> Result<Option<Email>, DatabaseError>;

    /// List emails, optionally filtered by category, ordered by ID.
    async fn list_emails(&self, filter: EmailFilter) -> Result<Vec<Email>, DatabaseError>;

    /// Mark an email as read. Returns false if no such email.
    async fn mark_email_read(&self, id: i64) -> Result<bool, DatabaseError>;

    /// Delete all but the lowest-ID email of each (subject, sender, body) group.
    /// Returns the number of rows removed.
    async fn delete_duplicate_emails(&self) -> Result<usize, DatabaseError>;

    /// Aggregate counts over emails and drafts.
    async fn inbox_stats(&self) -> Result<InboxStats, DatabaseError>;

    // ── Prompts ─────────────────────────────────────────────────────

    /// Insert a prompt. Fails with `Constraint` if the name is taken or if it
    /// would be a second active prompt of its type.
    async fn insert_prompt(&self, prompt: &NewPrompt) -> Result<Prompt, DatabaseError>;

    /// Get a prompt by ID.
    async fn get_prompt(&self, id: i64) -> Result<Option<Prompt>, DatabaseError>;

    /// List all prompts ordered by ID.
    async fn list_prompts(&self) -> Result<Vec<Prompt>, DatabaseError>;

    /// Apply a partial update. Returns `None` if no such prompt. Same
    /// constraints as `insert_prompt`.
    async fn update_prompt(
        &self,
        id: i64,
        update: &PromptUpdate,
    ) -> Result<Option<Prompt>, DatabaseError>;

    /// Delete a prompt. Returns false if no such prompt.
    async fn delete_prompt(&self, id: i64) -> Result<bool, DatabaseError>;

    /// Active prompts of one type, lowest ID first.
    async fn active_prompts(&self, prompt_type: PromptType) -> Result<Vec<Prompt>, DatabaseError>;

    // ── Drafts ──────────────────────────────────────────────────────

    /// List drafts, optionally for a single email, ordered by ID.
    async fn list_drafts(&self, email_id: Option<i64>) -> Result<Vec<Draft>, DatabaseError>;

    /// Get a draft by ID.
    async fn get_draft(&self, id: i64) -> Result<Option<Draft>, DatabaseError>;

    // ── Processing ──────────────────────────────────────────────────

    /// Write an email's analysis fields and insert drafts as one unit.
    /// Returns the inserted drafts.
    async fn commit_processing(
        &self,
        email: &Email,
        drafts: &[NewDraft],
    ) -> Result<Vec<Draft>, DatabaseError>;
}
