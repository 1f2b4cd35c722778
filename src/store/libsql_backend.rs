//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. IDs are SQLite integer
//! row IDs; timestamps are written as RFC 3339.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::inbox::model::{
    Draft, Email, EmailFilter, InboxStats, NewDraft, NewEmail, NewPrompt, Prompt, PromptType,
    PromptUpdate,
};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
/// Every write takes `tx_lock`, so no statement can land inside another
/// caller's open transaction.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    tx_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Pool(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            tx_lock: Mutex::new(()),
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            tx_lock: Mutex::new(()),
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a query expected to return a single integer.
    async fn count(&self, op: &str, sql: &str) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, ())
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;
        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}"))),
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }

    /// Run a `label, COUNT(*)` grouping query into a map.
    async fn grouped_counts(
        &self,
        op: &str,
        sql: &str,
    ) -> Result<BTreeMap<String, i64>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, ())
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut counts = BTreeMap::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            let label: String = row.get::<String>(0).unwrap_or_default();
            let count: i64 = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}")))?;
            counts.insert(label, count);
        }
        Ok(counts)
    }

    /// Reject a write that would leave two active prompts of one type.
    async fn ensure_no_other_active(
        &self,
        prompt_type: PromptType,
        except_id: Option<i64>,
    ) -> Result<(), DatabaseError> {
        let active = self.active_prompts(prompt_type).await?;
        if let Some(other) = active.iter().find(|p| Some(p.id) != except_id) {
            return Err(DatabaseError::Constraint(format!(
                "an active {prompt_type} prompt already exists (id {}, '{}')",
                other.id, other.name
            )));
        }
        Ok(())
    }

    async fn collect_emails(
        &self,
        op: &str,
        mut rows: libsql::Rows,
    ) -> Result<Vec<Email>, DatabaseError> {
        let mut emails = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            emails.push(
                row_to_email(&row)
                    .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}")))?,
            );
        }
        Ok(emails)
    }

    async fn collect_prompts(
        &self,
        op: &str,
        mut rows: libsql::Rows,
    ) -> Result<Vec<Prompt>, DatabaseError> {
        let mut prompts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            match row_to_prompt(&row) {
                Ok(Some(prompt)) => prompts.push(prompt),
                Ok(None) => {}
                Err(e) => return Err(DatabaseError::Query(format!("{op} row parse: {e}"))),
            }
        }
        Ok(prompts)
    }

    async fn collect_drafts(
        &self,
        op: &str,
        mut rows: libsql::Rows,
    ) -> Result<Vec<Draft>, DatabaseError> {
        let mut drafts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            drafts.push(
                row_to_draft(&row)
                    .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}")))?,
            );
        }
        Ok(drafts)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Legacy SQLAlchemy rows: space-separated with fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Read a 0/1 column as bool. Legacy rows may hold NULL.
fn get_bool(row: &libsql::Row, idx: i32) -> bool {
    row.get::<i64>(idx).map(|v| v != 0).unwrap_or(false)
}

/// Map a write error, surfacing UNIQUE violations as `Constraint`.
fn write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        if message.contains("prompts.name") {
            DatabaseError::Constraint("a prompt with that name already exists".to_string())
        } else {
            DatabaseError::Constraint(format!("{op}: {message}"))
        }
    } else {
        DatabaseError::Query(format!("{op}: {message}"))
    }
}

const EMAIL_COLUMNS: &str = "id, sender, sender_name, recipient, subject, body, category, priority, sentiment, received_at, is_read, has_action_items, action_items";

const PROMPT_COLUMNS: &str = "id, name, prompt_type, content, is_active, created_at, updated_at";

const DRAFT_COLUMNS: &str = "id, email_id, subject, body, tone, created_at, is_sent";

/// Map a libsql Row to an Email.
///
/// Column order matches EMAIL_COLUMNS. Labels outside the closed sets (from
/// legacy rows) read as their defaults.
fn row_to_email(row: &libsql::Row) -> Result<Email, libsql::Error> {
    let received_str: String = row.get::<String>(9).unwrap_or_default();
    Ok(Email {
        id: row.get(0)?,
        sender: row.get::<String>(1).unwrap_or_default(),
        sender_name: row.get::<String>(2).unwrap_or_default(),
        recipient: row.get::<String>(3).unwrap_or_default(),
        subject: row.get::<String>(4).unwrap_or_default(),
        body: row.get::<String>(5).unwrap_or_default(),
        category: row
            .get::<String>(6)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
        priority: row
            .get::<String>(7)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
        sentiment: row.get::<String>(8).ok().and_then(|s| s.parse().ok()),
        received_at: parse_datetime(&received_str),
        is_read: get_bool(row, 10),
        has_action_items: get_bool(row, 11),
        action_items: row.get::<String>(12).ok(),
    })
}

/// Map a libsql Row to a Prompt. Rows with an unrecognised prompt type are
/// skipped (`Ok(None)`).
fn row_to_prompt(row: &libsql::Row) -> Result<Option<Prompt>, libsql::Error> {
    let type_str: String = row.get(2)?;
    let Ok(prompt_type) = type_str.parse::<PromptType>() else {
        warn!(prompt_type = %type_str, "Skipping prompt with unknown type");
        return Ok(None);
    };
    let created_str: String = row.get::<String>(5).unwrap_or_default();
    let updated_str: String = row.get::<String>(6).unwrap_or_default();
    Ok(Some(Prompt {
        id: row.get(0)?,
        name: row.get(1)?,
        prompt_type,
        content: row.get::<String>(3).unwrap_or_default(),
        is_active: get_bool(row, 4),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    }))
}

/// Map a libsql Row to a Draft. Column order matches DRAFT_COLUMNS.
fn row_to_draft(row: &libsql::Row) -> Result<Draft, libsql::Error> {
    let created_str: String = row.get::<String>(5).unwrap_or_default();
    Ok(Draft {
        id: row.get(0)?,
        email_id: row.get(1)?,
        subject: row.get::<String>(2).unwrap_or_default(),
        body: row.get::<String>(3).unwrap_or_default(),
        tone: row.get::<String>(4).unwrap_or_default(),
        created_at: parse_datetime(&created_str),
        is_sent: get_bool(row, 6),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Emails ──────────────────────────────────────────────────────

    async fn insert_email(&self, email: &NewEmail) -> Result<Email, DatabaseError> {
        let _guard = self.tx_lock.lock().await;
        let received_at = email.received_at.unwrap_or_else(Utc::now);
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "INSERT INTO emails (sender, sender_name, recipient, subject, body, received_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {EMAIL_COLUMNS}"
                ),
                params![
                    email.sender.as_str(),
                    email.sender_name.as_str(),
                    email.recipient.as_str(),
                    email.subject.as_str(),
                    email.body.as_str(),
                    received_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| write_error("insert_email", e))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_email: {e}")))?
            .ok_or_else(|| DatabaseError::Query("insert_email: no row returned".into()))?;
        let stored = row_to_email(&row)
            .map_err(|e| DatabaseError::Query(format!("insert_email row parse: {e}")))?;

        debug!(email_id = stored.id, subject = %stored.subject, "Email inserted into DB");
        Ok(stored)
    }

    async fn get_email(&self, id: i64) -> Result<Option<Email>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let email = row_to_email(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_email row parse: {e}")))?;
                Ok(Some(email))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_email: {e}"))),
        }
    }

    async fn list_emails(&self, filter: EmailFilter) -> Result<Vec<Email>, DatabaseError> {
        let rows = match filter.category {
            Some(category) => self
                .conn()
                .query(
                    &format!(
                        "SELECT {EMAIL_COLUMNS} FROM emails WHERE category = ?1 \
                         ORDER BY id ASC LIMIT ?2 OFFSET ?3"
                    ),
                    params![category.as_str(), filter.limit as i64, filter.skip as i64],
                )
                .await,
            None => self
                .conn()
                .query(
                    &format!(
                        "SELECT {EMAIL_COLUMNS} FROM emails ORDER BY id ASC LIMIT ?1 OFFSET ?2"
                    ),
                    params![filter.limit as i64, filter.skip as i64],
                )
                .await,
        }
        .map_err(|e| DatabaseError::Query(format!("list_emails: {e}")))?;

        self.collect_emails("list_emails", rows).await
    }

    async fn mark_email_read(&self, id: i64) -> Result<bool, DatabaseError> {
        let _guard = self.tx_lock.lock().await;
        let affected = self
            .conn()
            .execute("UPDATE emails SET is_read = 1 WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_email_read: {e}")))?;

        debug!(email_id = id, "Email marked read");
        Ok(affected > 0)
    }

    async fn delete_duplicate_emails(&self) -> Result<usize, DatabaseError> {
        let _guard = self.tx_lock.lock().await;
        let removed = self
            .conn()
            .execute(
                "DELETE FROM emails WHERE id NOT IN (
                     SELECT MIN(id) FROM emails GROUP BY subject, sender, body
                 )",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_duplicate_emails: {e}")))?;

        info!(removed, "Duplicate emails deleted");
        Ok(removed as usize)
    }

    async fn inbox_stats(&self) -> Result<InboxStats, DatabaseError> {
        Ok(InboxStats {
            total_emails: self.count("inbox_stats", "SELECT COUNT(*) FROM emails").await?,
            unread_count: self
                .count("inbox_stats", "SELECT COUNT(*) FROM emails WHERE is_read = 0")
                .await?,
            categories: self
                .grouped_counts(
                    "inbox_stats",
                    "SELECT category, COUNT(*) FROM emails GROUP BY category",
                )
                .await?,
            priorities: self
                .grouped_counts(
                    "inbox_stats",
                    "SELECT priority, COUNT(*) FROM emails GROUP BY priority",
                )
                .await?,
            action_items_count: self
                .count(
                    "inbox_stats",
                    "SELECT COUNT(*) FROM emails WHERE has_action_items = 1",
                )
                .await?,
            drafts_count: self.count("inbox_stats", "SELECT COUNT(*) FROM drafts").await?,
        })
    }

    // ── Prompts ─────────────────────────────────────────────────────

    async fn insert_prompt(&self, prompt: &NewPrompt) -> Result<Prompt, DatabaseError> {
        let _guard = self.tx_lock.lock().await;
        if prompt.is_active {
            self.ensure_no_other_active(prompt.prompt_type, None).await?;
        }

        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "INSERT INTO prompts (name, prompt_type, content, is_active, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5) RETURNING {PROMPT_COLUMNS}"
                ),
                params![
                    prompt.name.as_str(),
                    prompt.prompt_type.as_str(),
                    prompt.content.as_str(),
                    prompt.is_active as i64,
                    now,
                ],
            )
            .await
            .map_err(|e| write_error("insert_prompt", e))?;

        let row = rows
            .next()
            .await
            .map_err(|e| write_error("insert_prompt", e))?
            .ok_or_else(|| DatabaseError::Query("insert_prompt: no row returned".into()))?;
        let stored = row_to_prompt(&row)
            .map_err(|e| DatabaseError::Query(format!("insert_prompt row parse: {e}")))?
            .ok_or_else(|| DatabaseError::Serialization("insert_prompt: bad prompt type".into()))?;

        info!(prompt_id = stored.id, prompt_type = %stored.prompt_type, active = stored.is_active, "Prompt created");
        Ok(stored)
    }

    async fn get_prompt(&self, id: i64) -> Result<Option<Prompt>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_prompt: {e}")))?;

        Ok(self
            .collect_prompts("get_prompt", rows)
            .await?
            .into_iter()
            .next())
    }

    async fn list_prompts(&self) -> Result<Vec<Prompt>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts ORDER BY id ASC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_prompts: {e}")))?;

        self.collect_prompts("list_prompts", rows).await
    }

    async fn update_prompt(
        &self,
        id: i64,
        update: &PromptUpdate,
    ) -> Result<Option<Prompt>, DatabaseError> {
        let _guard = self.tx_lock.lock().await;
        let Some(current) = self.get_prompt(id).await? else {
            return Ok(None);
        };

        let is_active = update.is_active.unwrap_or(current.is_active);
        if is_active {
            self.ensure_no_other_active(current.prompt_type, Some(id))
                .await?;
        }

        let name = update.name.as_deref().unwrap_or(&current.name);
        let content = update.content.as_deref().unwrap_or(&current.content);
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "UPDATE prompts SET name = ?1, content = ?2, is_active = ?3, updated_at = ?4 WHERE id = ?5",
                params![name, content, is_active as i64, now, id],
            )
            .await
            .map_err(|e| write_error("update_prompt", e))?;

        debug!(prompt_id = id, active = is_active, "Prompt updated");
        self.get_prompt(id).await
    }

    async fn delete_prompt(&self, id: i64) -> Result<bool, DatabaseError> {
        let _guard = self.tx_lock.lock().await;
        let affected = self
            .conn()
            .execute("DELETE FROM prompts WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_prompt: {e}")))?;

        debug!(prompt_id = id, deleted = affected > 0, "Prompt delete");
        Ok(affected > 0)
    }

    async fn active_prompts(&self, prompt_type: PromptType) -> Result<Vec<Prompt>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PROMPT_COLUMNS} FROM prompts WHERE prompt_type = ?1 AND is_active = 1 ORDER BY id ASC"
                ),
                params![prompt_type.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("active_prompts: {e}")))?;

        self.collect_prompts("active_prompts", rows).await
    }

    // ── Drafts ──────────────────────────────────────────────────────

    async fn list_drafts(&self, email_id: Option<i64>) -> Result<Vec<Draft>, DatabaseError> {
        let rows = match email_id {
            Some(email_id) => self
                .conn()
                .query(
                    &format!(
                        "SELECT {DRAFT_COLUMNS} FROM drafts WHERE email_id = ?1 ORDER BY id ASC"
                    ),
                    params![email_id],
                )
                .await,
            None => self
                .conn()
                .query(
                    &format!("SELECT {DRAFT_COLUMNS} FROM drafts ORDER BY id ASC"),
                    (),
                )
                .await,
        }
        .map_err(|e| DatabaseError::Query(format!("list_drafts: {e}")))?;

        self.collect_drafts("list_drafts", rows).await
    }

    async fn get_draft(&self, id: i64) -> Result<Option<Draft>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_draft: {e}")))?;

        Ok(self
            .collect_drafts("get_draft", rows)
            .await?
            .into_iter()
            .next())
    }

    // ── Processing ──────────────────────────────────────────────────

    async fn commit_processing(
        &self,
        email: &Email,
        drafts: &[NewDraft],
    ) -> Result<Vec<Draft>, DatabaseError> {
        let _guard = self.tx_lock.lock().await;

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit_processing begin: {e}")))?;

        let inserted = match write_processing(&tx, email, drafts).await {
            Ok(inserted) => inserted,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(email_id = email.id, error = %rollback_err, "Rollback failed");
                }
                return Err(e);
            }
        };

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit_processing commit: {e}")))?;

        debug!(
            email_id = email.id,
            drafts = inserted.len(),
            "Processing results committed"
        );
        Ok(inserted)
    }
}

/// Statements of one processing commit; runs inside the caller's transaction.
async fn write_processing(
    conn: &Connection,
    email: &Email,
    drafts: &[NewDraft],
) -> Result<Vec<Draft>, DatabaseError> {
    let affected = conn
        .execute(
            "UPDATE emails SET category = ?1, priority = ?2, sentiment = ?3, \
             has_action_items = ?4, action_items = ?5 WHERE id = ?6",
            params![
                email.category.as_str(),
                email.priority.as_str(),
                opt_text(email.sentiment.as_ref().map(|s| s.as_str())),
                email.has_action_items as i64,
                opt_text(email.action_items.as_deref()),
                email.id,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("commit_processing update: {e}")))?;

    if affected == 0 {
        return Err(DatabaseError::not_found("Email", email.id));
    }

    let now = Utc::now().to_rfc3339();
    let mut inserted = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let mut rows = conn
            .query(
                &format!(
                    "INSERT INTO drafts (email_id, subject, body, tone, created_at, is_sent) \
                     VALUES (?1, ?2, ?3, ?4, ?5, 0) RETURNING {DRAFT_COLUMNS}"
                ),
                params![
                    draft.email_id,
                    draft.subject.as_str(),
                    draft.body.as_str(),
                    draft.tone.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("commit_processing draft: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit_processing draft: {e}")))?
            .ok_or_else(|| DatabaseError::Query("commit_processing draft: no row returned".into()))?;
        inserted.push(
            row_to_draft(&row)
                .map_err(|e| DatabaseError::Query(format!("commit_processing row parse: {e}")))?,
        );
    }
    Ok(inserted)
}

// ── Tests ───────────────────────────────────────────────────────────
