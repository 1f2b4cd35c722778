//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.
//! On first run against a legacy DB (tables created by the earlier
//! SQLAlchemy service, no `_migrations` table), it detects the existing
//! schema and seeds V1 without re-creating tables.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender TEXT NOT NULL,
                sender_name TEXT NOT NULL DEFAULT '',
                recipient TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'Uncategorized',
                priority TEXT NOT NULL DEFAULT 'Medium',
                received_at TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                has_action_items INTEGER NOT NULL DEFAULT 0,
                action_items TEXT,
                sentiment TEXT
            );
            CREATE INDEX IF NOT EXISTS ix_emails_sender ON emails(sender);
            CREATE INDEX IF NOT EXISTS ix_emails_subject ON emails(subject);
            CREATE INDEX IF NOT EXISTS ix_emails_category ON emails(category);

            CREATE TABLE IF NOT EXISTS prompts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                prompt_type TEXT NOT NULL,
                content TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS ix_prompts_prompt_type ON prompts(prompt_type);

            CREATE TABLE IF NOT EXISTS drafts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email_id INTEGER NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                tone TEXT NOT NULL DEFAULT 'professional',
                created_at TEXT NOT NULL,
                is_sent INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS ix_drafts_email_id ON drafts(email_id);
        "#,
    },
    Migration {
        version: 2,
        name: "single_active_prompt_per_type",
        sql: r#"
            UPDATE prompts SET is_active = 0
             WHERE is_active = 1
               AND id NOT IN (
                   SELECT MIN(id) FROM prompts WHERE is_active = 1 GROUP BY prompt_type
               );
            CREATE UNIQUE INDEX IF NOT EXISTS ux_prompts_active_type
                ON prompts(prompt_type) WHERE is_active = 1;
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
/// Detects legacy databases (tables exist but no `_migrations` table) and
/// seeds V1 without re-running schema DDL.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let mut current_version = get_current_version(conn).await?;

    // Legacy DB: emails table exists but _migrations is empty
    if current_version == 0 && legacy_tables_exist(conn).await? {
        // The old service created drafts lazily; make sure it is there.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS drafts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email_id INTEGER NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                tone TEXT NOT NULL DEFAULT 'professional',
                created_at TEXT NOT NULL,
                is_sent INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS ix_drafts_email_id ON drafts(email_id);",
        )
        .await
        .map_err(|e| {
            DatabaseError::Migration(format!("Failed to create drafts table on legacy DB: {e}"))
        })?;

        seed_version(conn, 1, "initial_schema").await?;
        current_version = 1;
        tracing::info!("Legacy database detected, seeded migration V1");
    }

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    tracing::info!(
        "Database migrations complete (at V{})",
        get_current_version(conn).await?
    );

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Check if the legacy `emails` table already exists.
async fn legacy_tables_exist(conn: &Connection) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='emails'",
            (),
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to check legacy tables: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to read legacy check: {e}")))?;

    match row {
        Some(row) => {
            let count: i64 = row.get(0).unwrap_or(0);
            Ok(count > 0)
        }
        None => Ok(false),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    async fn count(conn: &Connection, sql: &str) -> i64 {
        let mut rows = conn.query(sql, ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        row.get(0).unwrap()
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in &["emails", "prompts", "drafts", "_migrations"] {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap().unwrap();
            let count: i64 = row.get(0).unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        let version = get_current_version(&conn).await.unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn legacy_db_detection() {
        let conn = test_conn().await;

        // Schema as the SQLAlchemy service left it: no drafts, two active
        // categorization prompts.
        conn.execute_batch(
            "CREATE TABLE emails (
                id INTEGER PRIMARY KEY,
                sender VARCHAR, sender_name VARCHAR, recipient VARCHAR,
                subject VARCHAR, body TEXT, category VARCHAR, priority VARCHAR,
                received_at DATETIME, is_read BOOLEAN, has_action_items BOOLEAN,
                action_items TEXT, sentiment VARCHAR
            );
            CREATE TABLE prompts (
                id INTEGER PRIMARY KEY,
                name VARCHAR UNIQUE, prompt_type VARCHAR, content TEXT,
                is_active BOOLEAN, created_at DATETIME, updated_at DATETIME
            );
            INSERT INTO prompts VALUES (1, 'a', 'categorization', 'x', 1, '2024-11-20 10:00:00', '2024-11-20 10:00:00');
            INSERT INTO prompts VALUES (2, 'b', 'categorization', 'y', 1, '2024-11-20 10:00:00', '2024-11-20 10:00:00');
            INSERT INTO prompts VALUES (3, 'c', 'auto_reply', 'z', 1, '2024-11-20 10:00:00', '2024-11-20 10:00:00');",
        )
        .await
        .unwrap();

        run_migrations(&conn).await.unwrap();

        assert_eq!(get_current_version(&conn).await.unwrap(), 2);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='drafts'").await,
            1
        );
        // Lowest id keeps its active flag; the duplicate is retired.
        assert_eq!(
            count(&conn, "SELECT id FROM prompts WHERE prompt_type='categorization' AND is_active=1").await,
            1
        );
        assert_eq!(count(&conn, "SELECT is_active FROM prompts WHERE id=2").await, 0);
        assert_eq!(count(&conn, "SELECT is_active FROM prompts WHERE id=3").await, 1);
    }

    #[tokio::test]
    async fn active_prompt_index_rejects_second_active() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        conn.execute(
            "INSERT INTO prompts (name, prompt_type, content, is_active, created_at, updated_at)
             VALUES ('one', 'auto_reply', 'x', 1, 'now', 'now')",
            (),
        )
        .await
        .unwrap();
        let second = conn
            .execute(
                "INSERT INTO prompts (name, prompt_type, content, is_active, created_at, updated_at)
                 VALUES ('two', 'auto_reply', 'y', 1, 'now', 'now')",
                (),
            )
            .await;
        assert!(second.is_err());

        // Inactive prompts of the same type are fine.
        conn.execute(
            "INSERT INTO prompts (name, prompt_type, content, is_active, created_at, updated_at)
             VALUES ('three', 'auto_reply', 'z', 0, 'now', 'now')",
            (),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn version_tracking() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT version, name FROM _migrations ORDER BY version", ())
            .await
            .unwrap();
        let row1 = rows.next().await.unwrap().unwrap();
        let v1: i64 = row1.get(0).unwrap();
        let n1: String = row1.get(1).unwrap();
        assert_eq!(v1, 1);
        assert_eq!(n1, "initial_schema");

        let row2 = rows.next().await.unwrap().unwrap();
        let v2: i64 = row2.get(0).unwrap();
        let n2: String = row2.get(1).unwrap();
        assert_eq!(v2, 2);
        assert_eq!(n2, "single_active_prompt_per_type");
    }
}
