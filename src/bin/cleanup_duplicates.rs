//! Remove duplicate emails (same subject, sender and body), keeping the
//! oldest row of each group.

use anyhow::Context;
use inbox_assist::config::db_path_from_env;
use inbox_assist::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let db_path = db_path_from_env();
    let db = LibSqlBackend::new_local(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let before = db.inbox_stats().await?.total_emails;
    let removed = db
        .delete_duplicate_emails()
        .await
        .context("Duplicate cleanup failed")?;

    eprintln!("Emails before cleanup: {before}");
    eprintln!("Removed {removed} duplicate emails");
    eprintln!("Emails after cleanup: {}", before - removed as i64);
    Ok(())
}
