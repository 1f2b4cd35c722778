//! Populate the database with sample emails and the default prompts.

use anyhow::Context;
use inbox_assist::config::db_path_from_env;
use inbox_assist::inbox::seed::{seed_default_prompts, seed_sample_emails};
use inbox_assist::store::LibSqlBackend;

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

    let emails = seed_sample_emails(&db).await.context("Seeding emails failed")?;
    let prompts = seed_default_prompts(&db).await.context("Seeding prompts failed")?;

    eprintln!(
        "Seeded {} emails and {} prompts into {}",
        emails,
        prompts,
        db_path.display()
    );
    Ok(())
}
