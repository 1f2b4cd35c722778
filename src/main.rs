use std::sync::Arc;

use anyhow::Context;
use inbox_assist::api::{AppState, router};
use inbox_assist::config::AppConfig;
use inbox_assist::llm::create_provider;
use inbox_assist::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    eprintln!("📬 Inbox Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   LLM: {:?} ({})", config.llm.backend, config.llm.model);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   API: http://{}/api", config.bind_addr());

    let llm = create_provider(&config.llm).context("Failed to create LLM provider")?;

    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    let app = router(AppState::new(db, llm));

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    tracing::info!(addr = %config.bind_addr(), "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
