use axum::routing::{delete, get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use repo_chat::api;
use repo_chat::config::Config;
use repo_chat::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "Chat model: {} via {} ({})",
        config.llm.chat_model,
        config.llm.provider,
        config.llm.base_url
    );
    tracing::info!("Embedding model: {}", config.embedding.model);

    let state = AppState::new(config.clone())?;
    let shutdown = state.shutdown.clone();

    let app = Router::new()
        .route("/api/repos", get(api::repos::list_repos))
        .route("/api/repos", post(api::repos::add_repo))
        .route("/api/repos/{id}", delete(api::repos::delete_repo))
        .route("/api/repos/{id}/reindex", post(api::repos::reindex_repo))
        .route("/api/chat", post(api::chat::chat))
        .route(
            "/api/issues/{owner}/{repo}/{number}",
            get(api::issues::analyze_issue),
        )
        .route("/api/issues/search", post(api::issues::search_issues))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down, cancelling running pipelines");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}
