use std::sync::Arc;

use delivery_rewards::api;
use delivery_rewards::config::Config;
use delivery_rewards::error::AppError;
use delivery_rewards::observability::logging;
use delivery_rewards::state::AppState;
use delivery_rewards::store::memory::InMemoryStore;
use delivery_rewards::store::seed::load_seed_file;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    logging::init(&config.log_level, config.log_format);

    let store = InMemoryStore::new();
    if let Some(path) = &config.seed_file {
        load_seed_file(&store, path).await?;
    }

    let state = Arc::new(AppState::new(
        Arc::new(store),
        config.retry_policy(),
        config.event_buffer_size,
    ));
    let app = api::rest::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
