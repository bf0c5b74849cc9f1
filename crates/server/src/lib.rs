pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod supervisor;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use state::AppState;

/// Bring up the host: background worker launches, then the HTTP surface.
/// Returns once `shutdown` resolves and the workers are torn down.
pub async fn run(
    config: ServerConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config);

    // Workers come up in the background; the HTTP surface is available
    // immediately and a request against a still-starting worker fails at
    // the worker call, not at admission.
    for spec in state.config.worker_specs() {
        let supervisor = Arc::clone(&state.supervisor);
        tokio::spawn(async move {
            supervisor.ensure_started(&spec).await;
        });
    }

    let supervisor = Arc::clone(&state.supervisor);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Shutting down");
    supervisor.shutdown_all().await;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/story", post(routes::create_story))
        .route("/workers", get(routes::list_workers))
        .route("/datasets", get(routes::list_datasets))
        .route("/adapters", get(routes::list_adapters))
        .route("/finetune", post(routes::start_finetune))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
