//! HTTP surface: the client page, job ingress, the WebSocket push channel and a health check.

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::hub::BroadcastHub;
use crate::pipeline::JobPipeline;
use crate::TranslatorError;

pub mod handlers;

/// Shared handles every request handler sees
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<JobPipeline>,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(pipeline: Arc<JobPipeline>) -> Self {
        let hub = Arc::clone(pipeline.hub());
        Self { pipeline, hub }
    }
}

pub fn create_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let mut router = Router::new()
        .route("/", get(handlers::index_handler))
        .route("/translate", post(handlers::translate_handler))
        .route("/ws", get(handlers::ws_handler))
        .route("/health", get(handlers::health_handler));

    if let Some(dir) = static_dir.filter(|dir| dir.is_dir()) {
        tracing::debug!(dir = %dir.display(), "Serving static assets");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(trace_layer).layer(cors).with_state(state)
}

/// Bind `host:port` and serve until ctrl-c. Shutting down stops the hub so WebSocket tasks end.
pub async fn serve(state: AppState, host: &str, port: u16, static_dir: Option<PathBuf>) -> crate::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| TranslatorError::ServerError(format!("failed to bind {}: {}", addr, e)))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening");

    let hub = Arc::clone(&state.hub);
    let router = create_router(state, static_dir);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
            hub.stop();
        })
        .await
        .map_err(|e| TranslatorError::ServerError(e.to_string()))?;

    Ok(())
}
