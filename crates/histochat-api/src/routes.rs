//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, body limits
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use histochat_core::config::HistochatConfig;
use histochat_core::error::HistochatError;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Body limit for JSON routes.
const JSON_BODY_LIMIT: usize = 64 * 1024;

/// Browser origins allowed to call the API: the server's own address on
/// localhost and loopback, plus the configured host.
fn allowed_origins(config: &HistochatConfig) -> Vec<HeaderValue> {
    let port = config.server.port;
    let mut hosts = vec!["127.0.0.1", "localhost"];
    if !hosts.contains(&config.server.host.as_str()) && config.server.host != "0.0.0.0" {
        hosts.push(config.server.host.as_str());
    }
    hosts
        .into_iter()
        .filter_map(|h| HeaderValue::from_str(&format!("http://{}:{}", h, port)).ok())
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&state.config)))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Raw audio uploads get their own, larger limit.
    let voice_limit = state.config.voice.max_audio_bytes;

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/theme", get(handlers::theme))
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/sessions/{id}", axum::routing::delete(handlers::end_session))
        .route("/sessions/{id}/views/{view}", get(handlers::select_view))
        .route("/sessions/{id}/history", get(handlers::history))
        .route("/sessions/{id}/messages", post(handlers::ask))
        .route("/audio/{id}", get(handlers::audio))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT));

    let voice_routes = Router::new().route(
        "/sessions/{id}/voice",
        post(handlers::voice).layer(DefaultBodyLimit::max(voice_limit)),
    );

    api_routes.merge(voice_routes).with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(CompressionLayer::new()),
    )
}

/// Start the HTTP server on the configured address and serve until Ctrl-C.
pub async fn start_server(state: AppState) -> Result<(), HistochatError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HistochatError::Api(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("Starting API server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| HistochatError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
