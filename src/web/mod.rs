// Web server: Axum JSON API over the detector and the analysis store.
//
// The detector is acquired once before the server starts and shared
// read-only by every handler. Predictions are CPU-bound and run on the
// blocking pool.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::Database;
use crate::detector::Detector;
use crate::input::InputLimits;

pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<Detector>,
    pub db: Arc<dyn Database>,
    pub limits: InputLimits,
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(state: AppState, port: u16, bind: &str) -> Result<()> {
    let backend = state.detector.backend().describe();
    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!(%backend, "Skeptic API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(handlers::analyze::analyze))
        .route("/api/history", get(handlers::history::list_history))
        .route("/api/analysis/{id}", get(handlers::history::get_analysis))
        .route("/api/stats", get(handlers::stats::get_stats))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Peer IP of the caller. `None` when the router runs without connect info.
pub struct ClientAddr(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(ip))
    }
}

/// Health check: 200 when the store answers, 500 otherwise.
async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> Response {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match state.db.table_count().await {
        Ok(_) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({
                "status": "healthy",
                "timestamp": timestamp,
                "database": "connected",
                "backend": state.detector.backend().describe(),
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(serde_json::json!({
                "status": "unhealthy",
                "timestamp": timestamp,
                "error": format!("{e:#}"),
            })),
        )
            .into_response(),
    }
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}
