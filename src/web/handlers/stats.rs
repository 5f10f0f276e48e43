// GET /api/stats: running totals and percentages.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::db::Database;
use crate::web::{api_error, AppState};

pub async fn get_stats(State(state): State<AppState>) -> Response {
    match state.db.get_stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}")),
    }
}
