// POST /analyze: validate, predict, record.
//
// Body: {"title": "...", "content": "..."}
// 200 → {"success": true, "result": <Verdict>, "analysis_id": <id>}
// 400 → malformed body or validation failure, 500 → Error verdict or store failure.
// Failure bodies carry "success": false alongside "error".

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{error, warn};

use crate::db::models::NewAnalysis;
use crate::db::Database;
use crate::detector::Verdict;
use crate::input::AnalysisInput;
use crate::web::{AppState, ClientAddr};

pub const WEB_SOURCE: &str = "web";

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

pub async fn analyze(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return failure(
                StatusCode::BAD_REQUEST,
                &format!("Invalid request body: {}", rejection.body_text()),
            )
        }
    };

    let input = match AnalysisInput::new(&body.title, &body.content, &state.limits) {
        Ok(input) => input,
        Err(e) => return failure(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let detector = state.detector.clone();
    let job = input.clone();
    let verdict = tokio::task::spawn_blocking(move || detector.predict(&job.title, &job.content))
        .await
        .unwrap_or_else(|e| Verdict::error(format!("prediction task failed: {e}")));

    if verdict.is_error() {
        let message = verdict.error.as_deref().unwrap_or("Unknown error");
        warn!(error = message, "Prediction failed");
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Analysis error: {message}"),
        );
    }

    let recorded = match NewAnalysis::from_verdict(&input, &verdict, WEB_SOURCE) {
        Ok(row) => {
            let row = row.with_ip_address(client.as_deref());
            state.db.record_analysis(&row).await
        }
        Err(e) => Err(e),
    };
    match recorded {
        Ok(id) => Json(serde_json::json!({
            "success": true,
            "result": verdict,
            "analysis_id": id,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to record analysis");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record analysis")
        }
    }
}

fn failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({ "success": false, "error": message })),
    )
        .into_response()
}
