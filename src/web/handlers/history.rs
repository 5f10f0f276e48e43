// GET /api/history?page=&per_page=: paginated analyses, newest first.
// Content is cut to a short preview; titles are returned in full.
//
// GET /api/analysis/{id}: one analysis with its full content.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::db::Database;
use crate::web::{api_error, AppState};

const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;

#[derive(Deserialize, Default)]
pub struct HistoryQuery {
    /// Page number (1-based)
    pub page: Option<u32>,
    /// Results per page (default 10, max 100)
    pub per_page: Option<u32>,
}

/// Number of pages needed for `total` rows; zero rows is zero pages.
pub fn page_count(total: i64, per_page: u32) -> u32 {
    if total <= 0 {
        return 0;
    }
    let per_page = i64::from(per_page.max(1));
    ((total + per_page - 1) / per_page) as u32
}

pub async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Response {
    let per_page = params
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let page = params.page.unwrap_or(1).max(1);
    let offset = (page - 1).saturating_mul(per_page);

    let (total, records) = match (
        state.db.count_analyses().await,
        state.db.recent_analyses(per_page, offset).await,
    ) {
        (Ok(total), Ok(records)) => (total, records),
        (Err(e), _) | (_, Err(e)) => {
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}"));
        }
    };

    let analyses: Vec<serde_json::Value> = records
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.id,
                "title": r.title,
                "content": r.content_preview(),
                "prediction": r.prediction,
                "confidence": r.confidence,
                "fake_probability": r.fake_probability,
                "real_probability": r.real_probability,
                "suspicion_score": r.suspicion_score,
                "pipeline_score": r.pipeline_score,
                "token_diversity": r.token_diversity,
                "text_length": r.text_length,
                "method": r.method,
                "source": r.source,
                "created_at": r.created_at,
            })
        })
        .collect();

    Json(serde_json::json!({
        "analyses": analyses,
        "total": total,
        "pages": page_count(total, per_page),
        "current_page": page,
    }))
    .into_response()
}

pub async fn get_analysis(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.db.get_analysis(id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Analysis not found"),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
    }
}
