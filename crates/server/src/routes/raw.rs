use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use idsweep_core::ListingId;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RawQuery {
    pub id: String,
}

/// GET /raw?id: the cached raw body as text, if still resident. Never
/// refetches; an evicted or never-fetched body is a plain 404.
pub async fn raw_body(State(app): State<AppState>, Query(q): Query<RawQuery>) -> Response {
    let id = match ListingId::normalize(&q.id) {
        Ok(id) => id,
        Err(e) => return ApiError(e).into_response(),
    };

    let mut state = app.scanner.state().lock().await;
    match state.raw(&id) {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body.to_string(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, format!("raw body for {id} not available")).into_response(),
    }
}
