use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use idsweep_core::CheckedResult;

use super::{lenient_bool, truthy};
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub id: String,
    #[serde(default)]
    pub force: Option<String>,
}

/// GET /api/check?id=1-3000001&force=1
pub async fn check(State(app): State<AppState>, Query(q): Query<CheckQuery>) -> Result<Json<CheckedResult>> {
    let force = q.force.as_deref().is_some_and(truthy);
    let checked = app.scanner.check_one(&q.id, force).await?;
    Ok(Json(checked))
}

#[derive(Debug, Deserialize)]
pub struct CheckBatchBody {
    pub ids: Vec<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub force: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub stop_on_error: bool,
}

/// POST /api/check_batch
pub async fn check_batch(
    State(app): State<AppState>, Json(body): Json<CheckBatchBody>,
) -> Result<Json<serde_json::Value>> {
    let outcome = app.scanner.check_batch(&body.ids, body.force, body.stop_on_error).await?;
    Ok(Json(json!({
        "results": outcome.items,
        "stopped_early": outcome.stopped_early,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CacheBatchBody {
    pub ids: Vec<String>,
}

/// POST /api/cache_batch: cache hits only, no network, no mutation.
pub async fn cache_batch(
    State(app): State<AppState>, Json(body): Json<CacheBatchBody>,
) -> Result<Json<serde_json::Value>> {
    let results = app.scanner.cache_batch(&body.ids).await?;
    Ok(Json(json!({ "results": results })))
}
