use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use idsweep_core::IdRange;
use idsweep_core::ident::parse_range_value;

use crate::error::Result;
use crate::state::AppState;

/// GET /api/range
pub async fn get_range(State(app): State<AppState>) -> Json<serde_json::Value> {
    let state = app.scanner.state().lock().await;
    Json(range_body(state.range()))
}

#[derive(Debug, Deserialize)]
pub struct RangeBody {
    pub start: serde_json::Value,
    pub end: serde_json::Value,
    #[serde(default)]
    pub step: Option<u64>,
}

/// POST /api/range: bounds as raw numbers or id-shaped strings, step 2 only.
/// The normalized range is force-persisted.
pub async fn set_range(State(app): State<AppState>, Json(body): Json<RangeBody>) -> Result<Json<serde_json::Value>> {
    let start = parse_range_value(&body.start)?;
    let end = parse_range_value(&body.end)?;
    let range = IdRange::normalized(start, end, body.step.unwrap_or(2), app.max_range_items)?;

    let mut state = app.scanner.state().lock().await;
    state.set_range(range);
    state.mark_dirty(true);

    tracing::info!(start = range.start, end = range.end, count = range.count(), "scan range updated");
    Ok(Json(range_body(range)))
}

fn range_body(range: IdRange) -> serde_json::Value {
    json!({
        "start": range.start,
        "end": range.end,
        "step": range.step,
        "count": range.count(),
    })
}
