use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use idsweep_core::ListMode;
use idsweep_core::config::ALLOWED_INTERVALS;

use super::truthy;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    #[serde(default)]
    pub items: Option<String>,
    #[serde(default)]
    pub include_ids: Option<String>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/state: configuration, range, stats, and a mode-filtered listing
/// of cached results with optional offset/limit slicing.
pub async fn snapshot(State(app): State<AppState>, Query(q): Query<SnapshotQuery>) -> Json<serde_json::Value> {
    let mode = ListMode::parse(q.items.as_deref().unwrap_or("all"));
    // on unless explicitly switched off; consumers rely on the id set
    let include_ids = q.include_ids.as_deref().is_none_or(truthy);

    let state = app.scanner.state().lock().await;
    let range = state.range();

    let items = state.results_in_range(mode);
    let total_items = items.len();
    let offset = q.offset.unwrap_or(0);
    let items: Vec<_> = match q.limit {
        // limit=0 means unlimited
        Some(limit) if limit > 0 => items.into_iter().skip(offset).take(limit).collect(),
        _ => items.into_iter().skip(offset).collect(),
    };

    let mut body = json!({
        "config": {
            "min_interval": state.min_interval(),
            "jitter": state.jitter(),
            "allowed_rates": ALLOWED_INTERVALS,
            "concurrency": app.concurrency,
        },
        "range": {
            "start": range.start,
            "end": range.end,
            "step": range.step,
            "count": range.count(),
        },
        "stats": state.stats(),
        "items": items,
        "total_items": total_items,
    });
    if include_ids {
        body["checked_ids"] = json!(state.cached_ids());
    }
    Json(body)
}
