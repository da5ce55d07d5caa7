use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use idsweep_core::Error;
use idsweep_core::config::{ALLOWED_INTERVALS, is_allowed_interval};

use crate::error::Result;
use crate::state::AppState;

/// GET /api/config
pub async fn get_config(State(app): State<AppState>) -> Json<serde_json::Value> {
    let state = app.scanner.state().lock().await;
    Json(config_body(state.min_interval(), state.jitter()))
}

#[derive(Debug, Deserialize)]
pub struct ConfigBody {
    pub min_interval: f64,
}

/// POST /api/config: min_interval from the allowed set only. The update is
/// force-persisted and pushed to the rate gate after the state lock drops.
pub async fn set_config(
    State(app): State<AppState>, Json(body): Json<ConfigBody>,
) -> Result<Json<serde_json::Value>> {
    if !is_allowed_interval(body.min_interval) {
        return Err(Error::InvalidInterval(body.min_interval).into());
    }

    let (effective, jitter) = {
        let mut state = app.scanner.state().lock().await;
        state.set_min_interval(body.min_interval);
        state.mark_dirty(true);
        (state.min_interval(), state.jitter())
    };
    app.gate.set_interval(effective).await;

    tracing::info!(min_interval = effective, "rate configuration updated");
    Ok(Json(config_body(effective, jitter)))
}

fn config_body(min_interval: f64, jitter: (f64, f64)) -> serde_json::Value {
    json!({
        "min_interval": min_interval,
        "jitter": jitter,
        "allowed_rates": ALLOWED_INTERVALS,
    })
}
