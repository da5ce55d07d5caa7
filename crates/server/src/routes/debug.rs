use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use idsweep_client::Classification;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ParseBody {
    pub html: String,
    #[serde(default)]
    pub final_url: Option<String>,
}

/// POST /api/debug/parse: run the classifier over a supplied body. No cache,
/// no network; supports offline testing of the classification rules.
pub async fn parse(State(app): State<AppState>, Json(body): Json<ParseBody>) -> Json<Classification> {
    Json(app.classifier.classify(&body.html, body.final_url.as_deref(), None))
}
