//! JSON API routing.

use axum::Router;
use axum::routing::{get, post};
use serde::{Deserialize, Deserializer};

use crate::state::AppState;

mod check;
mod config;
mod debug;
mod range;
mod raw;
mod snapshot;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/check", get(check::check))
        .route("/api/check_batch", post(check::check_batch))
        .route("/api/cache_batch", post(check::cache_batch))
        .route("/api/state", get(snapshot::snapshot))
        .route("/api/config", get(config::get_config).post(config::set_config))
        .route("/api/range", get(range::get_range).post(range::set_range))
        .route("/api/debug/parse", post(debug::parse))
        .route("/raw", get(raw::raw_body))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Truthiness for query-string flags.
fn truthy(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
}

/// Lenient boolean for JSON bodies: accepts a real bool, a truthy string,
/// or a number (non-zero is true). Dashboard clients are sloppy here.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => truthy(&s),
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::state::{AppState, DynFetch};
    use idsweep_client::{
        Classify, Fetch, Fetched, MarkerClassifier, ProbePool, RateGate, ScanPolicy, Scanner,
    };
    use idsweep_core::{AppConfig, Error, ListingId, ScannerState};

    struct StubFetcher;

    #[async_trait]
    impl Fetch for StubFetcher {
        async fn fetch(&self, id: &ListingId) -> Result<Fetched, Error> {
            Ok(Fetched {
                http_status: 200,
                final_url: format!("https://www.example.test/{id}/"),
                body: "<html><h1>Vilnius, Senamiestis</h1><p>Įdėtas 2024-03-01</p></html>".to_string(),
                fetch_ms: 1,
            })
        }
    }

    fn app(name: &str) -> Router {
        let config = AppConfig {
            state_path: std::env::temp_dir().join(format!("idsweep-api-{}-{}", std::process::id(), name)),
            range_start: 3_000_001,
            range_end: 3_000_099,
            ..Default::default()
        };
        let state = ScannerState::new(&config).unwrap().into_shared();
        let gate = Arc::new(RateGate::new(0.0));
        let classifier: Arc<dyn Classify> = Arc::new(MarkerClassifier::new("sugiharos"));
        let fetcher: DynFetch = Arc::new(StubFetcher);
        let pool = ProbePool::new(fetcher, gate.clone(), classifier.clone(), 3);
        let scanner = Arc::new(Scanner::new(state, pool, ScanPolicy::default()));
        build_router(AppState { scanner, gate, classifier, max_range_items: 120_000, concurrency: 3 })
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app("health");
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_check_then_cache_hit() {
        let app = app("check");

        let (status, body) = get_json(&app, "/api/check?id=1-3000001").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["from_cache"], serde_json::json!(false));
        assert_eq!(body["status"], serde_json::json!("FOUND"));
        assert_eq!(body["city"], serde_json::json!("Vilnius"));

        let (status, body) = get_json(&app, "/api/check?id=1-3000001").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["from_cache"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_check_rejects_bad_ids() {
        let app = app("check-bad");

        let (status, body) = get_json(&app, "/api/check?id=garbage").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("INVALID_ID"));

        // outside the configured range
        let (status, _) = get_json(&app, "/api/check?id=1-9000001").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_check_batch_accepts_lenient_booleans() {
        let app = app("batch");

        let body = serde_json::json!({
            "ids": ["1-3000001", "1-3000003"],
            "force": "yes",
            "stop_on_error": 0,
        });
        let (status, body) = post_json(&app, "/api/check_batch", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stopped_early"], serde_json::json!(false));
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_check_batch_rejects_empty_list() {
        let app = app("batch-empty");
        let (status, body) = post_json(&app, "/api/check_batch", serde_json::json!({ "ids": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("INVALID_INPUT"));
    }

    #[tokio::test]
    async fn test_cache_batch_returns_hits_only() {
        let app = app("cache-batch");
        get_json(&app, "/api/check?id=1-3000001").await;

        let body = serde_json::json!({ "ids": ["1-3000001", "1-3000003"] });
        let (status, body) = post_json(&app, "/api/cache_batch", body).await;
        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["from_cache"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_config_update_enforces_allowed_set() {
        let app = app("config");

        let (status, body) = post_json(&app, "/api/config", serde_json::json!({ "min_interval": 0.1 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["min_interval"], serde_json::json!(0.1));

        let (status, body) = post_json(&app, "/api/config", serde_json::json!({ "min_interval": 0.3 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("INVALID_INTERVAL"));

        let (_, body) = get_json(&app, "/api/config").await;
        assert_eq!(body["min_interval"], serde_json::json!(0.1));
    }

    #[tokio::test]
    async fn test_range_update_normalizes_bounds() {
        let app = app("range");

        // id-shaped start, numeric end, even bounds corrected inward
        let body = serde_json::json!({ "start": "1-3000000", "end": 3_000_008 });
        let (status, body) = post_json(&app, "/api/range", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start"], serde_json::json!(3_000_001));
        assert_eq!(body["end"], serde_json::json!(3_000_007));
        assert_eq!(body["count"], serde_json::json!(4));

        let (status, _) = post_json(&app, "/api/range", serde_json::json!({ "start": 9, "end": 1 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // zero bounds are a clean 400, not a panic
        let (status, body) = post_json(&app, "/api/range", serde_json::json!({ "start": 0, "end": 0 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("INVALID_RANGE"));

        let (status, _) =
            post_json(&app, "/api/range", serde_json::json!({ "start": 1, "end": 9, "step": 1 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_raw_body_retrieval() {
        let app = app("raw");

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/raw?id=1-3000001").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        get_json(&app, "/api/check?id=1-3000001").await;

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/raw?id=1-3000001").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("<h1>"));
    }

    #[tokio::test]
    async fn test_debug_parse_does_not_touch_the_cache() {
        let app = app("debug");

        let body = serde_json::json!({
            "html": "<html>Šiame puslapyje nėra informacijos, kurios jūs ieškote</html>",
        });
        let (status, body) = post_json(&app, "/api/debug/parse", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], serde_json::json!("NOT_FOUND"));

        let (_, snapshot) = get_json(&app, "/api/state").await;
        assert_eq!(snapshot["stats"]["checked"], serde_json::json!(0));
    }

    #[tokio::test]
    async fn test_state_snapshot_slicing_and_ids() {
        let app = app("snapshot");
        for id in ["1-3000001", "1-3000003", "1-3000005"] {
            get_json(&app, &format!("/api/check?id={id}")).await;
        }

        let (status, body) = get_json(&app, "/api/state?items=all&offset=1&limit=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["checked"], serde_json::json!(3));
        assert_eq!(body["total_items"], serde_json::json!(3));
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], serde_json::json!("1-3000003"));
        // ids are included unless switched off
        assert_eq!(body["checked_ids"].as_array().unwrap().len(), 3);
        assert_eq!(body["range"]["count"], serde_json::json!(50));

        let (_, body) = get_json(&app, "/api/state?include_ids=0").await;
        assert!(body.get("checked_ids").is_none());

        // limit=0 means unlimited, not an empty page
        let (_, body) = get_json(&app, "/api/state?limit=0").await;
        assert_eq!(body["items"].as_array().unwrap().len(), 3);

        // mode=none keeps the listing empty but the stats intact
        let (_, body) = get_json(&app, "/api/state?items=none").await;
        assert!(body["items"].as_array().unwrap().is_empty());
        assert_eq!(body["stats"]["checked"], serde_json::json!(3));
    }
}
