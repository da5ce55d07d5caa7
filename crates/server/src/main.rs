//! idsweep server binary: loads configuration, restores persisted state,
//! wires the scanner, and serves the JSON API.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use idsweep_client::{
    Classify, Fetch, FetchConfig, HttpFetcher, MarkerClassifier, ProbePool, RateGate, ScanPolicy, Scanner,
};
use idsweep_core::{AppConfig, ScannerState};

mod error;
mod routes;
mod state;

use state::{AppState, DynFetch};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("idsweep=info")))
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load().context("failed to load configuration")?;

    // persisted interval/range win over configured defaults
    let scanner_state = ScannerState::load_or_default(&config)?;
    let gate = Arc::new(RateGate::new(scanner_state.min_interval()));

    let classifier: Arc<dyn Classify> = Arc::new(MarkerClassifier::new(&config.watchword));
    let fetcher: DynFetch = Arc::new(HttpFetcher::new(&FetchConfig {
        base_url: config.base_url.clone(),
        user_agent: config.user_agent.clone(),
        timeout: config.timeout(),
    })?) as Arc<dyn Fetch>;

    let pool = ProbePool::new(fetcher, gate.clone(), classifier.clone(), config.target_concurrency());

    let shared = scanner_state.into_shared();
    let scanner = Arc::new(Scanner::new(
        shared.clone(),
        pool,
        ScanPolicy {
            max_batch_ids: config.max_batch_ids,
            max_cache_batch_ids: config.cache_batch_limit(),
            stop_on_cached_error: config.stop_on_cached_error,
        },
    ));

    let app = routes::build_router(AppState {
        scanner,
        gate,
        classifier,
        max_range_items: config.max_range_items,
        concurrency: config.target_concurrency(),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, base_url = %config.base_url, "server starting");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    // flush anything the throttle was still holding back
    shared.lock().await.mark_dirty(true);
    tracing::info!("state flushed, exiting");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
