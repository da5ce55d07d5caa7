use std::sync::Arc;

use idsweep_client::{Classify, Fetch, RateGate, Scanner};

/// Fetcher behind a trait object so tests can swap the transport.
pub type DynFetch = Arc<dyn Fetch>;

#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<Scanner<DynFetch>>,
    pub gate: Arc<RateGate>,
    pub classifier: Arc<dyn Classify>,
    pub max_range_items: u64,
    pub concurrency: usize,
}
