//! Fetching, classification, and batch orchestration for idsweep.
//!
//! This crate provides:
//! - The global rate gate with jittered pacing
//! - The HTTP fetcher and the bounded probe pool
//! - Marker-based response classification
//! - The batch scanner with order-preserving sliding-window submission

pub mod classify;
pub mod fetch;
pub mod gate;
pub mod scan;

pub use classify::{Classification, Classify, MarkerClassifier};
pub use fetch::{Fetch, FetchConfig, Fetched, HttpFetcher, ProbePool};
pub use gate::RateGate;
pub use scan::{BatchOutcome, ScanPolicy, Scanner};
