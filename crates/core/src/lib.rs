//! Core types and shared functionality for idsweep.
//!
//! This crate provides:
//! - Listing identifiers and range utilities
//! - The result data model and persisted state envelope
//! - Layered configuration
//! - Scanner state (result cache + raw cache) with throttled persistence
//! - Unified error types

pub mod config;
pub mod error;
pub mod ident;
pub mod model;
pub mod persist;
pub mod state;

pub use config::AppConfig;
pub use error::Error;
pub use ident::{IdRange, ListingId};
pub use model::{CheckedResult, ListMode, RangeStats, ScanResult, ScanStatus};
pub use state::{ScannerState, SharedState};
