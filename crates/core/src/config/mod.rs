//! Application configuration with layered loading.
//!
//! Loading precedence (highest wins):
//! 1. Environment variables (IDSWEEP_*)
//! 2. TOML config file (if IDSWEEP_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! These are the process-level knobs. The runtime-mutable scan settings
//! (minimum interval, range) start from these values and are thereafter
//! owned by the scanner state and the persisted envelope.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Intervals (seconds) the configuration endpoint accepts.
pub const ALLOWED_INTERVALS: [f64; 7] = [0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0];

/// Jitter as a fraction of the minimum interval (lower, upper).
pub const JITTER_FRAC: (f64, f64) = (0.02, 0.15);

/// Absolute jitter ceiling in seconds (lower, upper).
pub const JITTER_CAP_SECONDS: (f64, f64) = (0.02, 0.15);

/// Hard ceiling on in-flight requests to the target, regardless of config.
pub const MAX_TARGET_CONCURRENCY: usize = 10;

/// Tolerant float membership check against [`ALLOWED_INTERVALS`].
pub fn is_allowed_interval(x: f64) -> bool {
    ALLOWED_INTERVALS.iter().any(|r| (x - r).abs() < 1e-9)
}

/// Snap to the nearest allowed interval (safer for float inputs).
pub fn snap_interval(x: f64) -> f64 {
    let mut best = ALLOWED_INTERVALS[0];
    for &r in &ALLOWED_INTERVALS[1..] {
        if (x - r).abs() < (x - best).abs() {
            best = r;
        }
    }
    best
}

/// Jitter bounds for a given minimum interval: proportional to the interval
/// with an absolute cap, so jitter neither vanishes nor dominates at the
/// extremes of the allowed set.
pub fn jitter_bounds(min_interval: f64) -> (f64, f64) {
    let mi = min_interval.max(0.0);
    let lo = JITTER_CAP_SECONDS.0.min(mi * JITTER_FRAC.0).max(0.0);
    let mut hi = JITTER_CAP_SECONDS.1.min(mi * JITTER_FRAC.1);
    if hi < lo {
        hi = lo;
    }
    (lo, hi)
}

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path of the persisted state envelope.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Base URL of the target site; identifiers are appended as path segments.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User-Agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Requested in-flight limit to the target (clamped to the safety ceiling).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Initial minimum inter-request interval in seconds.
    #[serde(default = "default_min_interval")]
    pub min_interval: f64,

    /// Default range start (listing number).
    #[serde(default = "default_range_start")]
    pub range_start: u64,

    /// Default range end (listing number).
    #[serde(default = "default_range_end")]
    pub range_end: u64,

    /// Maximum member count a configured range may have.
    #[serde(default = "default_max_range_items")]
    pub max_range_items: u64,

    /// Maximum ids per check_batch call.
    #[serde(default = "default_max_batch_ids")]
    pub max_batch_ids: usize,

    /// Maximum ids per cache_batch call (at least `max_batch_ids`).
    #[serde(default = "default_max_cache_batch_ids")]
    pub max_cache_batch_ids: usize,

    /// Raw response cache item cap; 0 disables the cache.
    #[serde(default = "default_raw_cache_max_items")]
    pub raw_cache_max_items: usize,

    /// Byte cap applied to each raw body at insertion.
    #[serde(default = "default_raw_cache_max_bytes")]
    pub raw_cache_max_bytes: usize,

    /// Persist after this many cache mutations.
    #[serde(default = "default_save_every_n")]
    pub save_every_n: u32,

    /// ...or after this many seconds since the last save, whichever first.
    #[serde(default = "default_save_min_interval_secs")]
    pub save_min_interval_secs: f64,

    /// Text token surfaced as a hit wherever it appears in a response body.
    #[serde(default = "default_watchword")]
    pub watchword: String,

    /// Whether a cache-hit ERROR entry triggers a batch's stop_on_error
    /// short-circuit. Off by default: only fresh fetch failures stop a batch.
    #[serde(default)]
    pub stop_on_cached_error: bool,

    /// Listen address of the JSON API.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./idsweep-state.json")
}

fn default_base_url() -> String {
    "https://www.aruodas.lt".into()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36"
        .into()
}

fn default_timeout_ms() -> u64 {
    25_000
}

fn default_concurrency() -> usize {
    3
}

fn default_min_interval() -> f64 {
    2.0
}

fn default_range_start() -> u64 {
    3_000_001
}

fn default_range_end() -> u64 {
    3_000_033
}

fn default_max_range_items() -> u64 {
    120_000
}

fn default_max_batch_ids() -> usize {
    1000
}

fn default_max_cache_batch_ids() -> usize {
    2000
}

fn default_raw_cache_max_items() -> usize {
    200
}

fn default_raw_cache_max_bytes() -> usize {
    500_000
}

fn default_save_every_n() -> u32 {
    50
}

fn default_save_min_interval_secs() -> f64 {
    5.0
}

fn default_watchword() -> String {
    "sugiharos".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:5000".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            concurrency: default_concurrency(),
            min_interval: default_min_interval(),
            range_start: default_range_start(),
            range_end: default_range_end(),
            max_range_items: default_max_range_items(),
            max_batch_ids: default_max_batch_ids(),
            max_cache_batch_ids: default_max_cache_batch_ids(),
            raw_cache_max_items: default_raw_cache_max_items(),
            raw_cache_max_bytes: default_raw_cache_max_bytes(),
            save_every_n: default_save_every_n(),
            save_min_interval_secs: default_save_min_interval_secs(),
            watchword: default_watchword(),
            stop_on_cached_error: false,
            listen_addr: default_listen_addr(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Requested concurrency clamped to the safety ceiling.
    pub fn target_concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_TARGET_CONCURRENCY)
    }

    /// Effective cache_batch cap; never smaller than the check_batch cap.
    pub fn cache_batch_limit(&self) -> usize {
        self.max_cache_batch_ids.max(self.max_batch_ids)
    }

    pub fn save_min_interval(&self) -> Duration {
        Duration::from_secs_f64(self.save_min_interval_secs.max(0.0))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or parsed, or if
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("IDSWEEP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("IDSWEEP_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
