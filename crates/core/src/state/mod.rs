//! Mutable scanner state: the parsed-result cache, the raw-body cache, and
//! the runtime-mutable configuration (range, minimum interval).
//!
//! The whole struct lives behind one `tokio::sync::Mutex` ([`SharedState`]);
//! persistence is driven while that lock is held, since the envelope
//! snapshots the result cache. The rate gate keeps its own independent lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::{AppConfig, is_allowed_interval, jitter_bounds, snap_interval};
use crate::error::Error;
use crate::ident::{IdRange, ListingId};
use crate::model::{ListMode, PersistedConfig, RangeStats, STATE_VERSION, ScanResult, ScanStatus, StateEnvelope};
use crate::persist::{PersistThrottle, load_envelope};

mod raw;

pub use raw::RawCache;

/// Handle shared by the orchestrator and every API handler.
pub type SharedState = Arc<Mutex<ScannerState>>;

pub struct ScannerState {
    results: HashMap<ListingId, ScanResult>,
    raw: RawCache,
    range: IdRange,
    min_interval: f64,
    jitter: (f64, f64),
    persist: PersistThrottle,
}

impl ScannerState {
    /// Fresh state from configured defaults; no disk access.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        let range = IdRange::normalized(config.range_start, config.range_end, 2, config.max_range_items)?;
        Ok(Self {
            results: HashMap::new(),
            raw: RawCache::new(config.raw_cache_max_items, config.raw_cache_max_bytes),
            range,
            min_interval: config.min_interval,
            jitter: jitter_bounds(config.min_interval),
            persist: PersistThrottle::new(config.state_path.clone(), config.save_every_n, config.save_min_interval()),
        })
    }

    /// Build state, overlaying the persisted envelope when one loads.
    /// A missing or corrupt file means defaults; startup never fails on it.
    /// The raw cache always starts empty.
    pub fn load_or_default(config: &AppConfig) -> Result<Self, Error> {
        let mut state = Self::new(config)?;
        if let Some(envelope) = load_envelope(&config.state_path) {
            state.apply_envelope(envelope, config.max_range_items);
            tracing::info!(
                path = %config.state_path.display(),
                entries = state.results.len(),
                "restored persisted state"
            );
        }
        Ok(state)
    }

    fn apply_envelope(&mut self, envelope: StateEnvelope, max_range_items: u64) {
        if let Some(min_interval) = envelope.config.min_interval
            && is_allowed_interval(min_interval)
        {
            self.set_min_interval(min_interval);
        }

        if let Some(range) = envelope.range {
            match IdRange::normalized(range.start, range.end, range.step, max_range_items) {
                Ok(range) => self.range = range,
                Err(e) => tracing::warn!(error = %e, "ignoring persisted range"),
            }
        }

        for (key, result) in envelope.cache {
            match ListingId::normalize(&key) {
                Ok(_) => {
                    self.results.insert(result.id.clone(), result);
                }
                Err(_) => tracing::debug!(key, "dropping cache entry with malformed key"),
            }
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn range(&self) -> IdRange {
        self.range
    }

    pub fn min_interval(&self) -> f64 {
        self.min_interval
    }

    pub fn jitter(&self) -> (f64, f64) {
        self.jitter
    }

    pub fn set_range(&mut self, range: IdRange) {
        self.range = range;
    }

    /// Snap to the nearest allowed interval and recompute jitter bounds.
    pub fn set_min_interval(&mut self, interval: f64) {
        self.min_interval = snap_interval(interval);
        self.jitter = jitter_bounds(self.min_interval);
    }

    pub fn result(&self, id: &ListingId) -> Option<&ScanResult> {
        self.results.get(id)
    }

    /// Overwrite semantics: a re-check fully replaces the previous entry.
    pub fn insert_result(&mut self, result: ScanResult) {
        self.results.insert(result.id.clone(), result);
    }

    pub fn insert_raw(&mut self, id: ListingId, body: &str) {
        self.raw.put(id, body);
    }

    pub fn raw(&mut self, id: &ListingId) -> Option<&str> {
        self.raw.get(id)
    }

    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    fn in_range(&self, result: &ScanResult) -> bool {
        self.range.contains(result.id.number())
    }

    /// Mode-filtered listing of cached results inside the current range,
    /// sorted by identifier.
    pub fn results_in_range(&self, mode: ListMode) -> Vec<ScanResult> {
        if mode == ListMode::None {
            return Vec::new();
        }
        let mut items: Vec<ScanResult> = self
            .results
            .values()
            .filter(|r| self.in_range(r) && mode.matches(r))
            .cloned()
            .collect();
        items.sort_by_key(|r| r.id.number());
        items
    }

    /// One-pass category counts over the current range.
    pub fn stats(&self) -> RangeStats {
        let mut stats = RangeStats::default();
        for result in self.results.values().filter(|r| self.in_range(r)) {
            stats.checked += 1;
            if result.is_hit() {
                stats.found += 1;
            }
            match result.status {
                ScanStatus::NotFound => stats.not_found += 1,
                ScanStatus::Challenge => stats.challenge += 1,
                ScanStatus::Error => stats.error += 1,
                ScanStatus::Found => {}
            }
        }
        stats.bad_total = stats.not_found + stats.challenge + stats.error;
        stats
    }

    /// All resolved identifiers inside the current range, sorted.
    pub fn cached_ids(&self) -> Vec<String> {
        let mut ids: Vec<&ListingId> = self.results.keys().filter(|id| self.range.contains(id.number())).collect();
        ids.sort();
        ids.into_iter().map(ToString::to_string).collect()
    }

    fn envelope(&self) -> StateEnvelope {
        let mut envelope = StateEnvelope {
            version: STATE_VERSION,
            saved_at: Some(Utc::now()),
            config: PersistedConfig {
                min_interval: Some(self.min_interval),
                jitter: Some(self.jitter),
                allowed_rates: Some(crate::config::ALLOWED_INTERVALS.to_vec()),
            },
            range: Some(self.range),
            cache: Default::default(),
        };
        for (id, result) in &self.results {
            envelope.cache.insert(id.to_string(), result.clone());
        }
        envelope
    }

    /// Record a mutation; saves when the throttle says so, immediately when
    /// forced. Never fails: persistence is best-effort durability.
    pub fn mark_dirty(&mut self, force: bool) {
        if self.persist.mark_dirty(force) {
            let envelope = self.envelope();
            self.persist.save(&envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("idsweep-state-{}-{}", std::process::id(), name))
    }

    fn test_config(name: &str) -> AppConfig {
        AppConfig {
            state_path: scratch_path(name),
            range_start: 3_000_001,
            range_end: 3_000_033,
            ..Default::default()
        }
    }

    fn result(n: u64, status: ScanStatus) -> ScanResult {
        ScanResult {
            id: ListingId::from_number(n),
            checked_at: Utc::now(),
            http_status: Some(200),
            status,
            error: None,
            final_url: None,
            city: None,
            district: None,
            inserted_date: None,
            watchword_found: false,
            watchword_snippet_html: None,
        }
    }

    #[test]
    fn test_stats_single_pass_counts() {
        let mut state = ScannerState::new(&test_config("stats.json")).unwrap();
        state.insert_result(result(3_000_001, ScanStatus::Found));
        state.insert_result(result(3_000_003, ScanStatus::NotFound));
        state.insert_result(result(3_000_005, ScanStatus::Challenge));
        state.insert_result(result(3_000_007, ScanStatus::Error));
        // outside the range: not counted
        state.insert_result(result(3_100_001, ScanStatus::Found));

        let stats = state.stats();
        assert_eq!(stats.checked, 4);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.challenge, 1);
        assert_eq!(stats.error, 1);
        assert_eq!(stats.bad_total, 3);
    }

    #[test]
    fn test_listing_filters_and_sorts() {
        let mut state = ScannerState::new(&test_config("list.json")).unwrap();
        state.insert_result(result(3_000_005, ScanStatus::NotFound));
        state.insert_result(result(3_000_001, ScanStatus::Found));
        state.insert_result(result(3_000_003, ScanStatus::Error));

        let all = state.results_in_range(ListMode::All);
        let numbers: Vec<u64> = all.iter().map(|r| r.id.number()).collect();
        assert_eq!(numbers, vec![3_000_001, 3_000_003, 3_000_005]);

        assert_eq!(state.results_in_range(ListMode::Found).len(), 1);
        assert_eq!(state.results_in_range(ListMode::Bad).len(), 2);
        assert!(state.results_in_range(ListMode::None).is_empty());
    }

    #[test]
    fn test_cached_ids_scoped_to_range() {
        let mut state = ScannerState::new(&test_config("ids.json")).unwrap();
        state.insert_result(result(3_000_003, ScanStatus::Found));
        state.insert_result(result(3_000_001, ScanStatus::Found));
        state.insert_result(result(4_000_001, ScanStatus::Found));

        assert_eq!(state.cached_ids(), vec!["1-3000001".to_string(), "1-3000003".to_string()]);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut state = ScannerState::new(&test_config("overwrite.json")).unwrap();
        state.insert_result(result(3_000_001, ScanStatus::Error));
        state.insert_result(result(3_000_001, ScanStatus::Found));
        assert_eq!(state.result(&ListingId::from_number(3_000_001)).unwrap().status, ScanStatus::Found);
        assert_eq!(state.stats().checked, 1);
    }

    #[test]
    fn test_set_min_interval_snaps_and_recomputes_jitter() {
        let mut state = ScannerState::new(&test_config("interval.json")).unwrap();
        state.set_min_interval(0.05);
        assert_eq!(state.min_interval(), 0.05);
        let (lo, hi) = state.jitter();
        assert!(lo <= hi);
        assert!(hi <= 0.15);
    }

    #[test]
    fn test_apply_envelope_ignores_bad_pieces() {
        let mut state = ScannerState::new(&test_config("apply.json")).unwrap();
        let before = state.range();

        let mut envelope = StateEnvelope::default();
        envelope.config.min_interval = Some(0.33); // off-menu: ignored
        envelope.range = Some(IdRange { start: 10, end: 2, step: 2 }); // invalid: ignored
        envelope.cache.insert("garbage-key".into(), result(3_000_001, ScanStatus::Found));
        envelope.cache.insert("1-3000003".into(), result(3_000_003, ScanStatus::Found));
        state.apply_envelope(envelope, 120_000);

        assert_eq!(state.min_interval(), 2.0);
        assert_eq!(state.range(), before);
        assert_eq!(state.stats().checked, 1);
    }

    #[test]
    fn test_persist_roundtrip_raw_cache_stays_empty() {
        let config = test_config("roundtrip.json");
        let _ = std::fs::remove_file(&config.state_path);

        let mut state = ScannerState::new(&config).unwrap();
        state.insert_result(result(3_000_001, ScanStatus::Found));
        state.insert_raw(ListingId::from_number(3_000_001), "<html>raw</html>");
        state.set_min_interval(0.5);
        state.mark_dirty(true);

        let mut reloaded = ScannerState::load_or_default(&config).unwrap();
        assert_eq!(reloaded.stats().checked, 1);
        assert_eq!(reloaded.min_interval(), 0.5);
        assert_eq!(reloaded.raw_len(), 0);
        assert!(reloaded.raw(&ListingId::from_number(3_000_001)).is_none());

        let _ = std::fs::remove_file(&config.state_path);
    }
}
