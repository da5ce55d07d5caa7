//! Batch orchestration over the probe pool and the scanner state.
//!
//! `check_batch` keeps a sliding submission window over the input list: up to
//! `concurrency` cache misses are in flight at once, topped up as slots free,
//! while results are emitted strictly in input order. Cache hits are served
//! immediately and never wait behind an in-flight fetch.

use std::collections::HashMap;

use tokio::task::JoinHandle;

use idsweep_core::{CheckedResult, Error, ListingId, ScanResult, ScanStatus, SharedState};

use crate::fetch::{Fetch, ProbePool};

/// Request-side limits and the cached-ERROR policy.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub max_batch_ids: usize,
    pub max_cache_batch_ids: usize,
    /// When set, a cache-hit ERROR entry also trips `stop_on_error`.
    /// Default off: only fresh fetch failures short-circuit a batch.
    pub stop_on_cached_error: bool,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self { max_batch_ids: 1000, max_cache_batch_ids: 2000, stop_on_cached_error: false }
    }
}

/// Outcome of one batch check.
#[derive(Debug)]
pub struct BatchOutcome {
    /// One entry per input id, or an error-terminated prefix when stopped.
    pub items: Vec<CheckedResult>,
    pub stopped_early: bool,
}

type ProbeHandle = JoinHandle<Result<(ScanResult, String), Error>>;

pub struct Scanner<F> {
    state: SharedState,
    pool: ProbePool<F>,
    policy: ScanPolicy,
}

impl<F: Fetch + Clone + Send + Sync + 'static> Scanner<F> {
    pub fn new(state: SharedState, pool: ProbePool<F>, policy: ScanPolicy) -> Self {
        Self { state, pool, policy }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn policy(&self) -> &ScanPolicy {
        &self.policy
    }

    /// Check one identifier, serving the cache unless `force`.
    ///
    /// A fetch failure is recorded as a cached ERROR result, not returned as
    /// an error: re-checking with `force` is the only retry path.
    pub async fn check_one(&self, id_like: &str, force: bool) -> Result<CheckedResult, Error> {
        let id = ListingId::normalize(id_like)?;
        {
            let state = self.state.lock().await;
            if !state.range().contains(id.number()) {
                return Err(Error::OutOfRange(id.to_string()));
            }
            if !force && let Some(hit) = state.result(&id) {
                return Ok(CheckedResult::cached(hit.clone()));
            }
        }

        match self.pool.probe(&id).await {
            Ok((result, raw)) => {
                let mut state = self.state.lock().await;
                state.insert_result(result.clone());
                state.insert_raw(id, &raw);
                state.mark_dirty(false);
                Ok(CheckedResult::fresh(result))
            }
            Err(e) => {
                let result = ScanResult::from_failure(id, e.to_string());
                let mut state = self.state.lock().await;
                state.insert_result(result.clone());
                state.mark_dirty(false);
                Ok(CheckedResult::fresh(result))
            }
        }
    }

    /// Check an ordered batch; output order equals input order.
    pub async fn check_batch(&self, ids: &[String], force: bool, stop_on_error: bool) -> Result<BatchOutcome, Error> {
        if ids.is_empty() {
            return Err(Error::InvalidInput("ids must be a non-empty list".to_string()));
        }
        if ids.len() > self.policy.max_batch_ids {
            return Err(Error::BatchTooLarge { got: ids.len(), max: self.policy.max_batch_ids });
        }

        // validate everything up front: a bad id aborts before any submission
        let batch = {
            let state = self.state.lock().await;
            let mut batch = Vec::with_capacity(ids.len());
            for raw in ids {
                let id = ListingId::normalize(raw)?;
                if !state.range().contains(id.number()) {
                    return Err(Error::OutOfRange(id.to_string()));
                }
                batch.push(id);
            }
            batch
        };

        let mut in_flight: HashMap<usize, ProbeHandle> = HashMap::new();
        let mut cursor = 0usize;
        self.submit_until_full(&batch, force, &mut in_flight, &mut cursor).await;

        let mut items = Vec::with_capacity(batch.len());
        let mut stopped_early = false;
        let mut dirty = false;

        for (i, id) in batch.iter().enumerate() {
            if !force {
                let hit = self.state.lock().await.result(id).cloned();
                if let Some(hit) = hit {
                    let stop_here =
                        stop_on_error && self.policy.stop_on_cached_error && hit.status == ScanStatus::Error;
                    items.push(CheckedResult::cached(hit));
                    if stop_here {
                        abort_all(&mut in_flight);
                        stopped_early = true;
                        break;
                    }
                    self.submit_until_full(&batch, force, &mut in_flight, &mut cursor).await;
                    continue;
                }
            }

            // normally submitted ahead by the window; spawn on the spot if
            // bookkeeping missed it
            let handle = match in_flight.remove(&i) {
                Some(handle) => handle,
                None => self.spawn_probe(id.clone()),
            };
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::HttpError(format!("fetch task failed: {e}"))),
            };

            match outcome {
                Ok((result, raw)) => {
                    {
                        let mut state = self.state.lock().await;
                        state.insert_result(result.clone());
                        state.insert_raw(id.clone(), &raw);
                    }
                    dirty = true;
                    items.push(CheckedResult::fresh(result));
                }
                Err(e) => {
                    let result = ScanResult::from_failure(id.clone(), e.to_string());
                    self.state.lock().await.insert_result(result.clone());
                    dirty = true;
                    items.push(CheckedResult::fresh(result));

                    if stop_on_error {
                        abort_all(&mut in_flight);
                        stopped_early = true;
                        break;
                    }
                }
            }

            self.submit_until_full(&batch, force, &mut in_flight, &mut cursor).await;
        }

        if dirty {
            self.state.lock().await.mark_dirty(false);
        }

        Ok(BatchOutcome { items, stopped_early })
    }

    /// Return only entries already present in the result cache; no network,
    /// no mutation. Absent ids are simply omitted.
    pub async fn cache_batch(&self, ids: &[String]) -> Result<Vec<CheckedResult>, Error> {
        if ids.is_empty() {
            return Err(Error::InvalidInput("ids must be a non-empty list".to_string()));
        }
        if ids.len() > self.policy.max_cache_batch_ids {
            return Err(Error::BatchTooLarge { got: ids.len(), max: self.policy.max_cache_batch_ids });
        }

        let mut batch = Vec::with_capacity(ids.len());
        for raw in ids {
            batch.push(ListingId::normalize(raw)?);
        }

        let state = self.state.lock().await;
        Ok(batch.iter().filter_map(|id| state.result(id).cloned().map(CheckedResult::cached)).collect())
    }

    /// Top the in-flight window up to the concurrency limit, skipping over
    /// ids the cache will serve at their turn.
    async fn submit_until_full(
        &self, batch: &[ListingId], force: bool, in_flight: &mut HashMap<usize, ProbeHandle>, cursor: &mut usize,
    ) {
        while *cursor < batch.len() && in_flight.len() < self.pool.concurrency() {
            let i = *cursor;
            if !force {
                let cached = self.state.lock().await.result(&batch[i]).is_some();
                if cached {
                    *cursor += 1;
                    continue;
                }
            }
            in_flight.insert(i, self.spawn_probe(batch[i].clone()));
            *cursor += 1;
        }
    }

    fn spawn_probe(&self, id: ListingId) -> ProbeHandle {
        let pool = self.pool.clone();
        tokio::spawn(async move { pool.probe(&id).await })
    }
}

fn abort_all(in_flight: &mut HashMap<usize, ProbeHandle>) {
    for (_, handle) in in_flight.drain() {
        handle.abort();
    }
}
