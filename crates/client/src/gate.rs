//! Global rate gate for outbound request starts.
//!
//! Concurrency bounds how many requests are in flight; this gate bounds how
//! frequently new ones may *start*. All fetch workers share one gate. The
//! gate's lock is independent of the state lock and is never held during
//! network I/O — only across the timed wait itself, which is exactly what
//! serializes request starts.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;

use idsweep_core::config::jitter_bounds;

pub struct RateGate {
    inner: Mutex<GateInner>,
}

struct GateInner {
    last_start: Option<Instant>,
    min_interval: Duration,
    jitter: (Duration, Duration),
}

impl RateGate {
    pub fn new(min_interval_secs: f64) -> Self {
        Self { inner: Mutex::new(GateInner::for_interval(min_interval_secs)) }
    }

    /// Block until permitted to start a request.
    ///
    /// One critical section: compute the earliest allowed start from the last
    /// recorded one, sleep the delta plus a random jitter, record the new
    /// start. Jitter only ever adds delay, so the wall-clock gap between any
    /// two permitted starts is at least the minimum interval.
    pub async fn acquire_slot(&self) {
        let mut gate = self.inner.lock().await;
        if let Some(last) = gate.last_start {
            let earliest = last + gate.min_interval;
            let now = Instant::now();
            if now < earliest {
                let jitter = sample_jitter(gate.jitter);
                tokio::time::sleep(earliest - now + jitter).await;
            }
        }
        gate.last_start = Some(Instant::now());
    }

    /// Swap the minimum interval; jitter bounds are recomputed with it.
    pub async fn set_interval(&self, min_interval_secs: f64) {
        let mut gate = self.inner.lock().await;
        let next = GateInner::for_interval(min_interval_secs);
        gate.min_interval = next.min_interval;
        gate.jitter = next.jitter;
        tracing::debug!(min_interval_secs, "rate gate interval updated");
    }

    pub async fn min_interval_secs(&self) -> f64 {
        self.inner.lock().await.min_interval.as_secs_f64()
    }
}

impl GateInner {
    fn for_interval(min_interval_secs: f64) -> Self {
        let secs = min_interval_secs.max(0.0);
        let (lo, hi) = jitter_bounds(secs);
        Self {
            last_start: None,
            min_interval: Duration::from_secs_f64(secs),
            jitter: (Duration::from_secs_f64(lo), Duration::from_secs_f64(hi)),
        }
    }
}

fn sample_jitter((lo, hi): (Duration, Duration)) -> Duration {
    if hi <= lo {
        return lo;
    }
    let secs = rand::thread_rng().gen_range(lo.as_secs_f64()..=hi.as_secs_f64());
    Duration::from_secs_f64(secs)
}
