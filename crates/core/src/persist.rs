//! Throttled, atomic persistence of the state envelope.
//!
//! Writes are coalesced: at most one save per N mutations or per T seconds,
//! whichever comes first, plus an immediate path for forced saves after
//! user-visible configuration changes. The file is replaced atomically
//! (write-to-temp, then rename) so a crash mid-write never corrupts the
//! previous good copy. Persistence failures are logged and swallowed; the
//! in-memory state stays the source of truth.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::model::StateEnvelope;

/// Serialize and atomically replace the envelope file.
pub fn save_envelope(path: &Path, envelope: &StateEnvelope) -> Result<(), Error> {
    let bytes =
        serde_json::to_vec_pretty(envelope).map_err(|e| Error::Persist(format!("serialize failed: {e}")))?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::Persist(format!("mkdir failed: {e}")))?;
    }

    let tmp = tmp_path(path);
    if let Err(e) = std::fs::write(&tmp, &bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::Persist(format!("write failed: {e}")));
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::Persist(format!("rename failed: {e}")));
    }
    Ok(())
}

/// Read the envelope if present; any read or shape error yields `None`.
pub fn load_envelope(path: &Path) -> Option<StateEnvelope> {
    let bytes = std::fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(env) => Some(env),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt state file");
            None
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Coalesces envelope writes. Must only be driven while the state lock is
/// held, since the envelope snapshots the result cache.
#[derive(Debug)]
pub struct PersistThrottle {
    path: PathBuf,
    every_n: u32,
    min_interval: Duration,
    dirty: u32,
    last_save: Instant,
}

impl PersistThrottle {
    pub fn new(path: PathBuf, every_n: u32, min_interval: Duration) -> Self {
        Self { path, every_n: every_n.max(1), min_interval, dirty: 0, last_save: Instant::now() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one mutation; returns whether a save is due now.
    pub fn mark_dirty(&mut self, force: bool) -> bool {
        self.dirty += 1;
        force || self.dirty >= self.every_n || self.last_save.elapsed() >= self.min_interval
    }

    /// Perform the save and reset the throttle counters. Failure is logged,
    /// never propagated; the counters reset either way so a broken disk does
    /// not turn every later mutation into a write attempt.
    pub fn save(&mut self, envelope: &StateEnvelope) {
        match save_envelope(&self.path, envelope) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), entries = envelope.cache.len(), "state saved")
            }
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "state save failed"),
        }
        self.dirty = 0;
        self.last_save = Instant::now();
    }
}
