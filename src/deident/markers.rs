//! Progress markers for the k-anonymity passes
//!
//! Each marker is called once per unit of work: `deident` per vocabulary value
//! examined while collecting victims, `blocking` per candidate streamed through
//! the blocking index, `first_pass` per victim scanned for a nearest match.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Injected unit-of-work callback
pub type Marker = Arc<dyn Fn() + Send + Sync>;

fn noop() -> Marker {
    Arc::new(|| {})
}

/// Marker callbacks, no-ops by default
#[derive(Clone)]
pub struct PhaseMarkers {
    pub deident: Marker,
    pub blocking: Marker,
    pub first_pass: Marker,
}

impl Default for PhaseMarkers {
    fn default() -> Self {
        Self {
            deident: noop(),
            blocking: noop(),
            first_pass: noop(),
        }
    }
}

impl std::fmt::Debug for PhaseMarkers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseMarkers").finish_non_exhaustive()
    }
}

impl PhaseMarkers {
    /// Markers that tally into `counts`
    pub fn counting(counts: Arc<MarkerCounts>) -> Self {
        let deident = Arc::clone(&counts);
        let blocking = Arc::clone(&counts);
        let first_pass = counts;
        Self {
            deident: Arc::new(move || {
                deident.deident.fetch_add(1, Ordering::Relaxed);
            }),
            blocking: Arc::new(move || {
                blocking.blocking.fetch_add(1, Ordering::Relaxed);
            }),
            first_pass: Arc::new(move || {
                first_pass.first_pass.fetch_add(1, Ordering::Relaxed);
            }),
        }
    }
}

/// Counters fed by [`PhaseMarkers::counting`]
#[derive(Debug, Default)]
pub struct MarkerCounts {
    pub deident: AtomicU64,
    pub blocking: AtomicU64,
    pub first_pass: AtomicU64,
}

impl MarkerCounts {
    /// `(deident, blocking, first_pass)` totals
    pub fn totals(&self) -> (u64, u64, u64) {
        (
            self.deident.load(Ordering::Relaxed),
            self.blocking.load(Ordering::Relaxed),
            self.first_pass.load(Ordering::Relaxed),
        )
    }
}
