//! One-producer / many-consumer completion latch
//!
//! The producer calls [`produce_one`](ProducerCountDownLatch::produce_one) for
//! every unit of work it queues and
//! [`producer_complete`](ProducerCountDownLatch::producer_complete) once it
//! stops producing. Consumers call
//! [`consume_one`](ProducerCountDownLatch::consume_one) per finished unit.
//! Waiters are released when the producer is done and nothing is outstanding,
//! or as soon as any party reports a failure.
//!
//! The producer publishes `producer_done` before it reads the outstanding
//! count; consumers decrement before they read `producer_done`. Whichever side
//! observes both conditions last completes the latch, so completion is never
//! missed.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct LatchState {
    completed: bool,
    failure: Option<Arc<anyhow::Error>>,
    suppressed: usize,
}

/// Completion tracker for a streamed batch of tasks
#[derive(Debug, Default)]
pub struct ProducerCountDownLatch {
    outstanding: AtomicUsize,
    producer_done: AtomicBool,
    state: Mutex<LatchState>,
    signal: Condvar,
}

/// First failure reported to a latch
#[derive(Debug, Clone)]
pub struct LatchFailure {
    first: Arc<anyhow::Error>,
    suppressed: usize,
}

impl LatchFailure {
    /// The first reported failure
    pub fn first(&self) -> &anyhow::Error {
        &self.first
    }

    /// Number of later failures that were dropped
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }
}

impl fmt::Display for LatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.first)?;
        if self.suppressed > 0 {
            write!(f, " ({} further failures suppressed)", self.suppressed)?;
        }
        Ok(())
    }
}

impl std::error::Error for LatchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let inner: &(dyn std::error::Error + Send + Sync + 'static) = (*self.first).as_ref();
        Some(inner)
    }
}

impl ProducerCountDownLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one queued unit of work
    pub fn produce_one(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    /// Signal that no more work will be produced
    pub fn producer_complete(&self) {
        self.producer_done.store(true, Ordering::SeqCst);
        if self.outstanding.load(Ordering::SeqCst) == 0 {
            self.complete();
        }
    }

    /// Mark one unit of work as finished
    pub fn consume_one(&self) {
        let decremented = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        match decremented {
            Ok(1) if self.producer_done.load(Ordering::SeqCst) => self.complete(),
            Ok(_) => {
                // wake a producer waiting for capacity
                let _state = self.state.lock();
                self.signal.notify_all();
            }
            Err(_) => self.failure(anyhow::anyhow!(
                "consume_one called with no outstanding work"
            )),
        }
    }

    /// Record a failure and release all waiters
    ///
    /// Only the first failure is kept; later ones are counted as suppressed.
    pub fn failure(&self, error: anyhow::Error) {
        let mut state = self.state.lock();
        if state.failure.is_none() {
            state.failure = Some(Arc::new(error));
        } else {
            state.suppressed += 1;
            tracing::debug!(error = %error, "Suppressed additional task failure");
        }
        state.completed = true;
        self.signal.notify_all();
    }

    fn complete(&self) {
        let mut state = self.state.lock();
        state.completed = true;
        self.signal.notify_all();
    }

    /// Block until completion; returns the first failure if one was reported
    pub fn wait(&self) -> Result<(), LatchFailure> {
        let mut state = self.state.lock();
        while !state.completed {
            self.signal.wait(&mut state);
        }
        match state.failure {
            Some(ref first) => Err(LatchFailure {
                first: Arc::clone(first),
                suppressed: state.suppressed,
            }),
            None => Ok(()),
        }
    }

    /// Block the producer while `limit` or more units are outstanding
    ///
    /// Returns early once the latch has completed (for example after a failure).
    pub fn wait_for_capacity(&self, limit: usize) {
        let mut state = self.state.lock();
        while !state.completed && self.outstanding.load(Ordering::SeqCst) >= limit {
            self.signal.wait(&mut state);
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().completed
    }

    pub fn has_failed(&self) -> bool {
        self.state.lock().failure.is_some()
    }
}
