//! Replacement observers
//!
//! Observers receive one callback per replacement for audit purposes. They
//! are invoked while the vocabulary write lock is held, so implementations
//! must not touch the vocabulary.

use serde::Serialize;

/// Which pass of the k-anonymity engine made a replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementPhase {
    /// Nearest neighbour from the victim's blocking reservoir
    Blocking,
    /// Uniform fallback sample from the whole candidate pool
    Sample,
}

/// Audit hook for replacements
pub trait Observer<I>: Send + Sync {
    fn on_blocking_replace(&self, _original: &I, _replacement: &I) {}

    fn on_sample_replace(&self, _original: &I, _replacement: &I) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<I> Observer<I> for NoopObserver {}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use parking_lot::Mutex;

    /// Test observer keeping every event in order
    #[derive(Debug, Default)]
    pub struct RecordingObserver<I> {
        pub events: Mutex<Vec<(ReplacementPhase, I, I)>>,
    }

    impl<I: Clone + Send + Sync> Observer<I> for RecordingObserver<I> {
        fn on_blocking_replace(&self, original: &I, replacement: &I) {
            self.events.lock().push((
                ReplacementPhase::Blocking,
                original.clone(),
                replacement.clone(),
            ));
        }

        fn on_sample_replace(&self, original: &I, replacement: &I) {
            self.events.lock().push((
                ReplacementPhase::Sample,
                original.clone(),
                replacement.clone(),
            ));
        }
    }
}
