//! Vocabulary de-identification
//!
//! Two strategies rewrite a [`Vocabulary`] in place:
//!
//! - [`KAnonDeidentifier`]: replaces rare, identifying values with the nearest
//!   public candidate found through blocking keys, then falls back to a
//!   uniform sample of the candidate pool.
//! - [`RemapDeidentifier`]: applies a structural remap function to every live
//!   value (phone numbers and similar generated formats).
//!
//! Both report through the same [`VocabDeidentifier`] entry point.
//!
//! # Usage
//!
//! ```rust,no_run
//! use kanon::deident::{EditDistance, KAnonDeidentifier, KAnonSettings, NoopObserver, VocabDeidentifier};
//! use kanon::vocab::Vocabulary;
//! use std::collections::HashMap;
//!
//! # fn example() -> kanon::domain::Result<()> {
//! let vocab: Vocabulary<String> = ["Zxqqy", "John"].iter().map(|s| s.to_string()).collect();
//! let counts = HashMap::from([("Zxqqy".to_string(), 1.0), ("John".to_string(), 500.0)]);
//! let candidates = vec!["Jon".to_string(), "Zack".to_string(), "Amy".to_string()];
//!
//! let deidentifier: KAnonDeidentifier<String, Vec<char>> = KAnonDeidentifier::new(
//!     EditDistance::default(),
//!     candidates,
//!     KAnonSettings::new(30.0),
//! )?;
//! let count = |value: &String| counts.get(value).copied().unwrap_or(0.0);
//! let summary = deidentifier.deidentify(&vocab, &count, &NoopObserver)?;
//! assert_eq!(summary.victims, 1);
//! assert!(!vocab.contains(&"Zxqqy".to_string()));
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod candidates;
pub mod distance;
pub mod kanon;
pub mod markers;
pub mod observer;
pub mod remap;
pub mod summary;

pub use audit::AuditObserver;
pub use candidates::{CandidateSource, LineCandidates};
pub use distance::{DeidentDistance, EditDistance};
pub use kanon::{KAnonDeidentifier, KAnonSettings};
pub use markers::{Marker, MarkerCounts, PhaseMarkers};
pub use observer::{NoopObserver, Observer, ReplacementPhase};
pub use remap::{digit_remap, RemapDeidentifier, RemapFn};
pub use summary::DeidentSummary;

use crate::domain::{KanonError, Result};
use crate::vocab::{VocabValue, Vocabulary};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Occurrence count of a value in the profiled corpus
pub type CountFn<'a, I> = dyn Fn(&I) -> f64 + Sync + 'a;

/// Strategy that rewrites a vocabulary in place
pub trait VocabDeidentifier<I: VocabValue>: Send + Sync {
    /// Replace every value that fails the strategy's test
    ///
    /// The vocabulary is mutated in place. Falling short of replacing every
    /// victim is reported in the summary, not as an error.
    ///
    /// # Errors
    ///
    /// Vocabulary precondition violations and failed worker tasks abort the
    /// run; the vocabulary must then be treated as partially rewritten.
    fn deidentify(
        &self,
        vocab: &Vocabulary<I>,
        count: &CountFn<'_, I>,
        observer: &dyn Observer<I>,
    ) -> Result<DeidentSummary>;
}

/// Build a worker pool; `threads == 0` uses rayon's default size
pub(crate) fn build_pool(threads: usize, name: &'static str) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("{name}-{i}"))
        .build()
        .map_err(|e| KanonError::Configuration(format!("Failed to build worker pool: {e}")))
}
