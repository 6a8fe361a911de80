//! Structural remapping of vocabulary values
//!
//! Used for fields whose values are generated to a format (phone numbers,
//! postcodes) where a nearest-neighbour search makes no sense. The remap
//! function decides per value whether to rewrite it; rewriting onto a value
//! that already exists merges the two slots.

use super::observer::Observer;
use super::summary::DeidentSummary;
use super::{build_pool, CountFn, VocabDeidentifier};
use crate::concurrent::catch_task;
use crate::domain::Result;
use crate::vocab::{VocabValue, Vocabulary};
use rand::Rng;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Remap function: `(value, count) -> Some(new value)` to rewrite
pub type RemapFn<T> = dyn Fn(&T, &CountFn<'_, T>) -> Option<T> + Send + Sync;

/// Applies a [`RemapFn`] to every live value in parallel
pub struct RemapDeidentifier<T> {
    remap: Box<RemapFn<T>>,
    pool: ThreadPool,
}

impl<T: VocabValue> RemapDeidentifier<T> {
    /// # Errors
    ///
    /// Returns a configuration error if the worker pool cannot be built.
    pub fn new(remap: Box<RemapFn<T>>, threads: usize) -> Result<Self> {
        Ok(Self {
            remap,
            pool: build_pool(threads, "kanon-remap")?,
        })
    }
}

impl<T: VocabValue> VocabDeidentifier<T> for RemapDeidentifier<T> {
    /// Rewrite every value the remap function maps elsewhere
    ///
    /// Entries are snapshotted up front. A slot whose value changed since the
    /// snapshot (another remap merged into it) is left alone. The observer is
    /// not notified.
    fn deidentify(
        &self,
        vocab: &Vocabulary<T>,
        count: &CountFn<'_, T>,
        _observer: &dyn Observer<T>,
    ) -> Result<DeidentSummary> {
        let _span = tracing::info_span!("remap_deidentify").entered();
        let start = Instant::now();
        let entries = vocab.entries();
        let mut summary = DeidentSummary::new(entries.len());
        let remapped = AtomicUsize::new(0);
        let merged = AtomicUsize::new(0);

        self.pool.install(|| {
            entries
                .par_iter()
                .try_for_each(|(index, value)| {
                    catch_task(|| {
                        let Some(new_value) = (self.remap)(value, count) else {
                            return Ok(());
                        };
                        if &new_value == value {
                            return Ok(());
                        }

                        let mut guard = vocab.write();
                        if guard.get_for_index_no_resolve(*index)? != Some(value) {
                            tracing::trace!(index = *index, "Slot changed since snapshot, skipping");
                            return Ok(());
                        }
                        let target = guard.update_index_value(*index, new_value)?;
                        remapped.fetch_add(1, Ordering::Relaxed);
                        if target != *index {
                            merged.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(())
                    })
                })
        })?;

        summary.remapped = remapped.into_inner();
        summary.merged = merged.into_inner();
        tracing::debug!(
            remapped = summary.remapped,
            merged = summary.merged,
            "Remap complete"
        );
        Ok(summary.with_duration(start.elapsed()))
    }
}

/// Remap that re-rolls the ASCII digits of rare values
///
/// Values with a count of at least `min_count`, or with no digits, are kept.
/// Every other character is preserved, so the format survives.
pub fn digit_remap(min_count: f64) -> Box<RemapFn<String>> {
    Box::new(move |value: &String, count: &CountFn<'_, String>| {
        if count(value) >= min_count || !value.bytes().any(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut rng = rand::thread_rng();
        Some(
            value
                .chars()
                .map(|c| {
                    if c.is_ascii_digit() {
                        char::from(b'0' + rng.gen_range(0..10u8))
                    } else {
                        c
                    }
                })
                .collect(),
        )
    })
}
