//! k-anonymity nearest-neighbour de-identification
//!
//! A value is a *victim* when it is not public domain and its observed count is
//! below `min_count`. Every victim is replaced by a public candidate:
//!
//! 1. **Collect and block**: victims are indexed by their blocking keys. The
//!    candidate pool is streamed once; every candidate sharing a key with a
//!    victim is offered to that victim's [`ReservoirSet`].
//! 2. **First pass**: each victim takes the closest candidate in its reservoir
//!    that is not already a live vocabulary value. The collision check is
//!    repeated under the write lock, so when two victims want the same
//!    candidate the first writer wins and the other falls through.
//! 3. **Second pass**: victims still outstanding are paired with a uniform
//!    sample of unused candidates drawn in a second traversal of the pool.
//!
//! Victims left over after the second pass stay in the vocabulary and are
//! reported as residual.

use super::candidates::CandidateSource;
use super::distance::DeidentDistance;
use super::markers::PhaseMarkers;
use super::observer::Observer;
use super::summary::DeidentSummary;
use super::{build_pool, CountFn, VocabDeidentifier};
use crate::concurrent::{catch_task, dispatch_chunks, LazyConcurrentMap};
use crate::domain::{KanonError, Result};
use crate::sampling::ReservoirSet;
use crate::vocab::{VocabValue, Vocabulary};
use dashmap::{DashMap, DashSet};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Candidates kept per victim while blocking
pub const DEFAULT_RESERVOIR_CAPACITY: usize = 1000;

/// Candidates per streamed task
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Tuning for [`KAnonDeidentifier`]
#[derive(Debug, Clone, PartialEq)]
pub struct KAnonSettings {
    /// Values observed fewer than this many times are victims (k)
    pub min_count: f64,
    /// Reservoir size per victim
    pub reservoir_capacity: usize,
    /// Worker threads; 0 uses rayon's default
    pub threads: usize,
    /// Candidates per streamed task
    pub chunk_size: usize,
}

impl KAnonSettings {
    pub fn new(min_count: f64) -> Self {
        Self {
            min_count,
            reservoir_capacity: DEFAULT_RESERVOIR_CAPACITY,
            threads: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.min_count.is_nan() || self.min_count <= 0.0 || self.min_count.is_infinite() {
            return Err(KanonError::Configuration(format!(
                "min_count must be a positive number, got {}",
                self.min_count
            )));
        }
        if self.reservoir_capacity == 0 {
            return Err(KanonError::Configuration(
                "reservoir_capacity must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(KanonError::Configuration(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Victims by blocking key, and one reservoir per victim
struct BlockingIndex<I> {
    by_key: HashMap<String, Vec<I>>,
    reservoirs: HashMap<I, ReservoirSet<I>>,
}

/// A victim and the candidates its reservoir kept
struct Block<I> {
    victim: I,
    candidates: Vec<I>,
    tried: u64,
}

/// Two-pass k-anonymity engine
///
/// # Thread Safety
///
/// All passes run on an owned rayon pool. The vocabulary is only mutated under
/// its write lock, with the victim's index re-resolved inside the lock.
pub struct KAnonDeidentifier<I, V> {
    distance: Arc<dyn DeidentDistance<I, V>>,
    candidates: Arc<dyn CandidateSource<I>>,
    settings: KAnonSettings,
    markers: PhaseMarkers,
    pool: ThreadPool,
}

impl<I, V> KAnonDeidentifier<I, V>
where
    I: VocabValue,
    V: Send + Sync + 'static,
{
    /// Create an engine for one field
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings or if the worker
    /// pool cannot be built.
    pub fn new(
        distance: impl DeidentDistance<I, V> + 'static,
        candidates: impl CandidateSource<I> + 'static,
        settings: KAnonSettings,
    ) -> Result<Self> {
        Self::from_shared(Arc::new(distance), Arc::new(candidates), settings)
    }

    /// Create an engine from shared strategy objects
    pub fn from_shared(
        distance: Arc<dyn DeidentDistance<I, V>>,
        candidates: Arc<dyn CandidateSource<I>>,
        settings: KAnonSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let pool = build_pool(settings.threads, "kanon-worker")?;
        Ok(Self {
            distance,
            candidates,
            settings,
            markers: PhaseMarkers::default(),
            pool,
        })
    }

    /// Replace the progress markers
    pub fn with_markers(mut self, markers: PhaseMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn settings(&self) -> &KAnonSettings {
        &self.settings
    }

    fn is_victim(&self, value: &I, count: &CountFn<'_, I>) -> bool {
        !self.distance.is_public_domain(value) && count(value) < self.settings.min_count
    }

    /// Stream one full traversal of the candidate pool through `work`
    ///
    /// Returns the number of candidates read. A read error stops the
    /// traversal and is returned once the dispatched chunks have finished.
    fn stream_candidates<F>(&self, work: F) -> Result<usize>
    where
        F: Fn(I) + Send + Sync + 'static,
    {
        let mut read_error = None;
        let items = self.candidates.candidates()?.map_while(|item| match item {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                read_error = Some(e);
                None
            }
        });
        let scanned = dispatch_chunks(&self.pool, items, self.settings.chunk_size, work)?;
        match read_error {
            Some(e) => Err(e),
            None => Ok(scanned),
        }
    }

    /// Find victims and fill their reservoirs; `None` when there are no victims
    fn collect_and_block_victims(
        &self,
        vocab: &Vocabulary<I>,
        count: &CountFn<'_, I>,
        summary: &mut DeidentSummary,
    ) -> Result<Option<(Arc<BlockingIndex<I>>, DashSet<I>)>> {
        let values = vocab.values();
        let by_key: DashMap<String, Vec<I>> = DashMap::new();
        let victims: DashSet<I> = DashSet::new();

        self.pool.install(|| {
            values.par_iter().try_for_each(|value| {
                catch_task(|| {
                    (self.markers.deident)();
                    if !self.is_victim(value, count) {
                        return Ok(());
                    }
                    for key in self.distance.blocking_keys(value) {
                        by_key.entry(key).or_default().push(value.clone());
                    }
                    victims.insert(value.clone());
                    Ok(())
                })
            })
        })?;

        summary.victims = victims.len();
        if victims.is_empty() {
            tracing::info!(values = values.len(), "No victims found, nothing to anonymize");
            return Ok(None);
        }
        tracing::info!(
            values = values.len(),
            victims = victims.len(),
            blocking_keys = by_key.len(),
            "Collected victims"
        );

        let index = Arc::new(BlockingIndex {
            by_key: by_key.into_iter().collect(),
            reservoirs: victims
                .iter()
                .map(|victim| {
                    (
                        victim.key().clone(),
                        ReservoirSet::new(self.settings.reservoir_capacity),
                    )
                })
                .collect(),
        });

        let shared = Arc::clone(&index);
        let distance = Arc::clone(&self.distance);
        let marker = Arc::clone(&self.markers.blocking);
        summary.candidates_scanned = self.stream_candidates(move |candidate: I| {
            marker();
            let mut matched: HashSet<&I> = HashSet::new();
            for key in distance.blocking_keys(&candidate) {
                if let Some(victims) = shared.by_key.get(&key) {
                    matched.extend(victims.iter());
                }
            }
            if matched.is_empty() {
                return;
            }
            let mut rng = rand::thread_rng();
            for victim in matched {
                if let Some(reservoir) = shared.reservoirs.get(victim) {
                    reservoir.try_add(&mut rng, candidate.clone());
                }
            }
        })?;

        Ok(Some((index, victims)))
    }

    /// Replace each victim with its nearest unused blocking candidate
    fn first_pass(
        &self,
        vocab: &Vocabulary<I>,
        observer: &dyn Observer<I>,
        index: &BlockingIndex<I>,
        outstanding: &DashSet<I>,
        summary: &mut DeidentSummary,
    ) -> Result<()> {
        let mut blocks: Vec<Block<I>> = index
            .reservoirs
            .iter()
            .map(|(victim, reservoir)| Block {
                victim: victim.clone(),
                candidates: reservoir.snapshot(),
                tried: reservoir.total_tried(),
            })
            .collect();
        // smallest blocks first so unmatchable victims surface early
        blocks.sort_by_key(|block| block.tried);
        summary.victims_with_candidates =
            blocks.iter().filter(|b| !b.candidates.is_empty()).count();
        log_block_sizes(&blocks);

        let vectors = LazyConcurrentMap::new(|candidate: &I| self.distance.make_vector(candidate));
        let replaced = AtomicUsize::new(0);

        self.pool.install(|| {
            blocks
                .par_iter()
                .filter(|block| !block.candidates.is_empty())
                .try_for_each(|block| {
                    catch_task(|| {
                        (self.markers.first_pass)();
                        let Some(replacement) = self.best_match(vocab, block, &vectors) else {
                            return Ok(());
                        };

                        let mut guard = vocab.write();
                        if guard.contains(&replacement) {
                            tracing::trace!(replacement = ?replacement, "Best match taken by another victim");
                            return Ok(());
                        }
                        let Some(current) = guard.try_get_index_for(&block.victim) else {
                            return Ok(());
                        };
                        observer.on_blocking_replace(&block.victim, &replacement);
                        guard.update_index_value(current, replacement)?;
                        drop(guard);

                        outstanding.remove(&block.victim);
                        replaced.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    })
                })
        })?;

        summary.blocking_replacements = replaced.into_inner();
        tracing::info!(
            replaced = summary.blocking_replacements,
            outstanding = outstanding.len(),
            "First pass complete"
        );
        Ok(())
    }

    /// Closest candidate that is not a live value
    ///
    /// Equal distances are broken by the candidate's serialized form so the
    /// choice does not depend on reservoir order.
    fn best_match<F>(
        &self,
        vocab: &Vocabulary<I>,
        block: &Block<I>,
        vectors: &LazyConcurrentMap<I, V, F>,
    ) -> Option<I>
    where
        F: Fn(&I) -> V,
    {
        let unused: Vec<&I> = {
            let state = vocab.read();
            block
                .candidates
                .iter()
                .filter(|candidate| !state.contains(candidate))
                .collect()
        };
        if unused.is_empty() {
            return None;
        }

        let victim_vector = self.distance.make_vector(&block.victim);
        let mut best: Option<(&I, f64)> = None;
        for candidate in unused {
            let vector = vectors.get(candidate);
            let distance = self.distance.distance(&victim_vector, &vector);
            if distance.is_nan() {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, best_distance)) => match distance.total_cmp(&best_distance) {
                    CmpOrdering::Less => true,
                    CmpOrdering::Equal => tie_key(candidate) < tie_key(current),
                    CmpOrdering::Greater => false,
                },
            };
            if better {
                best = Some((candidate, distance));
            }
        }

        best.map(|(candidate, _)| candidate.clone())
    }

    /// Pair outstanding victims with a uniform sample of unused candidates
    fn second_pass(
        &self,
        vocab: &Vocabulary<I>,
        observer: &dyn Observer<I>,
        outstanding: &DashSet<I>,
        summary: &mut DeidentSummary,
    ) -> Result<()> {
        if outstanding.is_empty() {
            return Ok(());
        }

        let mut remaining: Vec<(usize, I)> = {
            let state = vocab.read();
            outstanding
                .iter()
                .filter_map(|victim| {
                    state
                        .try_get_index_for(victim.key())
                        .map(|index| (index, victim.key().clone()))
                })
                .collect()
        };
        remaining.sort_by_key(|(index, _)| *index);

        let live: Arc<HashSet<I>> = Arc::new(vocab.values().into_iter().collect());
        let sample = Arc::new(ReservoirSet::new(remaining.len()));
        let sink = Arc::clone(&sample);
        self.stream_candidates(move |candidate: I| {
            if !live.contains(&candidate) {
                sink.try_add(&mut rand::thread_rng(), candidate);
            }
        })?;
        let sampled = sample.snapshot();

        let replaced = catch_task(|| {
            let mut replaced = 0usize;
            for ((_, victim), replacement) in remaining.iter().zip(sampled) {
                let mut guard = vocab.write();
                if guard.contains(&replacement) {
                    continue;
                }
                let Some(current) = guard.try_get_index_for(victim) else {
                    continue;
                };
                observer.on_sample_replace(victim, &replacement);
                guard.update_index_value(current, replacement)?;
                replaced += 1;
            }
            Ok(replaced)
        })?;

        summary.sample_replacements = replaced;
        summary.residual_victims = remaining.len() - replaced;
        if summary.residual_victims > 0 {
            tracing::warn!(
                residual = summary.residual_victims,
                sampled = replaced,
                "Candidate pool exhausted before every victim was replaced"
            );
        }
        Ok(())
    }
}

impl<I, V> VocabDeidentifier<I> for KAnonDeidentifier<I, V>
where
    I: VocabValue,
    V: Send + Sync + 'static,
{
    fn deidentify(
        &self,
        vocab: &Vocabulary<I>,
        count: &CountFn<'_, I>,
        observer: &dyn Observer<I>,
    ) -> Result<DeidentSummary> {
        let _span = tracing::info_span!("kanon_deidentify", min_count = self.settings.min_count)
            .entered();
        let start = Instant::now();
        let mut summary = DeidentSummary::new(vocab.len());

        let Some((index, outstanding)) =
            self.collect_and_block_victims(vocab, count, &mut summary)?
        else {
            return Ok(summary.with_duration(start.elapsed()));
        };
        self.first_pass(vocab, observer, &index, &outstanding, &mut summary)?;
        self.second_pass(vocab, observer, &outstanding, &mut summary)?;

        Ok(summary.with_duration(start.elapsed()))
    }
}

fn tie_key<I: serde::Serialize>(value: &I) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn log_block_sizes<I>(blocks: &[Block<I>]) {
    let Some(largest) = blocks.last() else {
        return;
    };
    let percentile = |p: f64| blocks[((blocks.len() - 1) as f64 * p).round() as usize].tried;
    tracing::info!(
        victims = blocks.len(),
        without_candidates = blocks.iter().filter(|b| b.candidates.is_empty()).count(),
        p50 = percentile(0.50),
        p90 = percentile(0.90),
        p99 = percentile(0.99),
        max = largest.tried,
        "Blocking complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deident::distance::EditDistance;
    use crate::deident::markers::MarkerCounts;
    use crate::deident::observer::recording::RecordingObserver;
    use crate::deident::observer::{NoopObserver, ReplacementPhase};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn engine(candidates: &[&str], min_count: f64) -> KAnonDeidentifier<String, Vec<char>> {
        let settings = KAnonSettings {
            threads: 2,
            chunk_size: 2,
            ..KAnonSettings::new(min_count)
        };
        KAnonDeidentifier::new(EditDistance::new(2, 2), strings(candidates), settings).unwrap()
    }

    #[test]
    fn test_settings_validation() {
        assert!(KAnonSettings::new(30.0).validate().is_ok());
        assert!(KAnonSettings::new(0.0).validate().is_err());
        assert!(KAnonSettings::new(f64::NAN).validate().is_err());
        let settings = KAnonSettings {
            reservoir_capacity: 0,
            ..KAnonSettings::new(5.0)
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let vocab: Vocabulary<String> = strings(&["Johm", "Mary"]).into_iter().collect();
        let counts = HashMap::from([("Johm".to_string(), 1.0), ("Mary".to_string(), 100.0)]);
        let deidentifier = engine(&["Jo", "John", "Joanna"], 10.0);
        let observer = RecordingObserver::default();

        let summary = deidentifier
            .deidentify(&vocab, &|v: &String| counts[v], &observer)
            .unwrap();

        assert_eq!(summary.victims, 1);
        assert_eq!(summary.blocking_replacements, 1);
        assert!(vocab.contains(&"John".to_string()));
        assert!(!vocab.contains(&"Johm".to_string()));
        assert_eq!(
            observer.events.lock().as_slice(),
            &[(
                ReplacementPhase::Blocking,
                "Johm".to_string(),
                "John".to_string()
            )]
        );
    }

    #[test]
    fn test_tie_broken_by_serialized_form() {
        // "Amx" and "Amz" are both one edit away from "Amy"
        let vocab: Vocabulary<String> = strings(&["Amy"]).into_iter().collect();
        let deidentifier = engine(&["Amz", "Amx"], 10.0);

        deidentifier
            .deidentify(&vocab, &|_: &String| 1.0, &NoopObserver)
            .unwrap();

        assert_eq!(vocab.values(), strings(&["Amx"]));
    }

    #[test]
    fn test_candidate_already_in_vocabulary_is_skipped() {
        let vocab: Vocabulary<String> = strings(&["Jonh", "John"]).into_iter().collect();
        let counts = HashMap::from([("Jonh".to_string(), 1.0), ("John".to_string(), 100.0)]);
        let deidentifier = engine(&["John", "Joseph"], 10.0);

        let summary = deidentifier
            .deidentify(&vocab, &|v: &String| counts[v], &NoopObserver)
            .unwrap();

        assert_eq!(summary.blocking_replacements, 1);
        assert_eq!(vocab.len(), 2);
        assert!(vocab.contains(&"Joseph".to_string()));
    }

    #[test]
    fn test_public_domain_values_are_ignored() {
        let vocab: Vocabulary<String> = strings(&["J", ""]).into_iter().collect();
        let deidentifier = engine(&["Jo"], 10.0);

        let summary = deidentifier
            .deidentify(&vocab, &|_: &String| 0.0, &NoopObserver)
            .unwrap();

        assert_eq!(summary.victims, 0);
        assert_eq!(vocab.values(), strings(&["J", ""]));
    }

    #[test]
    fn test_markers_count_units_of_work() {
        let counts = Arc::new(MarkerCounts::default());
        let vocab: Vocabulary<String> = strings(&["Jonh", "Mary", "Zed"]).into_iter().collect();
        let occurrences = HashMap::from([
            ("Jonh".to_string(), 1.0),
            ("Mary".to_string(), 50.0),
            ("Zed".to_string(), 1.0),
        ]);
        let deidentifier = engine(&["John", "Amy", "Bob"], 10.0)
            .with_markers(PhaseMarkers::counting(Arc::clone(&counts)));

        deidentifier
            .deidentify(&vocab, &|v: &String| occurrences[v], &NoopObserver)
            .unwrap();

        // every value examined, every candidate streamed, one victim with a block
        assert_eq!(counts.totals(), (3, 3, 1));
    }

    #[test]
    fn test_distance_panic_aborts_run() {
        struct Exploding;
        impl DeidentDistance<String, ()> for Exploding {
            fn make_vector(&self, _: &String) {}
            fn is_public_domain(&self, _: &String) -> bool {
                false
            }
            fn distance(&self, _: &(), _: &()) -> f64 {
                0.0
            }
            fn blocking_keys(&self, input: &String) -> HashSet<String> {
                if input == "Bad" {
                    panic!("cannot block {input}");
                }
                HashSet::from(["k".to_string()])
            }
        }

        let vocab: Vocabulary<String> = strings(&["Victim"]).into_iter().collect();
        let deidentifier: KAnonDeidentifier<String, ()> =
            KAnonDeidentifier::new(Exploding, strings(&["Good", "Bad"]), KAnonSettings::new(5.0))
                .unwrap();

        let result = deidentifier.deidentify(&vocab, &|_: &String| 1.0, &NoopObserver);
        assert!(matches!(result, Err(KanonError::TaskFailed(_))));
    }

    #[test]
    fn test_vector_panic_in_first_pass_aborts_run() {
        struct BadVector;
        impl DeidentDistance<String, usize> for BadVector {
            fn make_vector(&self, input: &String) -> usize {
                if input == "Victim" {
                    panic!("no vector for {input}");
                }
                input.len()
            }
            fn is_public_domain(&self, _: &String) -> bool {
                false
            }
            fn distance(&self, a: &usize, b: &usize) -> f64 {
                a.abs_diff(*b) as f64
            }
            fn blocking_keys(&self, _: &String) -> HashSet<String> {
                HashSet::from(["k".to_string()])
            }
        }

        let vocab: Vocabulary<String> = strings(&["Victim"]).into_iter().collect();
        let deidentifier: KAnonDeidentifier<String, usize> =
            KAnonDeidentifier::new(BadVector, strings(&["Good"]), KAnonSettings::new(5.0))
                .unwrap();

        let result = deidentifier.deidentify(&vocab, &|_: &String| 1.0, &NoopObserver);
        match result {
            Err(KanonError::TaskFailed(message)) => assert!(message.contains("no vector for Victim")),
            other => panic!("expected TaskFailed, got {other:?}"),
        }
        assert_eq!(vocab.values(), strings(&["Victim"]));
    }

    #[test]
    fn test_observer_panic_in_sample_pass_aborts_run() {
        struct Refusing;
        impl Observer<String> for Refusing {
            fn on_sample_replace(&self, _: &String, _: &String) {
                panic!("audit sink closed");
            }
        }

        let vocab: Vocabulary<String> = strings(&["Zxqqy"]).into_iter().collect();
        let result = engine(&["Amy"], 10.0).deidentify(&vocab, &|_: &String| 1.0, &Refusing);
        assert!(matches!(result, Err(KanonError::TaskFailed(_))));
    }
}
