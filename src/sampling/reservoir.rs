//! Concurrent reservoir sampling (Algorithm R) with set semantics
//!
//! Bounds the number of candidates kept per victim while blocking. After
//! `n >= capacity` distinct offers, the sample is a uniform random subset of
//! size `capacity` of everything offered.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug)]
struct Sample<T> {
    items: Vec<T>,
    members: HashSet<T>,
    total_tried: u64,
}

/// Fixed-capacity, thread-safe candidate sample
///
/// # Examples
///
/// ```
/// use kanon::sampling::ReservoirSet;
/// use rand::SeedableRng;
///
/// let reservoir = ReservoirSet::new(2);
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// for name in ["Jon", "Zack", "Amy"] {
///     reservoir.try_add(&mut rng, name.to_string());
/// }
/// assert_eq!(reservoir.total_tried(), 3);
/// assert_eq!(reservoir.final_set().len(), 2);
/// ```
#[derive(Debug)]
pub struct ReservoirSet<T> {
    capacity: usize,
    sample: Mutex<Sample<T>>,
}

impl<T: Clone + Eq + Hash> ReservoirSet<T> {
    /// Create a reservoir holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sample: Mutex::new(Sample {
                items: Vec::with_capacity(capacity.min(1024)),
                members: HashSet::new(),
                total_tried: 0,
            }),
        }
    }

    /// Offer a candidate; returns whether it entered the sample
    ///
    /// A candidate already in the sample counts as tried but is not stored twice.
    pub fn try_add<R: Rng>(&self, rng: &mut R, candidate: T) -> bool {
        let mut sample = self.sample.lock();
        sample.total_tried += 1;

        if self.capacity == 0 || sample.members.contains(&candidate) {
            return false;
        }

        if sample.items.len() < self.capacity {
            sample.members.insert(candidate.clone());
            sample.items.push(candidate);
            return true;
        }

        let slot = rng.gen_range(0..sample.total_tried);
        if slot >= self.capacity as u64 {
            return false;
        }
        let slot = slot as usize;
        let evicted = std::mem::replace(&mut sample.items[slot], candidate.clone());
        sample.members.remove(&evicted);
        sample.members.insert(candidate);
        true
    }

    /// Consume the reservoir and return the sampled items
    pub fn final_set(self) -> Vec<T> {
        self.sample.into_inner().items
    }

    /// Clone of the current sample
    pub fn snapshot(&self) -> Vec<T> {
        self.sample.lock().items.clone()
    }

    /// Lifetime number of offers
    pub fn total_tried(&self) -> u64 {
        self.sample.lock().total_tried
    }

    pub fn len(&self) -> usize {
        self.sample.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
