//! Distance strategies for nearest-neighbour replacement

use std::collections::HashSet;

/// Per-field comparison strategy
///
/// Supplied by the application for each field type (given name, family name,
/// street token, ...). The engine only calls through this contract.
pub trait DeidentDistance<I, V>: Send + Sync {
    /// Comparison representation of a value; may be expensive
    fn make_vector(&self, input: &I) -> V;

    /// True for values that identify nobody and are never replaced
    fn is_public_domain(&self, input: &I) -> bool;

    /// Symmetric, non-negative dissimilarity; lower is more similar
    fn distance(&self, a: &V, b: &V) -> f64;

    /// Coarse keys restricting the neighbour search
    fn blocking_keys(&self, input: &I) -> HashSet<String>;
}

/// Normalized edit distance with prefix blocking
///
/// - vector: lowercase characters
/// - distance: Levenshtein distance divided by the longer length
/// - blocking key: the lowercase prefix of `prefix_len` characters
/// - public domain: values shorter than `min_len` characters after trimming
#[derive(Debug, Clone)]
pub struct EditDistance {
    prefix_len: usize,
    min_len: usize,
}

impl EditDistance {
    pub fn new(prefix_len: usize, min_len: usize) -> Self {
        Self {
            prefix_len: prefix_len.max(1),
            min_len,
        }
    }
}

impl Default for EditDistance {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl DeidentDistance<String, Vec<char>> for EditDistance {
    fn make_vector(&self, input: &String) -> Vec<char> {
        input.trim().to_lowercase().chars().collect()
    }

    fn is_public_domain(&self, input: &String) -> bool {
        input.trim().chars().count() < self.min_len
    }

    fn distance(&self, a: &Vec<char>, b: &Vec<char>) -> f64 {
        let longest = a.len().max(b.len());
        if longest == 0 {
            return 0.0;
        }
        levenshtein(a, b) as f64 / longest as f64
    }

    fn blocking_keys(&self, input: &String) -> HashSet<String> {
        let prefix: String = input
            .trim()
            .to_lowercase()
            .chars()
            .take(self.prefix_len)
            .collect();
        if prefix.is_empty() {
            HashSet::new()
        } else {
            HashSet::from([prefix])
        }
    }
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
