//! Vocabulary arena and its lock wrapper

use crate::domain::errors::VocabError;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Bound for values that can live in a [`Vocabulary`]
///
/// Values must be hashable for the reverse map and serializable so the
/// owning statistical model can be persisted between pipeline stages.
pub trait VocabValue:
    Clone + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> VocabValue for T where
    T: Clone + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Guarded vocabulary storage
///
/// Slot 0 of `index_to_value` is reserved. A `None` slot above 0 is a
/// tombstone and always has an entry in `tombstones`.
#[derive(Debug, Clone)]
pub struct VocabState<T> {
    pub(crate) index_to_value: Vec<Option<T>>,
    pub(crate) value_to_index: HashMap<T, usize>,
    pub(crate) tombstones: HashMap<usize, usize>,
}

impl<T: VocabValue> VocabState<T> {
    pub(crate) fn new() -> Self {
        Self {
            index_to_value: vec![None],
            value_to_index: HashMap::new(),
            tombstones: HashMap::new(),
        }
    }

    /// Insert `value` if it is new and return its index
    pub fn put_if_absent(&mut self, value: T) -> usize {
        if let Some(&index) = self.value_to_index.get(&value) {
            return index;
        }
        let index = self.index_to_value.len();
        self.index_to_value.push(Some(value.clone()));
        self.value_to_index.insert(value, index);
        index
    }

    fn check_bounds(&self, index: usize) -> Result<(), VocabError> {
        if index == 0 || index >= self.index_to_value.len() {
            return Err(VocabError::IndexOutOfRange {
                index,
                next_index: self.index_to_value.len(),
            });
        }
        Ok(())
    }

    /// Follow the tombstone chain from `index` to the live index
    pub fn resolve_index(&self, index: usize) -> Result<usize, VocabError> {
        self.check_bounds(index)?;
        let mut current = index;
        // a chain can never be longer than the number of slots
        for _ in 0..self.index_to_value.len() {
            if self.index_to_value[current].is_some() {
                return Ok(current);
            }
            current = match self.tombstones.get(&current) {
                Some(&target) => target,
                None => {
                    return Err(VocabError::CorruptState(format!(
                        "index {current} is empty but has no redirect"
                    )))
                }
            };
            self.check_bounds(current)?;
        }
        Err(VocabError::RedirectCycle(index))
    }

    /// Live value at `index`, following redirects
    pub fn get_for_index(&self, index: usize) -> Result<&T, VocabError> {
        let live = self.resolve_index(index)?;
        self.index_to_value[live]
            .as_ref()
            .ok_or_else(|| {
                VocabError::CorruptState(format!("resolved index {live} holds no value"))
            })
    }

    /// Raw slot contents; `None` when the slot is a tombstone
    pub fn get_for_index_no_resolve(&self, index: usize) -> Result<Option<&T>, VocabError> {
        self.check_bounds(index)?;
        Ok(self.index_to_value[index].as_ref())
    }

    /// Index of a live value
    pub fn get_index_for(&self, value: &T) -> Result<usize, VocabError> {
        self.try_get_index_for(value)
            .ok_or_else(|| VocabError::MissingValue(format!("{value:?}")))
    }

    /// Index of a live value, or `None`
    pub fn try_get_index_for(&self, value: &T) -> Option<usize> {
        self.value_to_index.get(value).copied()
    }

    /// Relabel the slot at `index` with `new_value`
    ///
    /// - `new_value` absent: the slot is relabelled in place; returns `index`.
    /// - `new_value` live at another index: `index` becomes a tombstone
    ///   redirecting to that index and the old value is dropped; returns the
    ///   surviving index.
    /// - `new_value` already at `index`: no-op.
    ///
    /// # Errors
    ///
    /// [`VocabError::IndexOutOfRange`] for bad indices and
    /// [`VocabError::Retired`] when the slot was already merged away.
    pub fn update_index_value(&mut self, index: usize, new_value: T) -> Result<usize, VocabError> {
        self.check_bounds(index)?;
        if self.index_to_value[index].is_none() {
            return Err(VocabError::Retired(index));
        }

        match self.value_to_index.get(&new_value).copied() {
            Some(target) if target == index => Ok(index),
            Some(target) => {
                if let Some(old) = self.index_to_value[index].take() {
                    self.value_to_index.remove(&old);
                }
                self.tombstones.insert(index, target);
                Ok(target)
            }
            None => {
                if let Some(old) = self.index_to_value[index].replace(new_value.clone()) {
                    self.value_to_index.remove(&old);
                }
                self.value_to_index.insert(new_value, index);
                Ok(index)
            }
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.value_to_index.contains_key(value)
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.value_to_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value_to_index.is_empty()
    }

    /// Index the next inserted value will receive
    pub fn next_index(&self) -> usize {
        self.index_to_value.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    /// Live `(index, value)` pairs in index order, skipping tombstones
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.index_to_value
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
    }
}

/// Thread-safe bidirectional value/index map with redirect semantics
///
/// # Thread Safety
///
/// Every single-shot method acquires the internal `parking_lot::RwLock`.
/// The lock is not reentrant for writers: while a guard from [`write`](Self::write)
/// is held, call operations on the guard, never on the vocabulary itself.
///
/// # Examples
///
/// ```
/// use kanon::vocab::Vocabulary;
///
/// # fn example() -> kanon::domain::Result<()> {
/// let vocab = Vocabulary::new();
/// let a = vocab.put_if_absent("Acme1".to_string());
/// let b = vocab.put_if_absent("Acme".to_string());
///
/// // merging a into b leaves a redirect behind
/// assert_eq!(vocab.update_index_value(a, "Acme".to_string())?, b);
/// assert_eq!(vocab.get_for_index(a)?, "Acme");
/// assert_eq!(vocab.get_for_index_no_resolve(a)?, None);
/// assert_eq!(vocab.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Vocabulary<T> {
    state: RwLock<VocabState<T>>,
}

impl<T: VocabValue> Vocabulary<T> {
    /// Create an empty vocabulary
    pub fn new() -> Self {
        Self {
            state: RwLock::new(VocabState::new()),
        }
    }

    pub(crate) fn from_state(state: VocabState<T>) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Acquire the shared lock
    pub fn read(&self) -> RwLockReadGuard<'_, VocabState<T>> {
        self.state.read_recursive()
    }

    /// Acquire the exclusive lock for a read-modify-write sequence
    pub fn write(&self) -> RwLockWriteGuard<'_, VocabState<T>> {
        self.state.write()
    }

    pub fn put_if_absent(&self, value: T) -> usize {
        self.write().put_if_absent(value)
    }

    pub fn get_for_index(&self, index: usize) -> Result<T, VocabError> {
        self.read().get_for_index(index).cloned()
    }

    pub fn get_for_index_no_resolve(&self, index: usize) -> Result<Option<T>, VocabError> {
        Ok(self.read().get_for_index_no_resolve(index)?.cloned())
    }

    pub fn resolve_index(&self, index: usize) -> Result<usize, VocabError> {
        self.read().resolve_index(index)
    }

    pub fn get_index_for(&self, value: &T) -> Result<usize, VocabError> {
        self.read().get_index_for(value)
    }

    pub fn try_get_index_for(&self, value: &T) -> Option<usize> {
        self.read().try_get_index_for(value)
    }

    /// See [`VocabState::update_index_value`]
    pub fn update_index_value(&self, index: usize, new_value: T) -> Result<usize, VocabError> {
        self.write().update_index_value(index, new_value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.read().contains(value)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn next_index(&self) -> usize {
        self.read().next_index()
    }

    pub fn tombstone_count(&self) -> usize {
        self.read().tombstone_count()
    }

    /// Snapshot of the live `(index, value)` pairs
    pub fn entries(&self) -> Vec<(usize, T)> {
        self.read()
            .iter()
            .map(|(index, value)| (index, value.clone()))
            .collect()
    }

    /// Snapshot of the live values in index order
    pub fn values(&self) -> Vec<T> {
        self.read().iter().map(|(_, value)| value.clone()).collect()
    }
}

impl<T: VocabValue> Default for Vocabulary<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: VocabValue> Clone for Vocabulary<T> {
    fn clone(&self) -> Self {
        Self::from_state(self.read().clone())
    }
}

impl<T: VocabValue> fmt::Debug for Vocabulary<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Vocabulary")
            .field("live", &state.len())
            .field("next_index", &state.next_index())
            .field("tombstones", &state.tombstone_count())
            .finish()
    }
}

/// Equality over the live value/index mapping only; merge history is ignored
impl<T: VocabValue> PartialEq for Vocabulary<T> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.read().value_to_index == other.read().value_to_index
    }
}

impl<T: VocabValue> Eq for Vocabulary<T> {}

impl<T: VocabValue> FromIterator<T> for Vocabulary<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut state = VocabState::new();
        for value in iter {
            state.put_if_absent(value);
        }
        Self::from_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab_of(values: &[&str]) -> Vocabulary<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_put_if_absent_assigns_dense_indices() {
        let vocab = Vocabulary::new();
        assert_eq!(vocab.put_if_absent("a".to_string()), 1);
        assert_eq!(vocab.put_if_absent("b".to_string()), 2);
        assert_eq!(vocab.put_if_absent("a".to_string()), 1);
        assert_eq!(vocab.next_index(), 3);
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_bounds() {
        let vocab = vocab_of(&["a"]);
        assert!(matches!(
            vocab.get_for_index(0),
            Err(VocabError::IndexOutOfRange { index: 0, .. })
        ));
        assert!(vocab.get_for_index(1).is_ok());
        assert!(matches!(
            vocab.get_for_index_no_resolve(2),
            Err(VocabError::IndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn test_try_get_index_for_missing() {
        let vocab = vocab_of(&["a"]);
        assert_eq!(vocab.try_get_index_for(&"zz".to_string()), None);
        assert!(matches!(
            vocab.get_index_for(&"zz".to_string()),
            Err(VocabError::MissingValue(_))
        ));
    }

    #[test]
    fn test_merge_chain_resolves() {
        let vocab = vocab_of(&["a", "b", "c"]);
        assert_eq!(vocab.update_index_value(1, "b".to_string()).unwrap(), 2);
        assert_eq!(vocab.update_index_value(2, "c".to_string()).unwrap(), 3);

        assert_eq!(vocab.resolve_index(1).unwrap(), 3);
        assert_eq!(vocab.get_for_index(1).unwrap(), "c");
        assert_eq!(vocab.get_for_index(2).unwrap(), "c");
        assert_eq!(vocab.len(), 1);
        assert_eq!(vocab.tombstone_count(), 2);
    }

    #[test]
    fn test_redirect_follows_relabel_of_target() {
        let vocab = vocab_of(&["a", "b"]);
        vocab.update_index_value(1, "b".to_string()).unwrap();
        vocab.update_index_value(2, "z".to_string()).unwrap();
        assert_eq!(vocab.get_for_index(1).unwrap(), "z");
    }

    #[test]
    fn test_update_retired_slot_fails() {
        let vocab = vocab_of(&["a", "b"]);
        vocab.update_index_value(1, "b".to_string()).unwrap();
        assert_eq!(
            vocab.update_index_value(1, "c".to_string()),
            Err(VocabError::Retired(1))
        );
    }

    #[test]
    fn test_iter_skips_tombstones() {
        let vocab = vocab_of(&["a", "b", "c"]);
        vocab.update_index_value(2, "c".to_string()).unwrap();
        let entries = vocab.entries();
        assert_eq!(entries, vec![(1, "a".to_string()), (3, "c".to_string())]);
    }

    #[test]
    fn test_clone_is_deep() {
        let vocab = vocab_of(&["a", "b"]);
        let copy = vocab.clone();
        vocab.update_index_value(1, "x".to_string()).unwrap();
        assert_eq!(copy.get_for_index(1).unwrap(), "a");
        assert_ne!(vocab, copy);
    }

    #[test]
    fn test_cycle_detected() {
        let mut state: VocabState<String> = VocabState::new();
        state.index_to_value.push(None);
        state.index_to_value.push(None);
        state.tombstones.insert(1, 2);
        state.tombstones.insert(2, 1);
        assert_eq!(state.resolve_index(1), Err(VocabError::RedirectCycle(1)));
    }
}
