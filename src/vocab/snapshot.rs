//! Serialized shape of a vocabulary
//!
//! ```json
//! { "values": ["John", null, "Zack"], "tombstones": { "2": 3 } }
//! ```
//!
//! `values[i]` holds index `i + 1`; the reserved slot 0 is not written.
//! Loading rebuilds the reverse map and rejects states that break the
//! vocabulary invariants.

use super::vocabulary::{VocabState, VocabValue, Vocabulary};
use crate::domain::errors::VocabError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

#[derive(Serialize)]
struct SnapshotRef<'a, T> {
    values: &'a [Option<T>],
    tombstones: BTreeMap<usize, usize>,
}

#[derive(Deserialize)]
struct SnapshotOwned<T> {
    values: Vec<Option<T>>,
    #[serde(default)]
    tombstones: BTreeMap<usize, usize>,
}

impl<T: VocabValue> VocabState<T> {
    fn from_snapshot(snapshot: SnapshotOwned<T>) -> Result<Self, VocabError> {
        let mut index_to_value = Vec::with_capacity(snapshot.values.len() + 1);
        index_to_value.push(None);
        index_to_value.extend(snapshot.values);

        let mut value_to_index = HashMap::new();
        for (index, slot) in index_to_value.iter().enumerate().skip(1) {
            match slot {
                Some(value) => {
                    if value_to_index.insert(value.clone(), index).is_some() {
                        return Err(VocabError::CorruptState(format!(
                            "value {value:?} is live at more than one index"
                        )));
                    }
                }
                None if !snapshot.tombstones.contains_key(&index) => {
                    return Err(VocabError::CorruptState(format!(
                        "index {index} is empty but has no redirect"
                    )));
                }
                None => {}
            }
        }

        let next_index = index_to_value.len();
        for (&from, &to) in &snapshot.tombstones {
            if from == 0 || from >= next_index || to == 0 || to >= next_index || from == to {
                return Err(VocabError::CorruptState(format!(
                    "invalid redirect {from} -> {to}"
                )));
            }
            if index_to_value[from].is_some() {
                return Err(VocabError::CorruptState(format!(
                    "redirect from live index {from}"
                )));
            }
        }

        let state = Self {
            index_to_value,
            value_to_index,
            tombstones: snapshot.tombstones.into_iter().collect(),
        };
        for &from in state.tombstones.keys() {
            state.resolve_index(from)?;
        }
        Ok(state)
    }
}

impl<T: VocabValue> Serialize for Vocabulary<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let state = self.read();
        SnapshotRef {
            values: &state.index_to_value[1..],
            tombstones: state.tombstones.iter().map(|(&k, &v)| (k, v)).collect(),
        }
        .serialize(serializer)
    }
}

impl<'de, T: VocabValue> Deserialize<'de> for Vocabulary<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshot = SnapshotOwned::<T>::deserialize(deserializer)?;
        VocabState::from_snapshot(snapshot)
            .map(Vocabulary::from_state)
            .map_err(serde::de::Error::custom)
    }
}
