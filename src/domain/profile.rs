//! Serialized field profile
//!
//! A profile is the value distribution of one field: every distinct value with
//! its occurrence count. It is the file format the CLI reads and writes.
//!
//! ```json
//! { "field": "given_name", "entries": [ { "value": "John", "count": 500.0 } ] }
//! ```
//!
//! Counts loaded from a profile are keyed by vocabulary index, the way every
//! statistical table built over a vocabulary refers to values. After
//! de-identification those indices may point at tombstones, so
//! [`VocabProfile::from_vocabulary`] folds them through the redirects.

use crate::domain::context::ResultExt;
use crate::domain::{KanonError, Result};
use crate::vocab::Vocabulary;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// One distinct value and how often it was observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub value: String,
    pub count: f64,
}

/// Value distribution of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabProfile {
    pub field: String,
    pub entries: Vec<ProfileEntry>,
}

impl VocabProfile {
    pub fn new(field: impl Into<String>, entries: Vec<ProfileEntry>) -> Self {
        Self {
            field: field.into(),
            entries,
        }
    }

    /// Load a profile from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {}", path.display()))?;
        let profile: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse profile: {}", path.display()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Write the profile as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write profile: {}", path.display()))
    }

    /// Counts must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        if self.field.trim().is_empty() {
            return Err(KanonError::Serialization(
                "profile field name cannot be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .entries
            .iter()
            .find(|entry| !entry.count.is_finite() || entry.count < 0.0)
        {
            return Err(KanonError::Serialization(format!(
                "invalid count {} for a value in field '{}'",
                bad.count, self.field
            )));
        }
        Ok(())
    }

    /// Build a vocabulary and its index-keyed count table
    ///
    /// Duplicate values in the profile share one index and their counts add up.
    pub fn into_vocabulary(self) -> (Vocabulary<String>, HashMap<usize, f64>) {
        let vocab = Vocabulary::new();
        let mut counts: HashMap<usize, f64> = HashMap::with_capacity(self.entries.len());
        {
            let mut state = vocab.write();
            for entry in self.entries {
                let index = state.put_if_absent(entry.value);
                *counts.entry(index).or_default() += entry.count;
            }
        }
        (vocab, counts)
    }

    /// Rebuild a profile from a (possibly de-identified) vocabulary
    ///
    /// Every count is attributed to the live index its slot resolves to, so
    /// the counts of merged values are summed on the surviving value. Entries
    /// are written in index order.
    pub fn from_vocabulary(
        field: impl Into<String>,
        vocab: &Vocabulary<String>,
        counts: &HashMap<usize, f64>,
    ) -> Result<Self> {
        let state = vocab.read();
        let mut folded: BTreeMap<usize, f64> = state.iter().map(|(index, _)| (index, 0.0)).collect();
        for (&index, &count) in counts {
            let live = state.resolve_index(index)?;
            *folded.entry(live).or_default() += count;
        }

        let entries = folded
            .into_iter()
            .map(|(index, count)| {
                Ok(ProfileEntry {
                    value: state.get_for_index(index)?.clone(),
                    count,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(field, entries))
    }

    /// Total observations
    pub fn total_count(&self) -> f64 {
        self.entries.iter().map(|entry| entry.count).sum()
    }
}
