//! De-identification run summary

use serde::Serialize;
use std::time::Duration;

/// Outcome of one `deidentify` call
///
/// A run that leaves residual victims is still a successful run; callers
/// decide whether the shortfall is acceptable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeidentSummary {
    /// Live values before the run
    pub vocabulary_size: usize,

    /// Values that failed the public-domain / minimum-count test
    pub victims: usize,

    /// Victims whose blocking reservoir received at least one candidate
    pub victims_with_candidates: usize,

    /// Candidates streamed through the blocking index
    pub candidates_scanned: usize,

    /// Victims replaced by their nearest blocking match
    pub blocking_replacements: usize,

    /// Victims replaced by the uniform fallback sample
    pub sample_replacements: usize,

    /// Victims left unreplaced
    pub residual_victims: usize,

    /// Slots rewritten by a structural remap
    pub remapped: usize,

    /// Remaps that merged into an existing value
    pub merged: usize,

    /// Wall-clock duration of the run
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl DeidentSummary {
    pub fn new(vocabulary_size: usize) -> Self {
        Self {
            vocabulary_size,
            ..Self::default()
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Total number of rewritten values
    pub fn replacements(&self) -> usize {
        self.blocking_replacements + self.sample_replacements + self.remapped
    }

    /// True when every victim was replaced
    pub fn is_complete(&self) -> bool {
        self.residual_victims == 0
    }

    /// Log the summary
    pub fn log_summary(&self, field: &str) {
        tracing::info!(
            field = field,
            vocabulary_size = self.vocabulary_size,
            victims = self.victims,
            blocking_replacements = self.blocking_replacements,
            sample_replacements = self.sample_replacements,
            remapped = self.remapped,
            merged = self.merged,
            residual_victims = self.residual_victims,
            duration_ms = self.duration.as_millis() as u64,
            "De-identification completed"
        );

        if !self.is_complete() {
            tracing::warn!(
                field = field,
                residual_victims = self.residual_victims,
                "De-identification left values unreplaced"
            );
        }
    }
}
