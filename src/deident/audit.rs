//! Audit observer for de-identification runs

use super::observer::{Observer, ReplacementPhase};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Audit log entry
#[derive(Debug, Serialize)]
struct AuditLogEntry<'a> {
    timestamp: String,
    field: &'a str,
    phase: ReplacementPhase,
    /// SHA-256 hash of the serialized original (never log plaintext)
    original_hash: String,
    replacement: serde_json::Value,
}

/// Observer appending one line per replacement to an audit file
pub struct AuditObserver {
    field: String,
    log_path: PathBuf,
    json_format: bool,
    file: Mutex<File>,
    written: AtomicU64,
    failures: AtomicU64,
}

impl AuditObserver {
    /// Create an audit observer for `field`, appending to `log_path`
    pub fn new(field: impl Into<String>, log_path: impl AsRef<Path>, json_format: bool) -> Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log directory: {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open audit log: {}", log_path.display()))?;

        Ok(Self {
            field: field.into(),
            log_path,
            json_format,
            file: Mutex::new(file),
            written: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Entries written so far
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Entries that could not be written
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn record<I: Serialize>(&self, phase: ReplacementPhase, original: &I, replacement: &I) {
        match self.write_entry(phase, original, replacement) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    error = %e,
                    field = %self.field,
                    log_path = %self.log_path.display(),
                    "Failed to write audit entry"
                );
            }
        }
    }

    fn write_entry<I: Serialize>(
        &self,
        phase: ReplacementPhase,
        original: &I,
        replacement: &I,
    ) -> Result<()> {
        let original_json =
            serde_json::to_string(original).context("Failed to serialize original value")?;
        let entry = AuditLogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            field: &self.field,
            phase,
            original_hash: hash_value(&original_json),
            replacement: serde_json::to_value(replacement)
                .context("Failed to serialize replacement value")?,
        };

        let mut file = self.file.lock();
        if self.json_format {
            let json_line =
                serde_json::to_string(&entry).context("Failed to serialize audit entry")?;
            writeln!(file, "{json_line}").context("Failed to write audit entry")?;
        } else {
            writeln!(
                file,
                "[{}] Field: {} | Phase: {:?} | Original: {} | Replacement: {}",
                entry.timestamp, entry.field, entry.phase, entry.original_hash, entry.replacement
            )
            .context("Failed to write audit entry")?;
        }
        Ok(())
    }
}

/// Hash a serialized value using SHA-256
fn hash_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl<I: Serialize> Observer<I> for AuditObserver {
    fn on_blocking_replace(&self, original: &I, replacement: &I) {
        self.record(ReplacementPhase::Blocking, original, replacement);
    }

    fn on_sample_replace(&self, original: &I, replacement: &I) {
        self.record(ReplacementPhase::Sample, original, replacement);
    }
}
