//! Public replacement candidate pools
//!
//! The k-anonymity engine traverses the pool twice (blocking, then fallback
//! sampling). A source hands out a fresh iterator per traversal, so pools
//! backed by a file are re-read rather than cached in memory.

use crate::domain::{KanonError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Re-iterable pool of public values
pub trait CandidateSource<I>: Send + Sync {
    /// Start a new traversal of the pool
    ///
    /// A traversal that fails part way yields an `Err` item; the engine stops
    /// reading and aborts the run rather than work from a truncated pool.
    fn candidates(&self) -> Result<Box<dyn Iterator<Item = Result<I>> + Send + '_>>;
}

impl<I> CandidateSource<I> for Vec<I>
where
    I: Clone + Send + Sync,
{
    fn candidates(&self) -> Result<Box<dyn Iterator<Item = Result<I>> + Send + '_>> {
        Ok(Box::new(self.iter().cloned().map(Ok)))
    }
}

/// Text file with one candidate per line
///
/// Blank lines are skipped and surrounding whitespace is trimmed. Lines must
/// be valid UTF-8.
#[derive(Debug, Clone)]
pub struct LineCandidates {
    path: PathBuf,
}

impl LineCandidates {
    /// Open a candidate file, checking that it is readable
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        File::open(path).map_err(|e| read_error(path, &e))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_error(path: &Path, e: &std::io::Error) -> KanonError {
    KanonError::Io(format!(
        "Failed to read candidate file {}: {}",
        path.display(),
        e
    ))
}

impl CandidateSource<String> for LineCandidates {
    fn candidates(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + Send + '_>> {
        let file = File::open(&self.path).map_err(|e| read_error(&self.path, &e))?;

        let lines = BufReader::new(file)
            .lines()
            .filter_map(move |line| match line {
                Ok(line) => {
                    let trimmed = line.trim();
                    (!trimmed.is_empty()).then(|| Ok(trimmed.to_string()))
                }
                Err(e) => Some(Err(read_error(&self.path, &e))),
            });
        Ok(Box::new(lines))
    }
}
