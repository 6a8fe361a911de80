//! Error context extension trait
//!
//! `anyhow::Context` for library code that returns `Result<T, KanonError>`.
//!
//! ```rust
//! use kanon::domain::context::ResultExt;
//! use kanon::domain::Result;
//!
//! fn read_profile(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).with_context(|| format!("Failed to read profile: {path}"))
//! }
//! ```

use crate::domain::errors::KanonError;
use crate::domain::result::Result;

/// Adds `.context()` and `.with_context()` to any result whose error converts
/// into [`KanonError`]
pub trait ResultExt<T> {
    /// Add context to an error (eagerly evaluated)
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context computed only when an error occurs
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<KanonError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| wrap(e.into(), context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| wrap(e.into(), f()))
    }
}

/// Prefix the message while keeping the variant, so callers can still match on
/// the error kind. Vocabulary errors are structured and become `Other`.
fn wrap<C: std::fmt::Display>(error: KanonError, context: C) -> KanonError {
    match error {
        KanonError::Configuration(msg) => KanonError::Configuration(format!("{context}: {msg}")),
        KanonError::Serialization(msg) => KanonError::Serialization(format!("{context}: {msg}")),
        KanonError::Io(msg) => KanonError::Io(format!("{context}: {msg}")),
        other => KanonError::Other(format!("{context}: {other}")),
    }
}
