//! Domain types for kanon.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Error types** ([`KanonError`], [`VocabError`])
//! - **Result type alias** ([`Result`])
//! - **Field profiles** ([`VocabProfile`]), the serialized value distribution
//!   the CLI reads and writes
//!
//! # Error Handling
//!
//! All fallible library operations return [`Result<T, KanonError>`]:
//!
//! ```rust
//! use kanon::domain::{Result, VocabProfile};
//!
//! fn example() -> Result<()> {
//!     // Errors are converted using the ? operator
//!     let profile = VocabProfile::load("given_name.json")?;
//!     let (vocab, _counts) = profile.into_vocabulary();
//!     println!("{} values", vocab.len());
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod errors;
pub mod profile;
pub mod result;

pub use errors::{KanonError, VocabError};
pub use profile::{ProfileEntry, VocabProfile};
pub use result::Result;
