//! Indexed value vocabularies
//!
//! A [`Vocabulary`] maps arbitrary values to dense positive indices so that
//! large statistical tables can refer to a value by a compact integer. The
//! de-identification engines rewrite vocabularies in place; tables that cached
//! an index before a merge keep resolving it through the tombstone chain.
//!
//! # Locking
//!
//! The vocabulary exposes its lock. Single-shot methods on [`Vocabulary`]
//! take the lock for one call; a read-then-write sequence must hold one
//! [`Vocabulary::write`] guard across both calls:
//!
//! ```
//! use kanon::vocab::Vocabulary;
//!
//! # fn example() -> kanon::domain::Result<()> {
//! let vocab = Vocabulary::new();
//! vocab.put_if_absent("Zxqqy".to_string());
//!
//! let mut guard = vocab.write();
//! if let Some(index) = guard.try_get_index_for(&"Zxqqy".to_string()) {
//!     guard.update_index_value(index, "Zack".to_string())?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod snapshot;
pub mod vocabulary;

pub use vocabulary::{VocabState, VocabValue, Vocabulary};
