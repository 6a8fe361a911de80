// kanon - k-anonymity de-identification of field vocabularies
// Copyright (c) 2025 Kanon Contributors
// Licensed under the MIT License

//! # kanon - vocabulary de-identification
//!
//! kanon rewrites the rare, identifying values of a profiled field so that
//! every value left in its vocabulary has been seen at least `k` times or is
//! drawn from a public candidate pool.
//!
//! ## Overview
//!
//! - A [`vocab::Vocabulary`] maps values to dense indices. Replacing a value
//!   either relabels its slot or, when the replacement already exists, leaves a
//!   tombstone redirecting to the surviving index, so statistical tables that
//!   cached indices stay valid.
//! - [`deident::KAnonDeidentifier`] replaces each rare value with the closest
//!   public candidate sharing a blocking key, then falls back to a uniform
//!   sample of the pool.
//! - [`deident::RemapDeidentifier`] rewrites structured values (phone numbers
//!   and the like) with a remap function.
//!
//! ## Architecture
//!
//! - [`vocab`] - Vocabulary arena with tombstones and serde form
//! - [`sampling`] - Set-semantics reservoir sampling
//! - [`concurrent`] - Latch, lazy map and chunked dispatch onto rayon
//! - [`deident`] - De-identification engines, distances, observers
//! - [`domain`] - Errors, result alias, field profiles
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//! - [`cli`] - Command-line interface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kanon::deident::{EditDistance, KAnonDeidentifier, KAnonSettings, LineCandidates};
//! use kanon::deident::{NoopObserver, VocabDeidentifier};
//! use kanon::domain::VocabProfile;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let profile = VocabProfile::load("given_name.json")?;
//!     let field = profile.field.clone();
//!     let (vocab, counts) = profile.clone().into_vocabulary();
//!
//!     let engine: KAnonDeidentifier<String, Vec<char>> = KAnonDeidentifier::new(
//!         EditDistance::default(),
//!         LineCandidates::open("census_given_names.txt")?,
//!         KAnonSettings::new(30.0),
//!     )?;
//!
//!     let by_value: std::collections::HashMap<String, f64> = profile
//!         .entries
//!         .iter()
//!         .map(|e| (e.value.clone(), e.count))
//!         .collect();
//!     let count = |v: &String| by_value.get(v).copied().unwrap_or(0.0);
//!
//!     let summary = engine.deidentify(&vocab, &count, &NoopObserver)?;
//!     println!("replaced {} of {} rare values", summary.replacements(), summary.victims);
//!
//!     VocabProfile::from_vocabulary(field, &vocab, &counts)?.save("given_name.anon.json")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`domain::Result`] with [`domain::KanonError`];
//! vocabulary precondition violations surface as [`domain::VocabError`].

pub mod cli;
pub mod concurrent;
pub mod config;
pub mod deident;
pub mod domain;
pub mod logging;
pub mod sampling;
pub mod vocab;
